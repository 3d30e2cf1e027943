//! xlsx persistence of a finished document

use crate::document::Sheet;
use crate::error::Result;
use invflow_config::StyleConfig;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatPattern, Workbook};
use std::path::Path;

/// Header cell format from the configured style
fn header_format(style: &StyleConfig) -> Format {
    let format = Format::new()
        .set_font_color(Color::RGB(style.header_font_rgb()))
        .set_font_size(style.header_font_size)
        .set_background_color(Color::RGB(style.header_fill_rgb()))
        .set_pattern(FormatPattern::Solid)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_text_wrap();

    if style.header_bold {
        format.set_bold()
    } else {
        format
    }
}

/// Write all sheets to one workbook at `path`. Blocking.
pub(crate) fn write_workbook(sheets: &[Sheet], path: &Path, style: &StyleConfig) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let header = header_format(style);

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name())?;

        for (row_idx, row) in sheet.rows().iter().enumerate() {
            let row_num = row_idx as u32;
            for (col_idx, value) in row.iter().enumerate() {
                let col = col_idx as u16;
                if row_idx == 0 {
                    worksheet.write_string_with_format(row_num, col, value, &header)?;
                } else {
                    worksheet.write_string(row_num, col, value)?;
                }
            }
        }

        for (col_idx, width) in sheet.column_widths().iter().enumerate() {
            worksheet.set_column_width(col_idx as u16, *width)?;
        }

        if sheet.frozen_rows() > 0 {
            worksheet.set_freeze_panes(sheet.frozen_rows(), 0)?;
        }
    }

    workbook.save(path)?;
    tracing::debug!("Wrote {} sheets to {}", sheets.len(), path.display());
    Ok(())
}
