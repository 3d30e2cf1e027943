//! In-memory output document
//!
//! All sheets are created up front, each with its header row, before any
//! resource task runs. Tasks then only append rows through their own
//! [`SheetWriter`]. Every append goes through one document-wide mutex, so
//! the sheet set is never mutated concurrently and physical writes are
//! serialized while collection itself stays parallel.

use crate::error::{InventoryError, Result};
use crate::sanitize::{CellValue, sanitize};
use crate::tags::{RawTags, TagNormalizer};
use invflow_config::StyleConfig;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// xlsx limit on sheet name length
pub const MAX_SHEET_NAME_LENGTH: usize = 31;

const INVALID_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// One named sheet: row 0 is the header
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<String>>,
    column_widths: Vec<f64>,
    frozen_rows: u32,
}

impl Sheet {
    fn new(name: String, header: Vec<String>) -> Self {
        Self {
            name,
            rows: vec![header],
            column_widths: Vec::new(),
            frozen_rows: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn header(&self) -> &[String] {
        &self.rows[0]
    }

    pub fn data_rows(&self) -> &[Vec<String>] {
        &self.rows[1..]
    }

    pub fn column_widths(&self) -> &[f64] {
        &self.column_widths
    }

    pub fn frozen_rows(&self) -> u32 {
        self.frozen_rows
    }

    /// Width of each column: longest cell + 2, capped
    fn auto_size(&mut self, max_width: u32) {
        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut longest = vec![0usize; columns];
        for row in &self.rows {
            for (col, cell) in row.iter().enumerate() {
                longest[col] = longest[col].max(cell.chars().count());
            }
        }
        self.column_widths = longest
            .into_iter()
            .map(|len| (len + 2).min(max_width as usize) as f64)
            .collect();
    }

    pub fn summary(&self) -> SheetSummary {
        SheetSummary {
            name: self.name.clone(),
            columns: self.header().len(),
            data_rows: self.rows.len() - 1,
        }
    }
}

/// Shape of a finished sheet, kept in the export report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub columns: usize,
    pub data_rows: usize,
}

/// Multi-sheet output document for one profile
#[derive(Debug, Default)]
pub struct OutputDocument {
    sheets: Arc<Mutex<Vec<Sheet>>>,
}

impl OutputDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sheet with its header row and return the handle its task
    /// appends through
    pub fn add_sheet(&mut self, name: &str, header: Vec<String>) -> Result<SheetWriter> {
        validate_sheet_name(name)?;

        let mut sheets = lock(&self.sheets);
        if sheets.iter().any(|s| s.name.eq_ignore_ascii_case(name)) {
            return Err(InventoryError::InvalidSheet(format!(
                "duplicate sheet name '{}'",
                name
            )));
        }

        let index = sheets.len();
        sheets.push(Sheet::new(name.to_string(), header));
        tracing::debug!("Created sheet: {}", name);

        Ok(SheetWriter {
            sheets: Arc::clone(&self.sheets),
            index,
            name: Arc::from(name),
        })
    }

    pub fn sheet_count(&self) -> usize {
        lock(&self.sheets).len()
    }

    pub fn sheet_names(&self) -> Vec<String> {
        lock(&self.sheets).iter().map(|s| s.name.clone()).collect()
    }

    /// Copy of a sheet's current contents
    pub fn sheet(&self, name: &str) -> Option<Sheet> {
        lock(&self.sheets).iter().find(|s| s.name == name).cloned()
    }

    pub fn summaries(&self) -> Vec<SheetSummary> {
        lock(&self.sheets).iter().map(Sheet::summary).collect()
    }

    /// Size columns to content and freeze the header row of every sheet
    pub fn finalize(&mut self, max_column_width: u32) {
        for sheet in lock(&self.sheets).iter_mut() {
            sheet.auto_size(max_column_width);
            sheet.frozen_rows = 1;
        }
    }

    /// Write the document to `path` as xlsx, consuming it
    pub async fn save(self, path: &Path, style: &StyleConfig) -> Result<()> {
        let sheets = std::mem::take(&mut *lock(&self.sheets));
        let target = path.to_path_buf();
        let style = style.clone();

        tokio::task::spawn_blocking(move || crate::xlsx::write_workbook(&sheets, &target, &style))
            .await
            .map_err(|e| InventoryError::Save {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
    }
}

/// Append handle for one sheet
#[derive(Debug, Clone)]
pub struct SheetWriter {
    sheets: Arc<Mutex<Vec<Sheet>>>,
    index: usize,
    name: Arc<str>,
}

impl SheetWriter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an already sanitized row
    pub fn append(&self, row: Vec<String>) {
        lock(&self.sheets)[self.index].rows.push(row);
    }

    pub fn append_row(&self, row: RowBuilder) {
        self.append(row.build());
    }

    /// Data rows written so far
    pub fn row_count(&self) -> usize {
        lock(&self.sheets)[self.index].rows.len() - 1
    }
}

/// Builds one sanitized data row
#[derive(Debug, Clone, Default)]
pub struct RowBuilder {
    cells: Vec<String>,
}

impl RowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(mut self, value: impl Into<CellValue>) -> Self {
        self.cells.push(sanitize(value));
        self
    }

    /// Append the tag column block
    pub fn tags(mut self, normalizer: &TagNormalizer, tags: &RawTags) -> Self {
        self.cells.extend(normalizer.raw_column_values(tags));
        self
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn build(self) -> Vec<String> {
        self.cells
    }
}

fn validate_sheet_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(InventoryError::InvalidSheet("empty sheet name".into()));
    }
    if name.chars().count() > MAX_SHEET_NAME_LENGTH {
        return Err(InventoryError::InvalidSheet(format!(
            "'{}' is longer than {} characters",
            name, MAX_SHEET_NAME_LENGTH
        )));
    }
    if name.contains(&INVALID_SHEET_NAME_CHARS[..]) {
        return Err(InventoryError::InvalidSheet(format!(
            "'{}' contains one of []:*?/\\",
            name
        )));
    }
    Ok(())
}

/// A panic while holding the lock cannot leave a row half-pushed
fn lock(sheets: &Mutex<Vec<Sheet>>) -> MutexGuard<'_, Vec<Sheet>> {
    sheets.lock().unwrap_or_else(PoisonError::into_inner)
}
