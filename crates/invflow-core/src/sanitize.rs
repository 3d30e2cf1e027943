//! Cell sanitizer
//!
//! Every value that reaches a sheet goes through [`sanitize`]. It never fails:
//! missing values become `N/A`, formula prefixes are quoted, line breaks are
//! flattened and oversized text is cut to the cell limit.

/// Placeholder for a missing value
pub const NOT_AVAILABLE: &str = "N/A";

/// Longest cell text kept before truncation (xlsx allows 32767)
pub const MAX_CELL_LENGTH: usize = 32_000;

/// Appended to truncated cell text
pub const TRUNCATION_MARKER: &str = "...";

const FORMULA_PREFIXES: [char; 4] = ['=', '+', '-', '@'];

/// A raw cell value before sanitization
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Text(String),
    Integer(i128),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Missing => write!(f, "{}", NOT_AVAILABLE),
            CellValue::Text(text) => write!(f, "{}", text),
            CellValue::Integer(value) => write!(f, "{}", value),
            CellValue::Float(value) => write!(f, "{}", value),
            CellValue::Bool(true) => write!(f, "Yes"),
            CellValue::Bool(false) => write!(f, "No"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<&String> for CellValue {
    fn from(value: &String) -> Self {
        CellValue::Text(value.clone())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

macro_rules! integer_cell {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for CellValue {
                fn from(value: $ty) -> Self {
                    CellValue::Integer(value as i128)
                }
            }
        )*
    };
}

integer_cell!(i32, i64, u32, u64, usize);

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Missing)
    }
}

/// Render a value as safe cell text
pub fn sanitize(value: impl Into<CellValue>) -> String {
    let value = value.into();
    if value == CellValue::Missing {
        return NOT_AVAILABLE.to_string();
    }

    let mut text: String = value
        .to_string()
        .chars()
        .filter(|c| *c != '\0' && !is_stray_control(*c))
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();

    // Must run on the stripped text: a leading control character hides the prefix
    if text.starts_with(&FORMULA_PREFIXES[..]) {
        text.insert(0, '\'');
    }

    if text.chars().count() > MAX_CELL_LENGTH {
        text = text.chars().take(MAX_CELL_LENGTH).collect();
        text.push_str(TRUNCATION_MARKER);
    }

    text
}

/// Control characters other than tab, LF and CR (already flattened)
fn is_stray_control(c: char) -> bool {
    matches!(c, '\u{01}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}
