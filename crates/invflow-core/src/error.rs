//! Export engine error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a profile export or a resource category
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Identity resolution failed: {0}")]
    Identity(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid sheet: {0}")]
    InvalidSheet(String),

    #[error("Failed to save {path}: {message}")]
    Save { path: PathBuf, message: String },

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InventoryError>;
