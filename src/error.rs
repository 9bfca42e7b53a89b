//! Error types for the policy splitter.

use std::path::PathBuf;

/// Top-level error type. Only load-time failures and whole-command failures
/// surface through it; per-group problems are recorded in the run report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    #[error("Reference dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Bundle error: {0}")]
    Bundle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the PDF capability layer.
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("Could not open PDF {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Page {index} is out of range ({count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Could not extract text from page {index}: {reason}")]
    Text { index: usize, reason: String },

    #[error("Could not build sub-document: {0}")]
    Build(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Could not write PDF: {0}")]
    Save(String),

    #[error("Merge failed: {0}")]
    Merge(String),
}

/// Errors while loading the reference spreadsheet.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Could not open Excel file: {0}")]
    Open(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Workbook has no sheets")]
    NoSheets,

    #[error("Sheet '{0}' has no header row")]
    Empty(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
