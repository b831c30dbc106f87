//! Error types for report building and export.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("input is missing the `{0}` record set")]
    MissingRecordSet(&'static str),

    #[error("`{0}` must be a sequence of records")]
    InputShape(&'static str),

    #[error("input is not a mapping of record sets")]
    NotAMapping,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("another export is already in progress")]
    Busy,

    #[error("export was cancelled")]
    Cancelled,

    #[error("rasterisation failed: {0}")]
    Raster(String),

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export worker failed: {0}")]
    Worker(String),
}

impl ExportError {
    /// The single recoverable message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ExportError::Busy => "An export is already running. Try again when it finishes.".to_string(),
            ExportError::Cancelled => "Export cancelled. No file was written.".to_string(),
            ExportError::Raster(_) | ExportError::Worker(_) => {
                format!("Could not render the snapshot ({self}). No file was written.")
            }
            ExportError::Workbook(_) => {
                format!("Could not build the workbook ({self}). No file was written.")
            }
            ExportError::Io(e) => format!("Could not save the export: {e}."),
        }
    }
}

impl From<tempfile::PersistError> for ExportError {
    fn from(e: tempfile::PersistError) -> Self {
        ExportError::Io(e.error)
    }
}
