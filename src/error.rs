use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Field map configuration not found at {}", .0.display())]
    FieldMapMissing(PathBuf),

    #[error("Field map configuration invalid: {0}")]
    FieldMapInvalid(String),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No ledger header row found in {}", .0.display())]
    NoHeaderRow(PathBuf),

    #[error("Unsupported input: {0}")]
    Unsupported(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
