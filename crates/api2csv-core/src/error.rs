//! Error types for table reshaping and CSV encoding

use thiserror::Error;

/// Errors raised while building, reshaping or (de)serializing tables
#[derive(Debug, Error)]
pub enum TableError {
    /// A referenced column does not exist in the table
    #[error("Unknown column '{column}' (available: {available})")]
    UnknownColumn { column: String, available: String },

    /// A row did not match the table width
    #[error("Row has {actual} cells but table has {expected} columns")]
    RowWidth { expected: usize, actual: usize },

    /// A payload did not have the shape the reshaper expects
    #[error("Unexpected payload shape: {0}")]
    Shape(String),

    /// CSV decode or encode failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A record-boundary pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Flushing the CSV buffer or a scratch file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The native netCDF library rejected a file
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),
}

impl TableError {
    pub(crate) fn unknown_column(column: &str, available: &[String]) -> Self {
        Self::UnknownColumn {
            column: column.to_string(),
            available: available.join(", "),
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }
}

/// Result type alias for TableError
pub type Result<T> = std::result::Result<T, TableError>;
