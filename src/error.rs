use thiserror::Error;

/// Errors raised while reading or writing a fund table
#[derive(Error, Debug)]
pub enum TableError {
    /// One or more required columns are absent from the header row
    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Malformed table: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TableResult<T> = Result<T, TableError>;
