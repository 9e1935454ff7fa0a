use std::fmt;

#[derive(Debug)]
pub enum IoError {
    /// File read/write failure.
    Io(String),
    /// Malformed CSV record.
    Csv(String),
    /// Malformed or unserializable JSON document.
    Json(String),
    /// Table header lacks a required column.
    MissingColumn(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Csv(msg) => write!(f, "CSV error: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::MissingColumn(column) => write!(f, "missing column '{column}'"),
        }
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<csv::Error> for IoError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
