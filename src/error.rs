use std::path::PathBuf;

/// Everything that can terminate a scoring run.
///
/// None of these are retried; the driver logs the error and exits.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot reach {target}: {message}")]
    Connectivity { target: String, message: String },

    #[error("query failed: {0}")]
    Query(String),

    #[error("model artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cannot deserialize {what}: {message}")]
    Deserialization { what: String, message: String },

    #[error("column '{column}' must hold numeric values (found {found})")]
    TypeMismatch { column: String, found: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("column '{column}' has {actual} values but the table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("write to {target} failed: {message}")]
    Write { target: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScoringError>;

impl ScoringError {
    pub fn connectivity(target: impl Into<String>, message: impl ToString) -> Self {
        ScoringError::Connectivity {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn write(target: impl Into<String>, message: impl ToString) -> Self {
        ScoringError::Write {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Short, stable name of the error kind; used in the final log line.
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Config(_) => "config",
            ScoringError::Connectivity { .. } => "connectivity",
            ScoringError::Query(_) => "query",
            ScoringError::NotFound { .. } => "not_found",
            ScoringError::Deserialization { .. } => "deserialization",
            ScoringError::TypeMismatch { .. } => "type_mismatch",
            ScoringError::Inference(_) => "inference",
            ScoringError::ColumnLength { .. } => "column_length",
            ScoringError::Write { .. } => "write",
            ScoringError::Io(_) => "io",
        }
    }
}
