use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record: '{line}'")]
    MalformedRecord { line: String },

    #[error("Invalid temperature: '{value}'")]
    InvalidTemperature { value: String },

    #[error("Truncated input: {} trailing bytes without a line terminator", trailing.len())]
    TruncatedInput { trailing: Vec<u8> },

    #[error("Record longer than the configured maximum: {length} bytes (max {max})")]
    RecordTooLong { length: usize, max: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Aggregation shard {shard} panicked")]
    WorkerPanicked { shard: usize },

    #[error("Processing cancelled")]
    Cancelled,
}

impl ProcessingError {
    pub(crate) fn malformed(line: &[u8]) -> Self {
        ProcessingError::MalformedRecord {
            line: String::from_utf8_lossy(line).into_owned(),
        }
    }

    pub(crate) fn invalid_temperature(value: &[u8]) -> Self {
        ProcessingError::InvalidTemperature {
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }

    /// True for errors that describe bad input data rather than a failing environment.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ProcessingError::MalformedRecord { .. }
                | ProcessingError::InvalidTemperature { .. }
                | ProcessingError::TruncatedInput { .. }
        )
    }
}

impl From<config::ConfigError> for ProcessingError {
    fn from(err: config::ConfigError) -> Self {
        ProcessingError::Config(err.to_string())
    }
}
