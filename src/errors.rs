use thiserror::Error;

/// Errors surfaced by calibration export, configuration and the video sink.
///
/// Normalization and recorder transitions never produce an error; only I/O
/// at the edges of the pipeline can fail.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Video sink not ready: {0}")]
    NotReady(String),

    #[error("Frame out of order: timestamp {current} does not follow {previous}")]
    OutOfOrder { previous: f64, current: f64 },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl CalibrationError {
    /// True for failures a caller can log and move past without tearing
    /// down the capture pipeline.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CalibrationError::Config(_))
    }
}

impl From<config::ConfigError> for CalibrationError {
    fn from(error: config::ConfigError) -> Self {
        CalibrationError::Config(error.to_string())
    }
}

impl From<tokio::task::JoinError> for CalibrationError {
    fn from(error: tokio::task::JoinError) -> Self {
        CalibrationError::Task(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
