use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// The Error type for upload processing and monitoring operations.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Image decoding error: {source}")]
    ImageError {
        #[from]
        source: image::ImageError,
    },

    /// The upload was rejected before any worker was launched
    /// (missing part, empty payload, over the size ceiling).
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// A pipeline stage inside the worker failed.
    #[error("Worker stage '{stage}' failed: {detail}")]
    WorkerStage { stage: String, detail: String },

    /// The worker terminated without sending a terminal message.
    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Health probe error: {0}")]
    ProbeError(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

// reqwest errors only surface from the watchdog's probe path, so they are
// collapsed to a string here instead of carrying the full source chain.
impl From<reqwest::Error> for ProcessingError {
    fn from(err: reqwest::Error) -> Self {
        ProcessingError::ProbeError(err.to_string())
    }
}
