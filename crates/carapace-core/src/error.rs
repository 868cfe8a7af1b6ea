//! Error types for Carapace

use crate::types::ModelFormat;

/// Result type alias using Carapace's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Carapace operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The inference backend could not be initialized
    #[error("backend initialization failed: {0}")]
    BackendInit(String),

    /// Neither artifact format could be loaded.
    ///
    /// Only the first format's failure is reported.
    #[error("failed to load model artifact as {format}: {message}")]
    ArtifactFetch {
        /// Format whose failure is reported
        format: ModelFormat,
        /// Failure detail for that format
        message: String,
    },

    /// Warm-up inference failed (never fatal to a load)
    #[error("warm-up failed: {0}")]
    Warmup(String),

    /// Classification requested without an image or before the model is ready
    #[error("cannot classify: upload an image and ensure the model is loaded")]
    NotReady,

    /// Unexpected fault while classifying
    #[error("classification failed: {0}")]
    Classification(String),

    /// A newer classification request replaced this one
    #[error("classification superseded by a newer request")]
    Superseded,

    /// A load is already running
    #[error("model load already in progress")]
    Busy,

    /// Operation not valid in the current load state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Retry requested after the retry allowance was used up
    #[error("retry limit of {0} reached")]
    RetriesExhausted(u32),

    /// Rejected upload
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new backend initialization error
    pub fn backend_init(msg: impl Into<String>) -> Self {
        Self::BackendInit(msg.into())
    }

    /// Create a new artifact fetch error for the given format
    pub fn artifact_fetch(format: ModelFormat, msg: impl Into<String>) -> Self {
        Self::ArtifactFetch {
            format,
            message: msg.into(),
        }
    }

    /// Create a new warm-up error
    pub fn warmup(msg: impl Into<String>) -> Self {
        Self::Warmup(msg.into())
    }

    /// Create a new classification error
    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    /// Create a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a new invalid image error
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
