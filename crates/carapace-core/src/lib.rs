//! Carapace Core
//!
//! Core types and error handling shared across Carapace components.
//!
//! This crate provides:
//! - The error taxonomy for model acquisition and classification
//! - Domain value types: labels, classification results, load states
//! - Opaque image references handed from the upload layer to the engine

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    ClassificationResult, ConfidenceLevel, Gender, ImageRef, InputShape, LoadState, ModelFormat,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ClassificationResult, Gender, ImageRef, LoadState, ModelFormat};
}
