//! Core types for Carapace

use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicted crab gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// The opposite label
    pub fn other(self) -> Self {
        match self {
            Self::Male => Self::Female,
            Self::Female => Self::Male,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one image
///
/// Confidence is a percentage in `[0, 100]` with one decimal place. The
/// constructor enforces both, so any strategy producing a result upholds
/// the external contract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Predicted label
    pub label: Gender,

    /// Confidence percentage (0.0-100.0, one decimal)
    pub confidence: f64,
}

impl ClassificationResult {
    /// Create a new classification result
    pub fn new(label: Gender, confidence: f64) -> Self {
        Self {
            label,
            confidence: round_tenths(confidence.clamp(0.0, 100.0)),
        }
    }

    /// Confidence bucket used when presenting the result
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_confidence(self.confidence)
    }

    /// The opposite label with the remaining probability mass
    pub fn alternative(&self) -> Self {
        Self::new(self.label.other(), 100.0 - self.confidence)
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}% confidence)", self.label, self.confidence)
    }
}

/// Round to one decimal place
pub fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Presentation bucket for a confidence value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// 90 and above
    VeryHigh,
    /// 75 up to 90
    High,
    /// 60 up to 75
    Moderate,
    /// Below 60
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 90.0 {
            Self::VeryHigh
        } else if confidence >= 75.0 {
            Self::High
        } else if confidence >= 60.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    /// Human-readable interpretation of the bucket
    pub fn description(self) -> &'static str {
        match self {
            Self::VeryHigh => "Very high confidence - the model is very certain about this prediction",
            Self::High => "High confidence - the model shows strong indicators for this gender",
            Self::Moderate => "Moderate confidence - some uncertainty in the prediction",
            Self::Low => "Low confidence - consider retaking the image for better results",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::VeryHigh => "Very High",
            Self::High => "High",
            Self::Moderate => "Moderate",
            Self::Low => "Low",
        };
        f.write_str(s)
    }
}

/// Opaque reference to uploaded image bytes (e.g. `blob:<uuid>`)
///
/// The engine never decodes the bytes behind it; resolution is the upload
/// layer's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this points into an in-memory blob store
    pub fn is_blob(&self) -> bool {
        self.0.starts_with("blob:")
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model acquisition state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    /// Terminal for an attempt; carries the reported failure message
    Failed(String),
}

impl LoadState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Failure message, if the last attempt failed
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Initializing..."),
            Self::Loading => f.write_str("Loading AI model..."),
            Self::Loaded => f.write_str("Model ready for classification"),
            Self::Failed(_) => f.write_str("Model loading failed"),
        }
    }
}

/// Structural variant of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// Pre-optimized graph representation, tried first
    Graph,
    /// Layer-based representation, the fallback
    Layers,
}

impl ModelFormat {
    /// Formats in the order they are attempted
    pub const FALLBACK_ORDER: [ModelFormat; 2] = [ModelFormat::Graph, ModelFormat::Layers];
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph => f.write_str("graph"),
            Self::Layers => f.write_str("layers"),
        }
    }
}

/// Input shape expected by the model, in height x width x channels order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl InputShape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Total number of elements for a single-image batch
    pub fn elem_count(&self) -> usize {
        self.height * self.width * self.channels
    }
}

impl Default for InputShape {
    fn default() -> Self {
        Self::new(224, 224, 3)
    }
}
