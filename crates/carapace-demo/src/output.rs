//! Rendering of command results for the terminal

use carapace_core::{ClassificationResult, ConfidenceLevel, Gender, Result};
use serde::Serialize;
use std::path::Path;

use crate::model_card::{AccuracyLevel, ModelCard};

/// One `--json` output line for a classified (or rejected) image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationLine {
    /// Image path, lossily converted for non-UTF-8 names
    pub image: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Gender>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<ConfidenceLevel>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClassificationLine {
    pub fn new(path: &Path, outcome: &Result<ClassificationResult>) -> Self {
        let image = path.to_string_lossy().into_owned();
        match outcome {
            Ok(result) => Self {
                image,
                label: Some(result.label),
                confidence: Some(result.confidence),
                level: Some(result.confidence_level()),
                error: None,
            },
            Err(e) => Self {
                image,
                label: None,
                confidence: None,
                level: None,
                error: Some(e.to_string()),
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Human-readable report for one classified image
pub fn text_report(path: &Path, result: &ClassificationResult) -> String {
    format!(
        "{}: {}\n  {}\n  Alternative: {}",
        path.display(),
        result,
        result.confidence_level().description(),
        result.alternative()
    )
}

#[derive(Serialize)]
struct ModelCardJson<'a> {
    #[serde(flatten)]
    card: &'a ModelCard,
    total_samples: u32,
    female_share: f64,
    performance_level: AccuracyLevel,
}

/// Model card as a single JSON document
pub fn model_card_json(card: &ModelCard) -> Result<String> {
    let doc = ModelCardJson {
        card,
        total_samples: card.total_samples(),
        female_share: card.female_share(),
        performance_level: card.performance_level(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}
