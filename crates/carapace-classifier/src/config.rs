//! Configuration for model acquisition and classification

use carapace_core::{Error, Gender, InputShape, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classifier configuration (usually a section of a YAML file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Model artifact and runtime settings
    #[serde(default)]
    pub model: AcquisitionConfig,

    /// Retry presentation policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Simulated inference settings
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl ClassifierConfig {
    /// Check every section for inconsistent values
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.simulation.validate()
    }
}

/// Model acquisition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Artifact location: local directory, `hf://<repo>` or `http(s)://` base URL
    #[serde(default = "default_model_url")]
    pub url: String,

    /// Runtime used to load the artifact
    #[serde(default)]
    pub runtime: RuntimeKind,

    /// Device for the Candle runtime
    #[serde(default)]
    pub device: DeviceSpec,

    /// Shape of the synthetic warm-up input
    #[serde(default)]
    pub warmup_shape: InputShape,

    /// Per-format fetch timeout; absent means wait indefinitely
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,

    /// Artificial fetch delay of the simulated runtime
    #[serde(default = "default_simulated_load_ms")]
    pub simulated_load_ms: u64,
}

impl AcquisitionConfig {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::config("model url must not be empty"));
        }
        if self.warmup_shape.elem_count() == 0 {
            return Err(Error::config("warm-up shape must have non-zero dimensions"));
        }
        Ok(())
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            runtime: RuntimeKind::default(),
            device: DeviceSpec::default(),
            warmup_shape: InputShape::default(),
            fetch_timeout_ms: None,
            simulated_load_ms: default_simulated_load_ms(),
        }
    }
}

/// Which runtime backs model acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Demo mode: no artifact is read
    #[default]
    Simulated,
    /// Candle-backed loading of a real artifact
    Candle,
}

impl std::str::FromStr for RuntimeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simulated" | "demo" => Ok(Self::Simulated),
            "candle" => Ok(Self::Candle),
            other => Err(format!("unknown runtime '{}' (expected simulated or candle)", other)),
        }
    }
}

/// Device specification (for config files)
///
/// Written as `device: { kind: cuda, index: 1 }`; `index` defaults to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda {
        #[serde(default)]
        index: Option<usize>,
    },
    Metal {
        #[serde(default)]
        index: Option<usize>,
    },
}

/// Retry presentation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of retries offered after the first failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

/// One entry of the simulated prediction table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionSpec {
    pub label: Gender,
    pub confidence: f64,
}

/// Simulated inference settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Lower bound of the artificial latency
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: u64,

    /// Upper bound of the artificial latency
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: u64,

    /// Symmetric jitter added to the base confidence
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Lower clamp for jittered confidence
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Upper clamp for jittered confidence
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,

    /// Base predictions, drawn uniformly
    #[serde(default = "default_predictions")]
    pub predictions: Vec<PredictionSpec>,

    /// Fixed RNG seed for reproducible draws
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SimulationConfig {
    /// Same table and bounds with no artificial latency
    pub fn instant() -> Self {
        Self {
            min_latency_ms: 0,
            max_latency_ms: 0,
            ..Default::default()
        }
    }

    /// Set the RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_latency_ms > self.max_latency_ms {
            return Err(Error::config(format!(
                "min_latency_ms ({}) exceeds max_latency_ms ({})",
                self.min_latency_ms, self.max_latency_ms
            )));
        }
        if !(self.jitter >= 0.0) {
            return Err(Error::config("jitter must be non-negative"));
        }
        if !(self.min_confidence <= self.max_confidence)
            || self.min_confidence < 0.0
            || self.max_confidence > 100.0
        {
            return Err(Error::config(format!(
                "confidence bounds [{}, {}] must be ordered within [0, 100]",
                self.min_confidence, self.max_confidence
            )));
        }
        if self.predictions.is_empty() {
            return Err(Error::config("prediction table must not be empty"));
        }
        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
            jitter: default_jitter(),
            min_confidence: default_min_confidence(),
            max_confidence: default_max_confidence(),
            predictions: default_predictions(),
            seed: None,
        }
    }
}

fn default_model_url() -> String {
    "models/crabnet".to_string()
}

fn default_simulated_load_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_min_latency_ms() -> u64 {
    1500
}

fn default_max_latency_ms() -> u64 {
    2500
}

fn default_jitter() -> f64 {
    5.0
}

fn default_min_confidence() -> f64 {
    60.0
}

fn default_max_confidence() -> f64 {
    99.0
}

fn default_predictions() -> Vec<PredictionSpec> {
    [
        (Gender::Male, 94.7),
        (Gender::Female, 87.3),
        (Gender::Male, 92.1),
        (Gender::Female, 89.6),
        (Gender::Male, 76.8),
        (Gender::Female, 83.4),
    ]
    .into_iter()
    .map(|(label, confidence)| PredictionSpec { label, confidence })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.simulation.predictions.len(), 6);
        assert_eq!(config.model.runtime, RuntimeKind::Simulated);
        assert!(config.model.fetch_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_table_is_balanced() {
        let table = default_predictions();
        let males = table.iter().filter(|p| p.label == Gender::Male).count();
        assert_eq!(males, 3);
        assert_eq!(table.len() - males, 3);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
model:
  url: "hf://carapace-ml/crabnet"
  runtime: candle
  device:
    kind: cuda
    index: 1
  fetch_timeout_ms: 30000
simulation:
  jitter: 2.5
  seed: 7
"#;
        let config: ClassifierConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model.runtime, RuntimeKind::Candle);
        assert_eq!(config.model.device, DeviceSpec::Cuda { index: Some(1) });
        assert_eq!(config.model.fetch_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.simulation.jitter, 2.5);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.min_latency_ms, 1500);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_parse_device_kinds() {
        let device = |yaml: &str| serde_yaml::from_str::<DeviceSpec>(yaml).unwrap();

        assert_eq!(device("kind: cpu"), DeviceSpec::Cpu);
        assert_eq!(device("kind: metal"), DeviceSpec::Metal { index: None });
        assert_eq!(
            device("kind: cuda\nindex: 2"),
            DeviceSpec::Cuda { index: Some(2) }
        );
        assert!(serde_yaml::from_str::<DeviceSpec>("kind: tpu").is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_latency() {
        let config = SimulationConfig {
            min_latency_ms: 3000,
            max_latency_ms: 1000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_table() {
        let config = SimulationConfig {
            predictions: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_runtime_kind_from_str() {
        assert_eq!("candle".parse::<RuntimeKind>().unwrap(), RuntimeKind::Candle);
        assert_eq!("Simulated".parse::<RuntimeKind>().unwrap(), RuntimeKind::Simulated);
        assert!("onnx".parse::<RuntimeKind>().is_err());
    }
}
