use carapace_classifier::ClassifierConfig;
use carapace_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::GlobalArgs;
use crate::model_card::ModelCard;
use crate::upload::UploadLimits;

/// Configuration of the command-line classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Model, retry and simulation sections
    #[serde(flatten)]
    pub classifier: ClassifierConfig,

    /// Upload limits
    #[serde(default)]
    pub upload: UploadLimits,

    /// Figures printed by `carapace info`
    #[serde(default)]
    pub model_card: ModelCard,
}

impl DemoConfig {
    /// Load from a YAML file (defaults if missing) and apply CLI overrides
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        let mut config = Self::from_path(&args.config)?;

        if let Some(model) = &args.model {
            config.classifier.model.url = model.clone();
        }

        if let Some(runtime) = args.runtime {
            config.classifier.model.runtime = runtime;
        }

        if let Some(seed) = args.seed {
            config.classifier.simulation.seed = Some(seed);
        }

        config.classifier.validate()?;
        Ok(config)
    }

    /// Parse `path`, or return defaults when it does not exist
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carapace_classifier::RuntimeKind;
    use std::io::Write;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> GlobalArgs {
        GlobalArgs {
            config,
            model: None,
            runtime: None,
            seed: None,
            verbose: false,
        }
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = DemoConfig::load(&args(PathBuf::from("/nonexistent/carapace.yaml"))).unwrap();
        assert_eq!(config.classifier.model.url, "models/crabnet");
        assert_eq!(config.classifier.retry.max_retries, 3);
        assert_eq!(config.upload.max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_file_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
model:
  url: hf://carapace-ml/crabnet
  runtime: candle
retry:
  max_retries: 5
upload:
  max_bytes: 2048
model_card:
  overall_accuracy: 88.0
"#
        )
        .unwrap();

        let mut cli = args(file.path().to_path_buf());
        let config = DemoConfig::load(&cli).unwrap();
        assert_eq!(config.classifier.model.url, "hf://carapace-ml/crabnet");
        assert_eq!(config.classifier.model.runtime, RuntimeKind::Candle);
        assert_eq!(config.classifier.retry.max_retries, 5);
        assert_eq!(config.upload.max_bytes, 2048);
        assert_eq!(config.upload.min_bytes, 1024);
        assert_eq!(config.model_card.overall_accuracy, 88.0);
        assert_eq!(config.model_card.male_accuracy, 96.8);

        cli.model = Some("models/local".into());
        cli.runtime = Some(RuntimeKind::Simulated);
        cli.seed = Some(42);
        let config = DemoConfig::load(&cli).unwrap();
        assert_eq!(config.classifier.model.url, "models/local");
        assert_eq!(config.classifier.model.runtime, RuntimeKind::Simulated);
        assert_eq!(config.classifier.simulation.seed, Some(42));
    }

    #[test]
    fn test_malformed_yaml_is_a_yaml_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model: [unclosed").unwrap();

        let err = DemoConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, carapace_core::Error::Yaml(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "simulation:\n  min_latency_ms: 3000\n  max_latency_ms: 1000"
        )
        .unwrap();

        assert!(DemoConfig::load(&args(file.path().to_path_buf())).is_err());
    }
}
