//! Extension points for model runtimes.
//!
//! Model acquisition talks to an inference runtime only through these
//! traits, so a Candle, ONNX or simulated backend can be swapped in without
//! touching the load sequence.

use async_trait::async_trait;
use carapace_core::{InputShape, ModelFormat, Result};
use std::sync::Arc;
use std::time::Duration;

/// Runtime capable of loading model artifacts
#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    /// Initialize the compute backend and return its identifier
    async fn initialize(&self) -> Result<String>;

    /// Fetch and load the artifact at `url`, interpreting it as `format`
    async fn fetch(&self, url: &str, format: ModelFormat) -> Result<Arc<dyn LoadedModel>>;
}

/// A model artifact loaded by an [`InferenceRuntime`]
#[async_trait]
pub trait LoadedModel: Send + Sync {
    /// Format the artifact was loaded as
    fn format(&self) -> ModelFormat;

    /// Run one forward pass on a synthetic input of `shape`.
    ///
    /// The synthetic input must be released before this returns, whatever
    /// the outcome.
    async fn warm_up(&self, shape: InputShape) -> Result<()>;
}

/// Demo-mode runtime that never reads an artifact
///
/// Fetching waits for the configured delay and yields a placeholder model,
/// which is how the classifier behaves until a trained artifact is hosted.
pub struct SimulatedRuntime {
    load_delay: Duration,
}

impl SimulatedRuntime {
    pub fn new(load_delay: Duration) -> Self {
        Self { load_delay }
    }
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

#[async_trait]
impl InferenceRuntime for SimulatedRuntime {
    async fn initialize(&self) -> Result<String> {
        Ok("cpu".to_string())
    }

    async fn fetch(&self, url: &str, format: ModelFormat) -> Result<Arc<dyn LoadedModel>> {
        tracing::debug!("Simulating {} artifact load from {}", format, url);
        tokio::time::sleep(self.load_delay).await;
        Ok(Arc::new(PlaceholderModel::new(format)))
    }
}

/// Model stand-in returned by [`SimulatedRuntime`]
#[derive(Debug)]
pub struct PlaceholderModel {
    format: ModelFormat,
}

impl PlaceholderModel {
    pub fn new(format: ModelFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl LoadedModel for PlaceholderModel {
    fn format(&self) -> ModelFormat {
        self.format
    }

    async fn warm_up(&self, _shape: InputShape) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_simulated_runtime_loads_requested_format() {
        let runtime = SimulatedRuntime::default();
        assert_eq!(runtime.initialize().await.unwrap(), "cpu");

        let start = tokio::time::Instant::now();
        let model = runtime.fetch("models/crabnet", ModelFormat::Graph).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert_eq!(model.format(), ModelFormat::Graph);
        assert!(model.warm_up(InputShape::default()).await.is_ok());
    }
}
