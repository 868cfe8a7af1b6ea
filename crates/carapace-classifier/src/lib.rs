//! Carapace Classifier
//!
//! The inference core of the crab gender classifier.
//!
//! Two components cooperate through a single readiness flag:
//! - [`ModelAcquisition`] loads a model artifact (graph format first, layers
//!   format as fallback), warms it up and reports progress
//! - [`InferenceEngine`] turns an image reference into a
//!   [`ClassificationResult`](carapace_core::ClassificationResult), gated on
//!   that flag
//!
//! Runtimes plug in through [`InferenceRuntime`]; classification logic plugs
//! in through [`ClassificationStrategy`].

pub mod acquisition;
#[cfg(feature = "ml-models")]
pub mod candle;
pub mod config;
pub mod engine;
pub mod retry;
pub mod runtime;
pub mod strategy;

pub use acquisition::{LoadEvent, ModelAcquisition, ModelHandle};
#[cfg(feature = "ml-models")]
pub use candle::{CandleModel, CandleRuntime, CrabNet};
pub use config::{
    AcquisitionConfig, ClassifierConfig, DeviceSpec, PredictionSpec, RetryConfig, RuntimeKind,
    SimulationConfig,
};
pub use engine::InferenceEngine;
pub use retry::RetryGate;
pub use runtime::{InferenceRuntime, LoadedModel, PlaceholderModel, SimulatedRuntime};
pub use strategy::{derive_confidence, ClassificationStrategy, SimulatedStrategy};

use carapace_core::Result;
use std::sync::Arc;
use std::time::Duration;

/// Build the runtime selected by `config`
pub fn runtime_from_config(config: &AcquisitionConfig) -> Result<Arc<dyn InferenceRuntime>> {
    match config.runtime {
        RuntimeKind::Simulated => Ok(Arc::new(SimulatedRuntime::new(Duration::from_millis(
            config.simulated_load_ms,
        )))),
        #[cfg(feature = "ml-models")]
        RuntimeKind::Candle => Ok(Arc::new(CandleRuntime::new(config.device))),
        #[cfg(not(feature = "ml-models"))]
        RuntimeKind::Candle => Err(carapace_core::Error::config(
            "candle runtime requires the 'ml-models' feature",
        )),
    }
}

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::acquisition::{LoadEvent, ModelAcquisition, ModelHandle};
    pub use crate::engine::InferenceEngine;
    pub use crate::retry::RetryGate;
    pub use crate::runtime::{InferenceRuntime, LoadedModel};
    pub use crate::strategy::ClassificationStrategy;
    pub use carapace_core::prelude::*;
}
