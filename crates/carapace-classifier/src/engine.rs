//! Inference engine: gated classification with a single result slot

use crate::config::SimulationConfig;
use crate::strategy::{ClassificationStrategy, SimulatedStrategy};
use carapace_core::{ClassificationResult, Error, ImageRef, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

/// Clears the in-flight marker if the owning call is dropped before it finishes
struct InFlightGuard<'a> {
    engine: &'a InferenceEngine,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = self.engine.inflight.lock();
        if inflight.as_ref().map(|f| f.generation) == Some(self.generation) {
            *inflight = None;
        }
    }
}

/// Produces classification results and holds the latest one.
///
/// The most recently started call wins: starting a new classification
/// cancels the one in flight, and a cancelled call never writes the slot.
pub struct InferenceEngine {
    strategy: Arc<dyn ClassificationStrategy>,
    slot: RwLock<Option<ClassificationResult>>,
    inflight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
}

impl InferenceEngine {
    /// Create an engine backed by `strategy`
    pub fn new(strategy: Arc<dyn ClassificationStrategy>) -> Self {
        Self {
            strategy,
            slot: RwLock::new(None),
            inflight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Create an engine using the simulated strategy
    pub fn simulated(config: SimulationConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(SimulatedStrategy::new(config)?)))
    }

    /// The held result, if any
    pub fn result(&self) -> Option<ClassificationResult> {
        *self.slot.read()
    }

    pub fn is_classifying(&self) -> bool {
        self.inflight.lock().is_some()
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Classify `image` if present and the model is ready.
    ///
    /// Fails with [`Error::NotReady`] without touching the held result when
    /// either precondition is missing, and with [`Error::Superseded`] when a
    /// newer call or a reset overtakes this one.
    pub async fn classify(
        &self,
        image: Option<&ImageRef>,
        model_ready: bool,
    ) -> Result<ClassificationResult> {
        let image = match image {
            Some(image) if model_ready => image,
            _ => {
                tracing::warn!(
                    has_image = image.is_some(),
                    model_ready,
                    "Cannot classify: upload an image and ensure the model is loaded"
                );
                return Err(Error::NotReady);
            }
        };

        let (generation, token) = self.begin();
        let _guard = InFlightGuard {
            engine: self,
            generation,
        };
        tracing::info!(%image, generation, strategy = self.strategy.name(), "Starting classification");
        let started = Instant::now();

        let outcome = tokio::select! {
            result = self.strategy.classify(image) => result,
            _ = token.cancelled() => Err(Error::Superseded),
        };

        self.finish(generation, outcome, started)
    }

    /// Clear the held result and cancel any classification in flight
    pub fn reset(&self) {
        let mut inflight = self.inflight.lock();
        if let Some(previous) = inflight.take() {
            tracing::debug!(generation = previous.generation, "Cancelling classification on reset");
            previous.token.cancel();
        }
        *self.slot.write() = None;
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut inflight = self.inflight.lock();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = inflight.take() {
            tracing::debug!(generation = previous.generation, "Cancelling superseded classification");
            previous.token.cancel();
        }
        let token = CancellationToken::new();
        *inflight = Some(InFlight {
            generation,
            token: token.clone(),
        });
        (generation, token)
    }

    fn finish(
        &self,
        generation: u64,
        outcome: Result<ClassificationResult>,
        started: Instant,
    ) -> Result<ClassificationResult> {
        let mut inflight = self.inflight.lock();
        let current = inflight.as_ref().map(|f| f.generation) == Some(generation);
        if !current {
            return Err(Error::Superseded);
        }
        *inflight = None;

        match outcome {
            Ok(result) => {
                *self.slot.write() = Some(result);

                metrics::counter!("carapace_classifications_total", "label" => result.label.as_str())
                    .increment(1);
                metrics::histogram!("carapace_classification_latency_ms")
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                tracing::info!(
                    label = %result.label,
                    confidence = result.confidence,
                    "Classification successful"
                );
                Ok(result)
            }
            Err(e) => {
                *self.slot.write() = None;
                tracing::error!("Classification error: {}", e);
                Err(match e {
                    Error::Classification(_) => e,
                    other => Error::classification(other.to_string()),
                })
            }
        }
    }
}
