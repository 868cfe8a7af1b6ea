//! Model acquisition: backend init, dual-format fetch, warm-up and progress
//!
//! A load runs through fixed progress checkpoints:
//!
//! | progress | reached after                     |
//! |----------|-----------------------------------|
//! | 10       | load started                      |
//! | 30       | backend initialized               |
//! | 80       | artifact loaded (graph or layers) |
//! | 100      | warm-up attempted, model ready    |
//!
//! Any fatal failure resets progress to 0 and leaves the state `Failed`.
//! Retrying is always caller-initiated and repeats the whole sequence.

use crate::config::AcquisitionConfig;
use crate::runtime::{InferenceRuntime, LoadedModel};
use carapace_core::{Error, InputShape, LoadState, ModelFormat, Result};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Progress after the load starts
pub const PROGRESS_STARTED: u8 = 10;
/// Progress once the backend is initialized
pub const PROGRESS_BACKEND_READY: u8 = 30;
/// Progress once an artifact format has loaded
pub const PROGRESS_ARTIFACT_LOADED: u8 = 80;
/// Progress of a ready model
pub const PROGRESS_COMPLETE: u8 = 100;

/// Reference to a loaded model, held for the session
#[derive(Clone)]
pub struct ModelHandle {
    format: ModelFormat,
    backend: String,
    model: Arc<dyn LoadedModel>,
}

impl ModelHandle {
    /// Format the artifact was loaded as
    pub fn format(&self) -> ModelFormat {
        self.format
    }

    /// Backend identifier reported by the runtime
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// The loaded model
    pub fn model(&self) -> &Arc<dyn LoadedModel> {
        &self.model
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("format", &self.format)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Event emitted while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    Progress(u8),
    Loaded { format: ModelFormat, backend: String },
    Failed(String),
}

type ProgressCallback = Box<dyn Fn(u8) + Send + Sync>;
type ReadyCallback = Box<dyn Fn(&ModelHandle) + Send + Sync>;

/// Loads a model artifact and tracks its load state
pub struct ModelAcquisition {
    runtime: Arc<dyn InferenceRuntime>,
    url: String,
    warmup_shape: InputShape,
    fetch_timeout: Option<Duration>,
    state: RwLock<LoadState>,
    progress: AtomicU8,
    handle: RwLock<Option<ModelHandle>>,
    progress_listeners: RwLock<Vec<ProgressCallback>>,
    ready_listeners: RwLock<Vec<ReadyCallback>>,
    events: broadcast::Sender<LoadEvent>,
}

impl ModelAcquisition {
    /// Create an acquisition for the artifact at `url`
    pub fn new(runtime: Arc<dyn InferenceRuntime>, url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            runtime,
            url: url.into(),
            warmup_shape: InputShape::default(),
            fetch_timeout: None,
            state: RwLock::new(LoadState::Idle),
            progress: AtomicU8::new(0),
            handle: RwLock::new(None),
            progress_listeners: RwLock::new(Vec::new()),
            ready_listeners: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Create an acquisition from configuration
    pub fn from_config(runtime: Arc<dyn InferenceRuntime>, config: &AcquisitionConfig) -> Self {
        let mut acquisition = Self::new(runtime, config.url.clone())
            .with_warmup_shape(config.warmup_shape);
        acquisition.fetch_timeout = config.fetch_timeout();
        acquisition
    }

    /// Set the synthetic warm-up input shape
    pub fn with_warmup_shape(mut self, shape: InputShape) -> Self {
        self.warmup_shape = shape;
        self
    }

    /// Bound each format's fetch by `timeout`
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Register a progress callback.
    ///
    /// Callbacks run synchronously in checkpoint order and must not register
    /// further listeners.
    pub fn on_progress(&self, callback: impl Fn(u8) + Send + Sync + 'static) {
        self.progress_listeners.write().push(Box::new(callback));
    }

    /// Register a callback fired once per successful load
    pub fn on_ready(&self, callback: impl Fn(&ModelHandle) + Send + Sync + 'static) {
        self.ready_listeners.write().push(Box::new(callback));
    }

    /// Subscribe to load events
    pub fn subscribe(&self) -> broadcast::Receiver<LoadEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> LoadState {
        self.state.read().clone()
    }

    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    /// The loaded model, once ready
    pub fn handle(&self) -> Option<ModelHandle> {
        self.handle.read().clone()
    }

    /// Readiness flag handed to the inference engine
    pub fn is_ready(&self) -> bool {
        self.state.read().is_loaded()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Load the model.
    ///
    /// Returns the existing handle if already loaded and [`Error::Busy`] while
    /// another load is running.
    pub async fn load(&self) -> Result<ModelHandle> {
        {
            let mut state = self.state.write();
            match *state {
                LoadState::Loading => return Err(Error::Busy),
                LoadState::Loaded => {
                    if let Some(handle) = self.handle.read().clone() {
                        return Ok(handle);
                    }
                }
                LoadState::Idle | LoadState::Failed(_) => {}
            }
            *state = LoadState::Loading;
        }
        self.run_attempt().await
    }

    /// Repeat the full load after a failure.
    ///
    /// Not capped here; see [`crate::retry::RetryGate`] for the retry policy.
    pub async fn retry(&self) -> Result<ModelHandle> {
        {
            let mut state = self.state.write();
            if !state.is_failed() {
                return Err(Error::invalid_state(format!(
                    "retry requires a failed load, current state: {:?}",
                    *state
                )));
            }
            *state = LoadState::Loading;
        }
        tracing::info!(url = %self.url, "Retrying model load");
        self.run_attempt().await
    }

    async fn run_attempt(&self) -> Result<ModelHandle> {
        self.set_progress(PROGRESS_STARTED);

        match self.acquire().await {
            Ok(handle) => {
                *self.handle.write() = Some(handle.clone());
                *self.state.write() = LoadState::Loaded;
                self.set_progress(PROGRESS_COMPLETE);

                metrics::counter!("carapace_model_loads_total", "outcome" => "loaded").increment(1);
                tracing::info!(
                    format = %handle.format,
                    backend = %handle.backend,
                    "Model ready for inference"
                );

                self.publish(LoadEvent::Loaded {
                    format: handle.format,
                    backend: handle.backend.clone(),
                });
                for callback in self.ready_listeners.read().iter() {
                    callback(&handle);
                }
                Ok(handle)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!("Model loading failed: {}", reason);
                metrics::counter!("carapace_model_loads_total", "outcome" => "failed").increment(1);

                *self.state.write() = LoadState::Failed(reason.clone());
                self.set_progress(0);
                self.publish(LoadEvent::Failed(reason));
                Err(e)
            }
        }
    }

    async fn acquire(&self) -> Result<ModelHandle> {
        tracing::info!("Initializing inference backend");
        let backend = self.runtime.initialize().await.map_err(|e| match e {
            Error::BackendInit(_) => e,
            other => Error::backend_init(other.to_string()),
        })?;
        self.set_progress(PROGRESS_BACKEND_READY);
        tracing::info!(backend = %backend, "Inference backend ready");

        let model = self.fetch_with_fallback().await?;
        self.set_progress(PROGRESS_ARTIFACT_LOADED);

        self.warm_up(model.as_ref()).await;

        Ok(ModelHandle {
            format: model.format(),
            backend,
            model,
        })
    }

    /// Try each format in [`ModelFormat::FALLBACK_ORDER`].
    ///
    /// When every format fails the first failure is the reported cause.
    async fn fetch_with_fallback(&self) -> Result<Arc<dyn LoadedModel>> {
        let mut primary: Option<Error> = None;

        for format in ModelFormat::FALLBACK_ORDER {
            match self.fetch_format(format).await {
                Ok(model) => return Ok(model),
                Err(e) if primary.is_none() => {
                    tracing::warn!("{} artifact failed ({}), trying next format", format, e);
                    primary = Some(e);
                }
                Err(e) => tracing::debug!("{} artifact failed too: {}", format, e),
            }
        }

        let detail = primary.map(failure_detail).unwrap_or_default();
        Err(Error::artifact_fetch(ModelFormat::FALLBACK_ORDER[0], detail))
    }

    async fn fetch_format(&self, format: ModelFormat) -> Result<Arc<dyn LoadedModel>> {
        tracing::debug!(url = %self.url, %format, "Fetching model artifact");
        let fetch = self.runtime.fetch(&self.url, format);
        match self.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| {
                Error::artifact_fetch(format, format!("timed out after {}ms", limit.as_millis()))
            })?,
            None => fetch.await,
        }
    }

    /// Best-effort warm-up; failures are logged and swallowed
    async fn warm_up(&self, model: &dyn LoadedModel) {
        let shape = self.warmup_shape;
        tracing::debug!(?shape, "Running warm-up inference");
        if let Err(e) = model.warm_up(shape).await {
            metrics::counter!("carapace_warmup_failures_total").increment(1);
            tracing::warn!("Warm-up failed, model still usable: {}", e);
        }
    }

    fn set_progress(&self, value: u8) {
        self.progress.store(value, Ordering::SeqCst);
        for callback in self.progress_listeners.read().iter() {
            callback(value);
        }
        self.publish(LoadEvent::Progress(value));
    }

    fn publish(&self, event: LoadEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn failure_detail(error: Error) -> String {
    match error {
        Error::ArtifactFetch { message, .. } => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{PlaceholderModel, SimulatedRuntime};

    #[tokio::test(start_paused = true)]
    async fn test_simulated_load_reaches_complete() {
        let acquisition =
            ModelAcquisition::new(Arc::new(SimulatedRuntime::default()), "models/crabnet");
        assert_eq!(acquisition.state(), LoadState::Idle);
        assert!(!acquisition.is_ready());

        let handle = acquisition.load().await.unwrap();
        assert_eq!(handle.format(), ModelFormat::Graph);
        assert_eq!(handle.backend(), "cpu");
        assert_eq!(acquisition.progress(), PROGRESS_COMPLETE);
        assert!(acquisition.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_requires_failure() {
        let acquisition =
            ModelAcquisition::new(Arc::new(SimulatedRuntime::default()), "models/crabnet");
        assert!(matches!(
            acquisition.retry().await,
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_failure_detail_unwraps_fetch_message() {
        let err = Error::artifact_fetch(ModelFormat::Graph, "404");
        assert_eq!(failure_detail(err), "404");
        assert_eq!(
            failure_detail(Error::Busy),
            "model load already in progress"
        );
    }

    #[test]
    fn test_handle_debug_omits_model() {
        let handle = ModelHandle {
            format: ModelFormat::Layers,
            backend: "cpu".to_string(),
            model: Arc::new(PlaceholderModel::new(ModelFormat::Layers)),
        };
        let debug = format!("{:?}", handle);
        assert!(debug.contains("Layers"));
        assert!(debug.contains("cpu"));
    }
}
