use bytes::Bytes;
use carapace_classifier::{
    runtime_from_config, ClassifierConfig, InferenceEngine, InferenceRuntime, ModelAcquisition,
    ModelHandle, RetryGate,
};
use carapace_core::{ClassificationResult, Error, LoadState, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::DemoConfig;
use crate::state::{EventBus, SessionEvent};
use crate::upload::{ImageStore, ImageValidator, UploadedImage};

/// One user's classifier session
///
/// Holds the model being acquired, the current image and the latest
/// result. Replacing or removing the image always clears the result and
/// cancels any classification still running for the old image.
pub struct Session {
    acquisition: Arc<ModelAcquisition>,
    gate: RetryGate,
    engine: InferenceEngine,
    store: ImageStore,
    validator: ImageValidator,
    current: RwLock<Option<UploadedImage>>,
    event_bus: Arc<EventBus>,
}

impl Session {
    /// Build a session using the runtime selected in `config`
    pub fn new(config: &DemoConfig) -> Result<Self> {
        let runtime = runtime_from_config(&config.classifier.model)?;
        Self::with_runtime(config, runtime)
    }

    /// Build a session around an explicit runtime
    pub fn with_runtime(config: &DemoConfig, runtime: Arc<dyn InferenceRuntime>) -> Result<Self> {
        Self::from_parts(&config.classifier, ImageValidator::new(config.upload.clone()), runtime)
    }

    fn from_parts(
        classifier: &ClassifierConfig,
        validator: ImageValidator,
        runtime: Arc<dyn InferenceRuntime>,
    ) -> Result<Self> {
        classifier.validate()?;

        let event_bus = Arc::new(EventBus::default());
        let acquisition = Arc::new(ModelAcquisition::from_config(runtime, &classifier.model));

        let bus = Arc::clone(&event_bus);
        acquisition.on_progress(move |progress| {
            bus.publish(SessionEvent::ModelProgress { progress });
        });
        let bus = Arc::clone(&event_bus);
        acquisition.on_ready(move |handle| {
            bus.publish(SessionEvent::ModelLoaded {
                format: handle.format(),
                backend: handle.backend().to_string(),
            });
        });

        Ok(Self {
            gate: RetryGate::new(Arc::clone(&acquisition), classifier.retry.max_retries),
            acquisition,
            engine: InferenceEngine::simulated(classifier.simulation.clone())?,
            store: ImageStore::new(),
            validator,
            current: RwLock::new(None),
            event_bus,
        })
    }

    /// Start the initial model load
    pub async fn load_model(&self) -> Result<ModelHandle> {
        let result = self.gate.load().await;
        self.report_load_failure(&result);
        result
    }

    /// Retry a failed load, if retries remain
    pub async fn retry_model(&self) -> Result<ModelHandle> {
        let result = self.gate.retry().await;
        self.report_load_failure(&result);
        result
    }

    fn report_load_failure(&self, result: &Result<ModelHandle>) {
        if let Err(e) = result {
            if matches!(e, Error::Busy | Error::InvalidState(_) | Error::RetriesExhausted(_)) {
                return;
            }
            self.event_bus.publish(SessionEvent::ModelFailed {
                message: e.to_string(),
                retries_remaining: self.gate.retries_remaining(),
                can_retry: self.gate.can_retry(),
            });
        }
    }

    /// Validate and store a new image, replacing any previous one
    pub fn upload(&self, name: &str, bytes: Bytes) -> Result<UploadedImage> {
        let mime = self.validator.validate(name, bytes.len() as u64)?;

        let size = bytes.len() as u64;
        let image = UploadedImage {
            reference: self.store.insert(bytes),
            name: name.to_string(),
            size,
            mime,
        };

        let previous = self.current.write().replace(image.clone());
        if let Some(previous) = previous {
            self.store.revoke(&previous.reference);
        }
        self.engine.reset();

        tracing::debug!(name, size, reference = %image.reference, "Image uploaded");
        self.event_bus.publish(SessionEvent::ImageUploaded {
            image: image.clone(),
        });
        Ok(image)
    }

    /// Drop the current image and its result
    pub fn remove_image(&self) {
        let previous = self.current.write().take();
        self.engine.reset();
        if let Some(previous) = previous {
            self.store.revoke(&previous.reference);
            self.event_bus.publish(SessionEvent::ImageRemoved);
        }
    }

    /// Classify the current image
    pub async fn classify(&self) -> Result<ClassificationResult> {
        let reference = self.current.read().as_ref().map(|image| image.reference.clone());

        match self
            .engine
            .classify(reference.as_ref(), self.acquisition.is_ready())
            .await
        {
            Ok(result) => {
                self.event_bus
                    .publish(SessionEvent::ClassificationComplete { result });
                Ok(result)
            }
            Err(Error::Superseded) => Err(Error::Superseded),
            Err(e) => {
                self.event_bus.publish(SessionEvent::ClassificationFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn current_image(&self) -> Option<UploadedImage> {
        self.current.read().clone()
    }

    /// Bytes of the current image, while its reference is live
    pub fn image_bytes(&self) -> Option<Bytes> {
        let current = self.current.read();
        current.as_ref().and_then(|image| self.store.resolve(&image.reference))
    }

    pub fn result(&self) -> Option<ClassificationResult> {
        self.engine.result()
    }

    pub fn is_classifying(&self) -> bool {
        self.engine.is_classifying()
    }

    pub fn load_state(&self) -> LoadState {
        self.acquisition.state()
    }

    pub fn progress(&self) -> u8 {
        self.acquisition.progress()
    }

    pub fn is_ready(&self) -> bool {
        self.acquisition.is_ready()
    }

    pub fn can_retry(&self) -> bool {
        self.gate.can_retry()
    }

    pub fn retries_remaining(&self) -> u32 {
        self.gate.retries_remaining()
    }

    pub fn model_url(&self) -> &str {
        self.acquisition.url()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_bus.subscribe()
    }
}
