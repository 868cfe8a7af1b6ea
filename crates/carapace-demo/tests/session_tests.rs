//! Session tests: upload handling, result lifetime and load/retry flows

use async_trait::async_trait;
use bytes::Bytes;
use carapace_classifier::{
    InferenceRuntime, LoadedModel, PlaceholderModel, SimulatedRuntime, SimulationConfig,
};
use carapace_core::{Error, LoadState, ModelFormat, Result};
use carapace_demo::{DemoConfig, Session, SessionEvent};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Backend init fails for the first `failures` attempts
struct FlakyRuntime {
    failures: u32,
    attempts: AtomicU32,
}

impl FlakyRuntime {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl InferenceRuntime for FlakyRuntime {
    async fn initialize(&self) -> Result<String> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            Err(Error::backend_init("network unreachable"))
        } else {
            Ok("cpu".to_string())
        }
    }

    async fn fetch(&self, _url: &str, format: ModelFormat) -> Result<Arc<dyn LoadedModel>> {
        Ok(Arc::new(PlaceholderModel::new(format)))
    }
}

fn config() -> DemoConfig {
    let mut config = DemoConfig::default();
    config.classifier.simulation = SimulationConfig::instant().with_seed(3);
    config
}

fn ready_session() -> Session {
    Session::with_runtime(&config(), Arc::new(SimulatedRuntime::new(Duration::ZERO))).unwrap()
}

fn jpeg(size: usize) -> Bytes {
    Bytes::from(vec![0xFFu8; size])
}

#[tokio::test]
async fn test_upload_rejects_invalid_files() {
    let session = ready_session();

    let err = session.upload("notes.txt", jpeg(4096)).unwrap_err();
    assert!(matches!(err, Error::InvalidImage(_)));

    let err = session.upload("crab.jpg", jpeg(512)).unwrap_err();
    assert!(err.to_string().contains("corrupted or too small"));

    let err = session.upload("crab.jpg", jpeg(10 * 1024 * 1024 + 1)).unwrap_err();
    assert!(err.to_string().contains("smaller than 10MB"));

    assert!(session.current_image().is_none());
}

#[tokio::test]
async fn test_classify_requires_image_and_model() {
    let session = ready_session();

    // Model not loaded yet
    session.upload("crab.jpg", jpeg(4096)).unwrap();
    assert!(matches!(session.classify().await, Err(Error::NotReady)));

    session.load_model().await.unwrap();
    session.remove_image();
    assert!(matches!(session.classify().await, Err(Error::NotReady)));
}

#[tokio::test]
async fn test_upload_replaces_image_and_clears_result() {
    let session = ready_session();
    session.load_model().await.unwrap();

    let first = session.upload("first.png", jpeg(4096)).unwrap();
    let result = session.classify().await.unwrap();
    assert!((60.0..=99.0).contains(&result.confidence));
    assert_eq!(session.result(), Some(result));

    let second = session.upload("second.png", jpeg(8192)).unwrap();
    assert_ne!(first.reference, second.reference);
    assert!(session.result().is_none());
    assert_eq!(session.current_image(), Some(second));
    assert_eq!(session.image_bytes().unwrap().len(), 8192);
}

#[tokio::test]
async fn test_remove_image_clears_result() {
    let session = ready_session();
    session.load_model().await.unwrap();

    session.upload("crab.webp", jpeg(4096)).unwrap();
    session.classify().await.unwrap();
    assert!(session.result().is_some());

    session.remove_image();
    assert!(session.result().is_none());
    assert!(session.current_image().is_none());
    assert!(session.image_bytes().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_remove_during_classification_yields_no_result() {
    let mut config = DemoConfig::default();
    config.classifier.simulation = SimulationConfig::default().with_seed(9);
    let session = Arc::new(
        Session::with_runtime(&config, Arc::new(SimulatedRuntime::new(Duration::ZERO))).unwrap(),
    );
    session.load_model().await.unwrap();
    session.upload("crab.jpg", jpeg(4096)).unwrap();

    let pending = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.classify().await })
    };
    while !session.is_classifying() {
        tokio::task::yield_now().await;
    }

    session.remove_image();

    assert!(matches!(pending.await.unwrap(), Err(Error::Superseded)));
    assert!(session.result().is_none());
}

#[tokio::test]
async fn test_failed_load_then_successful_retry() {
    let session = Session::with_runtime(&config(), Arc::new(FlakyRuntime::new(1))).unwrap();
    let mut events = session.subscribe();

    let err = session.load_model().await.unwrap_err();
    assert!(err.to_string().contains("network unreachable"));
    assert!(session.load_state().is_failed());
    assert_eq!(session.progress(), 0);
    assert!(session.can_retry());
    assert_eq!(session.retries_remaining(), 3);

    let handle = session.retry_model().await.unwrap();
    assert_eq!(handle.format(), ModelFormat::Graph);
    assert_eq!(session.load_state(), LoadState::Loaded);
    assert_eq!(session.progress(), 100);

    let mut saw_failure = false;
    let mut saw_loaded = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::ModelFailed {
                retries_remaining,
                can_retry,
                ..
            } => {
                assert_eq!(retries_remaining, 3);
                assert!(can_retry);
                saw_failure = true;
            }
            SessionEvent::ModelLoaded { format, backend } => {
                assert_eq!(format, ModelFormat::Graph);
                assert_eq!(backend, "cpu");
                saw_loaded = true;
            }
            _ => {}
        }
    }
    assert!(saw_failure && saw_loaded);
}

#[tokio::test]
async fn test_retries_run_out() {
    let session = Session::with_runtime(&config(), Arc::new(FlakyRuntime::new(u32::MAX))).unwrap();

    assert!(session.load_model().await.is_err());
    for remaining in (0..3).rev() {
        assert!(session.can_retry());
        assert!(session.retry_model().await.is_err());
        assert_eq!(session.retries_remaining(), remaining);
    }

    assert!(!session.can_retry());
    assert!(matches!(
        session.retry_model().await,
        Err(Error::RetriesExhausted(3))
    ));
}

#[tokio::test]
async fn test_classification_events() {
    let session = ready_session();
    let mut events = session.subscribe();
    session.load_model().await.unwrap();

    session.upload("crab.jpg", jpeg(4096)).unwrap();
    let result = session.classify().await.unwrap();
    session.remove_image();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if !matches!(event, SessionEvent::ModelProgress { .. } | SessionEvent::ModelLoaded { .. }) {
            seen.push(event);
        }
    }

    assert_eq!(seen.len(), 3);
    assert!(matches!(seen[0], SessionEvent::ImageUploaded { .. }));
    assert_eq!(seen[1], SessionEvent::ClassificationComplete { result });
    assert_eq!(seen[2], SessionEvent::ImageRemoved);
}
