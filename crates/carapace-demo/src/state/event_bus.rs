use carapace_core::{ClassificationResult, ModelFormat};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::upload::UploadedImage;

/// Session activity, in the order it happened
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    ModelProgress {
        progress: u8,
    },
    ModelLoaded {
        format: ModelFormat,
        backend: String,
    },
    ModelFailed {
        message: String,
        retries_remaining: u32,
        can_retry: bool,
    },
    ImageUploaded {
        image: UploadedImage,
    },
    ImageRemoved,
    ClassificationComplete {
        result: ClassificationResult,
    },
    ClassificationFailed {
        message: String,
    },
}

/// Event bus for broadcasting session events to observers
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
