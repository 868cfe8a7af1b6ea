//! Retry policy layered over model acquisition

use crate::acquisition::{ModelAcquisition, ModelHandle};
use carapace_core::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Caps how many retries are offered after a failed load.
///
/// [`ModelAcquisition::retry`] itself is unlimited; the gate only decides
/// whether the retry affordance is still shown. A successful load resets
/// the count.
pub struct RetryGate {
    acquisition: Arc<ModelAcquisition>,
    max_retries: u32,
    retries: AtomicU32,
}

impl RetryGate {
    pub fn new(acquisition: Arc<ModelAcquisition>, max_retries: u32) -> Self {
        Self {
            acquisition,
            max_retries,
            retries: AtomicU32::new(0),
        }
    }

    pub fn acquisition(&self) -> &Arc<ModelAcquisition> {
        &self.acquisition
    }

    /// Retries used since the last successful load
    pub fn retry_count(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Retries still on offer
    pub fn retries_remaining(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count())
    }

    /// Whether a retry should be offered right now
    pub fn can_retry(&self) -> bool {
        self.acquisition.state().is_failed() && self.retry_count() < self.max_retries
    }

    /// Initial load
    pub async fn load(&self) -> Result<ModelHandle> {
        let result = self.acquisition.load().await;
        if result.is_ok() {
            self.retries.store(0, Ordering::SeqCst);
        }
        result
    }

    /// Use one retry, if any remain
    pub async fn retry(&self) -> Result<ModelHandle> {
        if !self.acquisition.state().is_failed() {
            return Err(Error::invalid_state("nothing to retry: last load did not fail"));
        }

        let max = self.max_retries;
        let used = self
            .retries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .map_err(|_| Error::RetriesExhausted(max))?;
        tracing::info!(attempt = used + 1, max, "Retrying model load");

        let result = self.acquisition.retry().await;
        if result.is_ok() {
            self.retries.store(0, Ordering::SeqCst);
        } else if used + 1 >= max {
            tracing::warn!("Retry limit reached; reload to try again");
        }
        result
    }
}
