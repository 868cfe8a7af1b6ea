//! Classification strategies
//!
//! The engine delegates the actual labelling of an image to a
//! [`ClassificationStrategy`]. The shipped [`SimulatedStrategy`] draws from a
//! fixed prediction table with jitter; a model-backed strategy can replace it
//! without changing any caller.

use crate::config::{PredictionSpec, SimulationConfig};
use async_trait::async_trait;
use carapace_core::types::round_tenths;
use carapace_core::{ClassificationResult, ImageRef, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Trait for anything that can label an uploaded image
#[async_trait]
pub trait ClassificationStrategy: Send + Sync {
    /// Classify the image behind `image`
    async fn classify(&self, image: &ImageRef) -> Result<ClassificationResult>;

    /// Strategy name, for logs
    fn name(&self) -> &str;
}

/// Table-driven stand-in for model inference
pub struct SimulatedStrategy {
    config: SimulationConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedStrategy {
    /// Create a strategy from validated settings
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            rng: Mutex::new(rng),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Pick the artificial latency for one request
    fn draw_latency(&self) -> Duration {
        let ms = self
            .rng
            .lock()
            .gen_range(self.config.min_latency_ms..=self.config.max_latency_ms);
        Duration::from_millis(ms)
    }

    /// Pick a table entry and its jitter
    fn draw_prediction(&self) -> (PredictionSpec, f64) {
        let mut rng = self.rng.lock();
        let entry = self.config.predictions[rng.gen_range(0..self.config.predictions.len())];
        let jitter = rng.gen_range(-self.config.jitter..=self.config.jitter);
        (entry, jitter)
    }
}

impl Default for SimulatedStrategy {
    fn default() -> Self {
        Self {
            config: SimulationConfig::default(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

/// Apply jitter to a base confidence, clamp it to `[min, max]` and round to
/// one decimal.
pub fn derive_confidence(base: f64, jitter: f64, min: f64, max: f64) -> f64 {
    round_tenths((base + jitter).clamp(min, max))
}

#[async_trait]
impl ClassificationStrategy for SimulatedStrategy {
    async fn classify(&self, image: &ImageRef) -> Result<ClassificationResult> {
        let latency = self.draw_latency();
        tracing::debug!(%image, latency_ms = latency.as_millis() as u64, "Simulating inference");
        tokio::time::sleep(latency).await;

        let (entry, jitter) = self.draw_prediction();
        let confidence = derive_confidence(
            entry.confidence,
            jitter,
            self.config.min_confidence,
            self.config.max_confidence,
        );

        Ok(ClassificationResult::new(entry.label, confidence))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carapace_core::Gender;
    use proptest::prelude::*;

    fn is_tenths(value: f64) -> bool {
        let scaled = value * 10.0;
        (scaled - scaled.round()).abs() < 1e-6
    }

    #[test]
    fn test_derive_confidence_clamps() {
        assert_eq!(derive_confidence(94.7, 5.0, 60.0, 99.0), 99.0);
        assert_eq!(derive_confidence(62.0, -5.0, 60.0, 99.0), 60.0);
        assert_eq!(derive_confidence(87.3, 0.0, 60.0, 99.0), 87.3);
    }

    #[test]
    fn test_derive_confidence_rounds() {
        assert_eq!(derive_confidence(87.3, 1.234, 60.0, 99.0), 88.5);
        assert_eq!(derive_confidence(76.8, -2.26, 60.0, 99.0), 74.5);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SimulationConfig {
            jitter: -1.0,
            ..Default::default()
        };
        assert!(SimulatedStrategy::new(config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_within_range() {
        let strategy = SimulatedStrategy::new(SimulationConfig::default().with_seed(1)).unwrap();
        let image = ImageRef::new("blob:test");

        for _ in 0..10 {
            let start = tokio::time::Instant::now();
            strategy.classify(&image).await.unwrap();
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(1500));
            assert!(elapsed <= Duration::from_millis(2501));
        }
    }

    #[tokio::test]
    async fn test_results_stay_in_contract() {
        let strategy = SimulatedStrategy::new(SimulationConfig::instant().with_seed(42)).unwrap();
        let image = ImageRef::new("blob:test");

        let mut males = 0;
        for _ in 0..500 {
            let result = strategy.classify(&image).await.unwrap();
            assert!((60.0..=99.0).contains(&result.confidence));
            assert!(is_tenths(result.confidence));
            if result.label == Gender::Male {
                males += 1;
            }
        }
        // 3 of 6 table entries are Male
        assert!(males > 175 && males < 325, "males = {}", males);
    }

    #[tokio::test]
    async fn test_seeded_strategies_agree() {
        let a = SimulatedStrategy::new(SimulationConfig::instant().with_seed(9)).unwrap();
        let b = SimulatedStrategy::new(SimulationConfig::instant().with_seed(9)).unwrap();
        let image = ImageRef::new("blob:test");

        for _ in 0..20 {
            assert_eq!(
                a.classify(&image).await.unwrap(),
                b.classify(&image).await.unwrap()
            );
        }
    }

    proptest! {
        #[test]
        fn prop_confidence_bounds(
            idx in 0usize..6,
            jitter in -5.0f64..=5.0,
        ) {
            let table = SimulationConfig::default().predictions;
            let c = derive_confidence(table[idx].confidence, jitter, 60.0, 99.0);
            prop_assert!((60.0..=99.0).contains(&c));
            prop_assert!(is_tenths(c));
        }
    }
}
