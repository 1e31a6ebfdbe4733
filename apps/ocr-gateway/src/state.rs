//! Application state management

use std::sync::Arc;

use crate::cache::FingerprintCache;
use crate::config::Config;
use crate::intake::Validator;
use crate::normalize::Normalizer;
use crate::ocr::{RecognitionAdapter, Recognizer};
use crate::pipeline::{BatchOrchestrator, OcrPipeline};
use crate::rate_limit::RateLimits;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    pipeline: Arc<OcrPipeline>,
    batch: BatchOrchestrator,
    rate_limits: RateLimits,
}

impl AppState {
    /// Create the application state around a recognizer backend.
    ///
    /// The fingerprint cache is created here and lives as long as the state.
    pub fn new(config: Config, recognizer: Arc<dyn Recognizer>) -> Self {
        let adapter = RecognitionAdapter::new(recognizer, config.ocr.workers, config.ocr_timeout());
        let pipeline = Arc::new(OcrPipeline::new(
            Validator::new(config.validation_limits()),
            Normalizer::new(config.normalize_config()),
            FingerprintCache::new(config.cache_config()),
            adapter,
        ));
        let batch = BatchOrchestrator::new(pipeline.clone(), config.limits.batch_concurrency);
        let rate_limits = RateLimits::new(
            config.rate_limit.global,
            config.rate_limit.single,
            config.rate_limit.batch,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                batch,
                rate_limits,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the single-item pipeline
    pub fn pipeline(&self) -> &OcrPipeline {
        &self.inner.pipeline
    }

    pub fn batch(&self) -> &BatchOrchestrator {
        &self.inner.batch
    }

    pub fn cache(&self) -> &FingerprintCache {
        self.inner.pipeline.cache()
    }

    pub fn rate_limits(&self) -> &RateLimits {
        &self.inner.rate_limits
    }
}
