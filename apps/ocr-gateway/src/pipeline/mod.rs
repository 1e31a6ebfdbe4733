//! Extraction pipeline
//!
//! Runs one upload through validation, the fingerprint cache, normalization,
//! recognition, confidence aggregation and text cleanup:
//!
//! ```text
//! Received → Validating → CacheCheck ─hit─────────────────────────────→ Done
//!                            │miss
//!                            └→ Normalizing → Recognizing → Aggregating → CacheStoring → Done
//! ```
//!
//! Any stage may exit to `Done` with a failure. Failures are folded into an
//! [`OcrResult`] here; only the single-item HTTP route turns them back into
//! an error response.

mod batch;
mod types;

use std::time::{Duration, Instant};

use crate::cache::{CacheStatus, ContentFingerprint, FingerprintCache};
use crate::confidence;
use crate::error::ExtractionError;
use crate::intake::{MediaType, UploadedImage, Validator};
use crate::normalize::{NormalizedImage, Normalizer};
use crate::ocr::RecognitionAdapter;
use crate::text::clean_text;

pub use batch::{BatchItem, BatchOrchestrator, BatchResult, BatchStatus};
pub use types::{ImageMetadata, OcrResult, NO_TEXT_MESSAGE};

/// Pipeline stage, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    CacheCheck,
    Normalizing,
    Recognizing,
    Aggregating,
    CacheStoring,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validating",
            Stage::CacheCheck => "cache_check",
            Stage::Normalizing => "normalizing",
            Stage::Recognizing => "recognizing",
            Stage::Aggregating => "aggregating",
            Stage::CacheStoring => "cache_storing",
        }
    }

    /// Error for a blocking-pool task of this stage that panicked or was cancelled
    fn task_failed(self, e: tokio::task::JoinError) -> ExtractionError {
        tracing::error!(stage = self.as_str(), error = %e, "Pipeline task failed");
        ExtractionError::StageFailed {
            stage: self.as_str(),
            reason: e.to_string(),
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub result: OcrResult,
    pub cache: CacheStatus,
    /// The error that stopped the run, if any
    pub failure: Option<ExtractionError>,
}

impl ItemOutcome {
    fn failed(error: ExtractionError, elapsed: Duration) -> Self {
        Self {
            result: OcrResult::failed(&error, None, elapsed),
            cache: CacheStatus::Miss,
            failure: Some(error),
        }
    }
}

/// Single-item extraction pipeline
pub struct OcrPipeline {
    validator: Validator,
    normalizer: Normalizer,
    cache: FingerprintCache,
    adapter: RecognitionAdapter,
}

impl OcrPipeline {
    pub fn new(
        validator: Validator,
        normalizer: Normalizer,
        cache: FingerprintCache,
        adapter: RecognitionAdapter,
    ) -> Self {
        Self {
            validator,
            normalizer,
            cache,
            adapter,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    pub fn adapter(&self) -> &RecognitionAdapter {
        &self.adapter
    }

    /// Run one upload through the pipeline. Never fails; errors are
    /// reported in the outcome.
    pub async fn process(&self, upload: &UploadedImage) -> ItemOutcome {
        let filename = upload.display_name();

        let (media_type, fingerprint) = match self.validate(upload).await {
            Ok(checked) => checked,
            Err(e) => {
                tracing::debug!(
                    filename,
                    stage = Stage::Validating.as_str(),
                    error = %e,
                    "Upload rejected"
                );
                return ItemOutcome::failed(e, Duration::ZERO);
            }
        };

        if let Some(cached) = self.cache.lookup(&fingerprint) {
            tracing::debug!(
                filename,
                fingerprint = %fingerprint,
                stage = Stage::CacheCheck.as_str(),
                "Serving cached result"
            );
            return ItemOutcome {
                result: cached.result,
                cache: CacheStatus::Hit {
                    cached_at: cached.cached_at,
                },
                failure: None,
            };
        }

        let start = Instant::now();
        match self.extract(upload, media_type, start).await {
            Ok(result) => {
                if self.cache.admits(&result) {
                    self.cache.store(fingerprint, result.clone());
                    tracing::debug!(
                        filename,
                        fingerprint = %fingerprint,
                        stage = Stage::CacheStoring.as_str(),
                        "Cached result"
                    );
                }

                tracing::info!(
                    filename,
                    fingerprint = %fingerprint,
                    success = result.success,
                    chars = result.text.len(),
                    elapsed_ms = result.processing_time_ms,
                    "Extraction complete"
                );

                ItemOutcome {
                    result,
                    cache: CacheStatus::Miss,
                    failure: None,
                }
            }
            Err((stage, e)) => {
                tracing::warn!(
                    filename,
                    fingerprint = %fingerprint,
                    stage = stage.as_str(),
                    error = %e,
                    "Extraction failed"
                );
                ItemOutcome::failed(e, start.elapsed())
            }
        }
    }

    /// Validate and fingerprint the upload on the blocking pool
    async fn validate(
        &self,
        upload: &UploadedImage,
    ) -> Result<(MediaType, ContentFingerprint), ExtractionError> {
        let validator = self.validator.clone();
        let upload = upload.clone();

        tokio::task::spawn_blocking(move || {
            let media_type = validator.validate(&upload)?;
            Ok::<_, ExtractionError>((media_type, ContentFingerprint::of(upload.bytes())))
        })
        .await
        .map_err(|e| Stage::Validating.task_failed(e))?
    }

    async fn normalize(
        &self,
        upload: &UploadedImage,
        media_type: MediaType,
    ) -> Result<NormalizedImage, ExtractionError> {
        let normalizer = self.normalizer.clone();
        let bytes = upload.bytes().clone();

        tokio::task::spawn_blocking(move || normalizer.normalize(&bytes, media_type))
            .await
            .map_err(|e| Stage::Normalizing.task_failed(e))?
    }

    async fn extract(
        &self,
        upload: &UploadedImage,
        media_type: MediaType,
        start: Instant,
    ) -> Result<OcrResult, (Stage, ExtractionError)> {
        let normalized = self
            .normalize(upload, media_type)
            .await
            .map_err(|e| (Stage::Normalizing, e))?;
        let metadata = ImageMetadata::from(&normalized);

        let raw = self
            .adapter
            .recognize(normalized.bytes)
            .await
            .map_err(|e| (Stage::Recognizing, e))?;

        let confidence = confidence::aggregate(&raw.pages).unwrap_or(0.0);
        let text = clean_text(&raw.text);
        tracing::trace!(
            stage = Stage::Aggregating.as_str(),
            confidence,
            words = raw.pages.iter().map(|p| p.words().count()).sum::<usize>(),
            "Aggregated recognition"
        );

        Ok(OcrResult::recognized(text, confidence, metadata, start.elapsed()))
    }
}

#[cfg(test)]
impl OcrPipeline {
    /// Pipeline with default limits around the given recognizer
    pub fn with_recognizer(
        recognizer: std::sync::Arc<dyn crate::ocr::Recognizer>,
        cache: crate::cache::CacheConfig,
    ) -> Self {
        Self::new(
            Validator::default(),
            Normalizer::default(),
            FingerprintCache::new(cache),
            RecognitionAdapter::new(recognizer, 2, crate::ocr::DEFAULT_TIMEOUT),
        )
    }
}
