//! Recognition adapter
//!
//! Wraps the configured [`Recognizer`] with a bounded worker pool and a
//! per-call deadline. Every engine call runs as its own task holding one
//! semaphore permit, so at most `workers` calls are in flight regardless of
//! how many requests are waiting.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use tokio::sync::Semaphore;

use super::provider::Recognizer;
use super::types::RawRecognition;
use crate::error::ExtractionError;

/// Default number of concurrent engine calls
pub const DEFAULT_WORKERS: usize = 4;

/// Default per-call deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Bounded, deadline-aware front for a recognizer
#[derive(Clone)]
pub struct RecognitionAdapter {
    recognizer: Arc<dyn Recognizer>,
    permits: Arc<Semaphore>,
    workers: usize,
    timeout: Duration,
}

impl RecognitionAdapter {
    pub fn new(recognizer: Arc<dyn Recognizer>, workers: usize, timeout: Duration) -> Self {
        let workers = workers.max(1);
        Self {
            recognizer,
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            timeout,
        }
    }

    pub fn name(&self) -> &'static str {
        self.recognizer.name()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn is_available(&self) -> bool {
        self.recognizer.is_available().await
    }

    /// Run recognition on normalized image bytes.
    ///
    /// The deadline starts once a worker permit is held. Engine errors and
    /// task failures surface as `RecognitionFailed`, an elapsed deadline as
    /// `RecognitionTimeout`.
    pub async fn recognize(&self, image: Bytes) -> Result<RawRecognition, ExtractionError> {
        let permit = self.permits.clone().acquire_owned().await.map_err(|_| {
            ExtractionError::RecognitionFailed("Recognition pool is closed".to_string())
        })?;

        let recognizer = self.recognizer.clone();
        let mut handle = tokio::spawn(async move {
            let _permit = permit;
            recognizer.recognize(&image).await
        });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(raw))) => Ok(raw),
            Ok(Ok(Err(e))) => {
                tracing::warn!(recognizer = self.name(), error = %e, "Recognition failed");
                Err(ExtractionError::RecognitionFailed(e.to_string()))
            }
            Ok(Err(e)) => {
                tracing::error!(recognizer = self.name(), error = %e, "Recognition task failed");
                Err(ExtractionError::RecognitionFailed(format!(
                    "Recognition task failed: {}",
                    e
                )))
            }
            Err(_) => {
                handle.abort();
                tracing::warn!(
                    recognizer = self.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Recognition timed out"
                );
                Err(ExtractionError::RecognitionTimeout(self.timeout.as_secs()))
            }
        }
    }
}
