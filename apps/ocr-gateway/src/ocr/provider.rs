//! Recognizer trait
//!
//! Every OCR backend implements [`Recognizer`]. Implementations receive the
//! normalized JPEG bytes and return the raw engine view; cleanup, confidence
//! aggregation, timeouts and concurrency limits live above this seam.

use async_trait::async_trait;

use super::types::{OcrError, RawRecognition};

/// OCR backend
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;

    /// Check if the backend can serve requests
    async fn is_available(&self) -> bool;

    /// Perform recognition on a normalized image
    async fn recognize(&self, image: &[u8]) -> Result<RawRecognition, OcrError>;
}

/// Deterministic recognizer for tests
#[cfg(test)]
pub struct StaticRecognizer {
    outcome: Result<RawRecognition, OcrError>,
    delay: Option<std::time::Duration>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StaticRecognizer {
    pub fn returning(raw: RawRecognition) -> Self {
        Self {
            outcome: Ok(raw),
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(error: OcrError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of recognize calls received
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[async_trait]
impl Recognizer for StaticRecognizer {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn recognize(&self, _image: &[u8]) -> Result<RawRecognition, OcrError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
