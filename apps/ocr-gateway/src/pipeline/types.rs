//! Pipeline result types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::normalize::NormalizedImage;

/// Message reported when recognition completed but found nothing
pub const NO_TEXT_MESSAGE: &str = "No text detected in image.";

/// Image metadata reported alongside recognized text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Format of the original upload (JPEG, PNG, GIF)
    pub format: String,
    /// Media type declared by the client
    pub media_type: String,
}

impl From<&NormalizedImage> for ImageMetadata {
    fn from(image: &NormalizedImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            format: image.original_format.label().to_string(),
            media_type: image.media_type.mime().to_string(),
        }
    }
}

/// Outcome of one pipeline run.
///
/// Every field is always serialized; `confidence`, `metadata` and `error`
/// are `null` when not applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub success: bool,
    pub text: String,
    pub confidence: Option<f64>,
    pub metadata: Option<ImageMetadata>,
    pub processing_time_ms: u64,
    pub error: Option<String>,
}

impl OcrResult {
    /// Result of a completed recognition. Empty text becomes the
    /// non-exceptional "no text detected" outcome.
    pub fn recognized(
        text: String,
        confidence: f64,
        metadata: ImageMetadata,
        elapsed: Duration,
    ) -> Self {
        let success = !text.is_empty();
        Self {
            success,
            text,
            confidence: Some(confidence),
            metadata: Some(metadata),
            processing_time_ms: elapsed.as_millis() as u64,
            error: (!success).then(|| NO_TEXT_MESSAGE.to_string()),
        }
    }

    /// Result of a run that stopped with an error
    pub fn failed(
        error: &ExtractionError,
        metadata: Option<ImageMetadata>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: false,
            text: String::new(),
            confidence: None,
            metadata,
            processing_time_ms: elapsed.as_millis() as u64,
            error: Some(error.to_string()),
        }
    }

    /// Recognition ran to completion but found no text
    pub fn is_empty_recognition(&self) -> bool {
        !self.success && self.metadata.is_some() && self.confidence.is_some()
    }
}
