//! Error types for the OCR gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Which size ceiling an upload exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimit {
    /// Global upload ceiling
    Upload,
    /// Stricter ceiling for GIF uploads
    Gif,
}

impl std::fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeLimit::Upload => f.write_str("upload"),
            SizeLimit::Gif => f.write_str("GIF"),
        }
    }
}

/// Per-item failure taxonomy of the extraction pipeline
#[derive(Error, Debug, Clone)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}. Allowed types are image/jpeg, image/png and image/gif.")]
    UnsupportedType(String),

    #[error("File too large: {size} bytes exceeds the {limit} limit of {max} bytes.")]
    TooLarge {
        size: usize,
        max: usize,
        limit: SizeLimit,
    },

    #[error("Uploaded file is not a valid image.")]
    CorruptImage { reason: String },

    #[error("Animated GIFs are not supported ({}).", describe_frames(.frames, .scan_limit))]
    AnimationRejected { frames: usize, scan_limit: usize },

    #[error("Text recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("Text recognition timed out after {0} seconds")]
    RecognitionTimeout(u64),

    /// A local processing stage crashed before recognition
    #[error("Image processing failed during {stage}: {reason}")]
    StageFailed { stage: &'static str, reason: String },
}

fn describe_frames(frames: &usize, scan_limit: &usize) -> String {
    if frames > scan_limit {
        format!("more than {} frames detected", scan_limit)
    } else {
        format!("{} frames detected", frames)
    }
}

impl ExtractionError {
    pub fn corrupt(reason: impl std::fmt::Display) -> Self {
        Self::CorruptImage {
            reason: reason.to_string(),
        }
    }

    /// HTTP status code for single-item requests
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::CorruptImage { .. } => StatusCode::BAD_REQUEST,
            Self::AnimationRejected { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::RecognitionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RecognitionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::StageFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) => "unsupported_type",
            Self::TooLarge { .. } => "too_large",
            Self::CorruptImage { .. } => "corrupt_image",
            Self::AnimationRejected { .. } => "animation_rejected",
            Self::RecognitionFailed(_) => "recognition_failed",
            Self::RecognitionTimeout(_) => "recognition_timeout",
            Self::StageFailed { .. } => "processing_failed",
        }
    }

    /// Whether the client is at fault
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Too many files: {count} submitted, at most {max} allowed per batch.")]
    TooManyFiles { count: usize, max: usize },

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, detail) = match &self {
            AppError::Extraction(e) => {
                if e.is_client_error() {
                    tracing::debug!("Rejected upload: {}", e);
                } else {
                    tracing::error!("Extraction error: {}", e);
                }
                (e.status_code(), e.code(), e.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::TooManyFiles { .. } => {
                (StatusCode::BAD_REQUEST, "too_many_files", self.to_string())
            }
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "too_large", msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error, detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_message_is_fixed() {
        let err = ExtractionError::corrupt("unexpected EOF");
        assert_eq!(err.to_string(), "Uploaded file is not a valid image.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_size_messages_name_the_limit() {
        let gif = ExtractionError::TooLarge {
            size: 3_000_000,
            max: 2_000_000,
            limit: SizeLimit::Gif,
        };
        assert!(gif.to_string().contains("GIF limit"));
        assert_eq!(gif.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_animation_message() {
        let counted = ExtractionError::AnimationRejected {
            frames: 10,
            scan_limit: 50,
        };
        assert_eq!(
            counted.to_string(),
            "Animated GIFs are not supported (10 frames detected)."
        );

        let capped = ExtractionError::AnimationRejected {
            frames: 51,
            scan_limit: 50,
        };
        assert!(capped.to_string().contains("more than 50 frames"));
    }

    #[test]
    fn test_recognition_errors_are_server_side() {
        assert!(!ExtractionError::RecognitionFailed("quota".into()).is_client_error());
        assert_eq!(
            ExtractionError::RecognitionTimeout(60).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert!(ExtractionError::UnsupportedType("text/plain".into()).is_client_error());
    }

    #[test]
    fn test_stage_failure_names_the_stage() {
        let err = ExtractionError::StageFailed {
            stage: "normalizing",
            reason: "task panicked".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "processing_failed");
        assert!(err.to_string().contains("during normalizing"));
        assert!(!err.to_string().contains("recognition"));
    }
}
