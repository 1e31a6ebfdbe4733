//! Extraction routes
//!
//! Endpoints:
//! - POST /extract-text - Recognize text in one image (field `image`)
//! - POST /batch-extract - Recognize text in several images (fields `images`)

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::SecondsFormat;

use crate::cache::CacheStatus;
use crate::error::{AppError, Result};
use crate::intake::UploadedImage;
use crate::rate_limit::rate_limit_by_ip;
use crate::state::AppState;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_CACHE_TIMESTAMP: HeaderName = HeaderName::from_static("x-cache-timestamp");
pub const X_CACHE_TIMESTAMPS: HeaderName = HeaderName::from_static("x-cache-timestamps");

/// Multipart field carrying the single upload
const SINGLE_FIELD: &str = "image";

/// Multipart fields accepted for batch uploads
const BATCH_FIELDS: &[&str] = &["images", "image"];

/// Create the extraction router
pub fn router(state: &AppState) -> Router<AppState> {
    let limits = state.rate_limits();

    Router::new()
        .route(
            "/extract-text",
            post(extract_text).layer(from_fn_with_state(limits.single.clone(), rate_limit_by_ip)),
        )
        .route(
            "/batch-extract",
            post(batch_extract).layer(from_fn_with_state(limits.batch.clone(), rate_limit_by_ip)),
        )
}

/// Recognize text in a single image
async fn extract_text(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let upload = read_uploads(multipart, &[SINGLE_FIELD])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            AppError::BadRequest("No file provided. Use field name 'image'.".to_string())
        })?;

    tracing::debug!(
        filename = upload.display_name(),
        content_type = ?upload.content_type(),
        bytes = upload.len(),
        "Received image"
    );

    let outcome = state.pipeline().process(&upload).await;
    if let Some(error) = outcome.failure {
        return Err(error.into());
    }

    let mut headers = HeaderMap::new();
    headers.insert(X_CACHE, HeaderValue::from_static(outcome.cache.header_value()));
    if let Some(cached_at) = outcome.cache.cached_at() {
        if let Ok(value) =
            HeaderValue::from_str(&cached_at.to_rfc3339_opts(SecondsFormat::Millis, true))
        {
            headers.insert(X_CACHE_TIMESTAMP, value);
        }
    }

    Ok((headers, Json(outcome.result)).into_response())
}

/// Recognize text in several images, reporting every item
async fn batch_extract(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let uploads = read_uploads(multipart, BATCH_FIELDS).await?;
    let max = state.config().limits.max_batch_files;

    if uploads.is_empty() {
        return Err(AppError::BadRequest(
            "No files provided. Use field name 'images'.".to_string(),
        ));
    }
    if uploads.len() > max {
        return Err(AppError::TooManyFiles {
            count: uploads.len(),
            max,
        });
    }

    tracing::debug!(count = uploads.len(), "Received batch");

    let batch = state.batch().run(&uploads).await;

    let statuses: Vec<CacheStatus> = batch.cache_statuses().collect();
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cache_header(&statuses)) {
        headers.insert(X_CACHE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&timestamps_header(&statuses)) {
        headers.insert(X_CACHE_TIMESTAMPS, value);
    }

    let status = if batch.success {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };

    Ok((status, headers, Json(batch)).into_response())
}

/// Collect file fields named in `fields`, in submission order
async fn read_uploads(mut multipart: Multipart, fields: &[&str]) -> Result<Vec<UploadedImage>> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        if !fields.contains(&name.as_str()) {
            tracing::debug!(name, "Ignoring multipart field");
            continue;
        }

        let filename = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let data = field.bytes().await.map_err(multipart_error)?;

        uploads.push(UploadedImage::new(data, content_type, filename));
    }

    Ok(uploads)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("Request body too large: {}", e.body_text()))
    } else {
        tracing::error!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read upload: {}", e.body_text()))
    }
}

/// `X-Cache` value for a batch: one HIT or MISS per item
fn cache_header(statuses: &[CacheStatus]) -> String {
    statuses
        .iter()
        .map(|s| s.header_value())
        .collect::<Vec<_>>()
        .join(",")
}

/// `X-Cache-Timestamps` value for a batch: insertion time per hit, `-` per miss
fn timestamps_header(statuses: &[CacheStatus]) -> String {
    statuses
        .iter()
        .map(|s| match s.cached_at() {
            Some(at) => at.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => "-".to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}
