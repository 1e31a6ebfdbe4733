//! Google Cloud Vision backend
//!
//! Calls the `images:annotate` REST endpoint with `DOCUMENT_TEXT_DETECTION`.
//! The first text annotation is the primary text; the full-text annotation
//! supplies per-word confidences.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::provider::Recognizer;
use super::types::{Block, OcrError, Page, Paragraph, RawRecognition, Word};

/// Public Vision API endpoint
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Vision REST recognizer
pub struct GoogleVisionRecognizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleVisionRecognizer {
    pub fn new(api_key: &str, endpoint: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.unwrap_or(DEFAULT_VISION_ENDPOINT).to_string(),
            api_key: api_key.to_string(),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: [Feature<'a>; 1],
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize, Default)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    full_text_annotation: Option<FullTextAnnotation>,
    error: Option<Status>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<VisionPage>,
}

#[derive(Deserialize)]
struct VisionPage {
    #[serde(default)]
    blocks: Vec<VisionBlock>,
}

#[derive(Deserialize)]
struct VisionBlock {
    #[serde(default)]
    paragraphs: Vec<VisionParagraph>,
}

#[derive(Deserialize)]
struct VisionParagraph {
    #[serde(default)]
    words: Vec<VisionWord>,
}

#[derive(Deserialize)]
struct VisionWord {
    #[serde(default)]
    symbols: Vec<Symbol>,
    #[serde(default)]
    confidence: f64,
}

#[derive(Deserialize)]
struct Symbol {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

// ============================================================================
// Conversion
// ============================================================================

fn into_pages(annotation: FullTextAnnotation) -> Vec<Page> {
    annotation
        .pages
        .into_iter()
        .map(|page| Page {
            blocks: page
                .blocks
                .into_iter()
                .map(|block| Block {
                    paragraphs: block
                        .paragraphs
                        .into_iter()
                        .map(|paragraph| Paragraph {
                            words: paragraph
                                .words
                                .into_iter()
                                .map(|word| Word {
                                    text: word.symbols.into_iter().map(|s| s.text).collect(),
                                    confidence: word.confidence,
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect()
}

fn into_recognition(response: ImageResponse) -> Result<RawRecognition, OcrError> {
    if let Some(status) = response.error {
        if !status.message.is_empty() {
            return Err(OcrError::Engine(status.message));
        }
    }

    let primary = response
        .text_annotations
        .into_iter()
        .next()
        .map(|annotation| annotation.description);

    match response.full_text_annotation {
        Some(full) => {
            let text = primary.unwrap_or_else(|| full.text.clone());
            Ok(RawRecognition {
                text,
                pages: into_pages(full),
            })
        }
        None => Ok(RawRecognition::text_only(primary.unwrap_or_default())),
    }
}

#[async_trait]
impl Recognizer for GoogleVisionRecognizer {
    fn name(&self) -> &'static str {
        "google-vision"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn recognize(&self, image: &[u8]) -> Result<RawRecognition, OcrError> {
        if self.api_key.is_empty() {
            return Err(OcrError::Unavailable(
                "GOOGLE_VISION_API_KEY is not set".to_string(),
            ));
        }

        let request = AnnotateRequest {
            requests: [ImageRequest {
                image: ImageContent {
                    content: base64::engine::general_purpose::STANDARD.encode(image),
                },
                features: [Feature {
                    kind: "DOCUMENT_TEXT_DETECTION",
                }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| OcrError::Transport(format!("Failed to call Vision API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Engine(format!(
                "Vision API returned {}: {}",
                status, body
            )));
        }

        let body: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let first = body
            .responses
            .into_iter()
            .next()
            .ok_or_else(|| OcrError::InvalidResponse("Empty responses array".to_string()))?;

        into_recognition(first)
    }
}
