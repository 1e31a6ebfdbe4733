//! OCR Module
//!
//! Recognition backends behind the [`Recognizer`] trait and the adapter that
//! bounds and times their calls.
//!
//! Supports two backends:
//! - Tesseract (local CLI)
//! - Google Cloud Vision (REST)

mod adapter;
mod provider;
mod tesseract;
mod types;
mod vision;

pub use adapter::{RecognitionAdapter, DEFAULT_TIMEOUT, DEFAULT_WORKERS};
pub use provider::Recognizer;
pub use tesseract::{parse_tsv, TesseractRecognizer};
pub use types::{Block, OcrError, Page, Paragraph, RawRecognition, Word};
pub use vision::{GoogleVisionRecognizer, DEFAULT_VISION_ENDPOINT};

#[cfg(test)]
pub use provider::StaticRecognizer;
