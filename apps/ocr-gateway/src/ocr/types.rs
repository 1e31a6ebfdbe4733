//! Recognition types
//!
//! Engine-neutral view of what a recognizer returns: the primary text plus a
//! page → block → paragraph → word hierarchy carrying per-word confidence.

use serde::{Deserialize, Serialize};

/// A recognized word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    /// Engine confidence in [0, 1]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub blocks: Vec<Block>,
}

impl Page {
    /// Iterate every word on the page in reading order
    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.blocks
            .iter()
            .flat_map(|block| block.paragraphs.iter())
            .flat_map(|paragraph| paragraph.words.iter())
    }
}

/// Raw engine output before cleanup and aggregation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecognition {
    /// Primary text, uncleaned
    pub text: String,
    pub pages: Vec<Page>,
}

impl RawRecognition {
    /// Output carrying text but no structural detail
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pages: Vec::new(),
        }
    }

    /// Single page with one paragraph per line of `(word, confidence)` pairs
    pub fn from_lines(lines: &[&[(&str, f64)]]) -> Self {
        let paragraphs: Vec<Paragraph> = lines
            .iter()
            .map(|line| Paragraph {
                words: line
                    .iter()
                    .map(|(text, confidence)| Word {
                        text: text.to_string(),
                        confidence: *confidence,
                    })
                    .collect(),
            })
            .collect();

        let text = lines
            .iter()
            .map(|line| {
                line.iter()
                    .map(|(text, _)| *text)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            text,
            pages: vec![Page {
                blocks: vec![Block { paragraphs }],
            }],
        }
    }
}

/// Recognizer errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    Unavailable(String),

    #[error("OCR engine error: {0}")]
    Engine(String),

    #[error("OCR transport error: {0}")]
    Transport(String),

    #[error("Invalid OCR response: {0}")]
    InvalidResponse(String),
}
