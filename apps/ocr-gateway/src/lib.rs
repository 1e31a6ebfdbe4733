//! OCR Gateway Library
//!
//! Image intake, normalization and cached text recognition. The HTTP server
//! binary is in main.rs.
//!
//! # Modules
//!
//! - `intake`: Upload types and validation
//! - `normalize`: Canonical JPEG re-encoding with contrast boost
//! - `cache`: Content fingerprints and the time-aware result cache
//! - `ocr`: Recognizer backends and the bounded recognition adapter
//! - `pipeline`: Single-item pipeline and batch orchestration
//! - `routes`: HTTP handlers

pub mod cache;
pub mod confidence;
pub mod config;
pub mod error;
pub mod intake;
pub mod normalize;
pub mod ocr;
pub mod pipeline;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod text;

#[cfg(test)]
mod fixtures;
