//! Image normalization
//!
//! Turns any validated upload into the canonical form submitted for
//! recognition: first frame only, three-channel RGB, a fixed contrast boost,
//! re-encoded as baseline JPEG at a fixed quality.
//!
//! The transform is deterministic for identical bytes and configuration.

use axum::body::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::ExtractionError;
use crate::intake::MediaType;

/// Default contrast multiplier
pub const DEFAULT_CONTRAST_FACTOR: f32 = 1.2;

/// Default JPEG re-encode quality
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Normalizer configuration
#[derive(Debug, Clone, Copy)]
pub struct NormalizeConfig {
    /// Contrast multiplier (1.0 leaves the image unchanged)
    pub contrast_factor: f32,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            contrast_factor: DEFAULT_CONTRAST_FACTOR,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Canonical image ready for recognition
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage {
    /// JPEG bytes submitted to the recognizer
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    /// Format detected in the original upload
    pub original_format: MediaType,
    /// Media type the client declared
    pub media_type: MediaType,
}

/// Decodes, enhances and re-encodes uploads
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizeConfig {
        &self.config
    }

    /// Produce the canonical image for validated upload bytes
    pub fn normalize(
        &self,
        bytes: &[u8],
        declared: MediaType,
    ) -> Result<NormalizedImage, ExtractionError> {
        let original_format = image::guess_format(bytes)
            .ok()
            .and_then(MediaType::from_image_format)
            .unwrap_or(declared);

        // Re-decode after validation; multi-frame containers yield frame 0
        let decoded = image::load_from_memory_with_format(bytes, original_format.image_format())
            .map_err(ExtractionError::corrupt)?;

        let mut rgb = decoded.to_rgb8();
        enhance_contrast(&mut rgb, self.config.contrast_factor);

        let (width, height) = rgb.dimensions();
        let quality = self.config.jpeg_quality.clamp(1, 100);

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality)
            .encode_image(&rgb)
            .map_err(ExtractionError::corrupt)?;

        tracing::debug!(
            original_format = original_format.label(),
            width,
            height,
            input_bytes = bytes.len(),
            output_bytes = buffer.len(),
            "Normalized image"
        );

        Ok(NormalizedImage {
            bytes: Bytes::from(buffer),
            width,
            height,
            original_format,
            media_type: declared,
        })
    }
}

/// Scale every channel away from the mean luminance by `factor`.
///
/// Mean luminance uses ITU-R 601-2 weights in 16-bit fixed point, the same
/// grey conversion used by common imaging libraries, so results line up with
/// their contrast enhancers.
pub fn enhance_contrast(image: &mut RgbImage, factor: f32) {
    if image.width() == 0 || image.height() == 0 || factor == 1.0 {
        return;
    }

    let mut total: u64 = 0;
    for pixel in image.pixels() {
        let [r, g, b] = pixel.0;
        let luma = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        total += luma as u64;
    }
    let count = image.width() as u64 * image.height() as u64;
    let mean = ((total as f64 / count as f64) + 0.5).floor() as f32;

    let mut lut = [0u8; 256];
    for (value, slot) in lut.iter_mut().enumerate() {
        let adjusted = mean + factor * (value as f32 - mean);
        *slot = adjusted.round().clamp(0.0, 255.0) as u8;
    }

    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = lut[*channel as usize];
        }
    }
}
