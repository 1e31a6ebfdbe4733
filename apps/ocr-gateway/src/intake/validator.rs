//! Upload validation
//!
//! Checks run cheapest first: declared type, size ceilings, then a full
//! decode of the declared image family. GIFs are additionally inspected
//! frame by frame and rejected when animated.

use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;

use super::types::{MediaType, UploadedImage};
use crate::error::{ExtractionError, SizeLimit};

/// Default global upload ceiling: 10 MiB
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Default number of GIF frames inspected before giving up counting
pub const DEFAULT_MAX_GIF_FRAMES: usize = 50;

/// Size and frame ceilings applied by the validator
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    /// Maximum upload size in bytes
    pub max_file_size: usize,
    /// Maximum GIF size in bytes (never looser than `max_file_size`)
    pub max_gif_size: usize,
    /// Maximum GIF frames inspected
    pub max_gif_frames: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_gif_size: DEFAULT_MAX_FILE_SIZE,
            max_gif_frames: DEFAULT_MAX_GIF_FRAMES,
        }
    }
}

/// Stateless upload validator
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: ValidationLimits,
}

impl Validator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Validate an upload, returning its media type on success
    pub fn validate(&self, upload: &UploadedImage) -> Result<MediaType, ExtractionError> {
        let declared = upload.content_type().unwrap_or("");
        let media_type = MediaType::from_content_type(declared).ok_or_else(|| {
            let shown = if declared.is_empty() { "none" } else { declared };
            ExtractionError::UnsupportedType(shown.to_string())
        })?;

        let size = upload.len();
        if size > self.limits.max_file_size {
            return Err(ExtractionError::TooLarge {
                size,
                max: self.limits.max_file_size,
                limit: SizeLimit::Upload,
            });
        }

        if media_type == MediaType::Gif {
            let max_gif = self.limits.max_gif_size.min(self.limits.max_file_size);
            if size > max_gif {
                return Err(ExtractionError::TooLarge {
                    size,
                    max: max_gif,
                    limit: SizeLimit::Gif,
                });
            }
        }

        self.check_structure(upload.bytes(), media_type)?;

        Ok(media_type)
    }

    /// Decode the whole image to prove it is structurally sound
    fn check_structure(&self, bytes: &[u8], media_type: MediaType) -> Result<(), ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::corrupt("empty upload"));
        }

        match media_type {
            MediaType::Gif => {
                let scan_limit = self.limits.max_gif_frames.max(1);
                let frames = count_gif_frames(bytes, scan_limit)?;
                if frames > 1 {
                    return Err(ExtractionError::AnimationRejected { frames, scan_limit });
                }
                Ok(())
            }
            _ => image::load_from_memory_with_format(bytes, media_type.image_format())
                .map(|_| ())
                .map_err(ExtractionError::corrupt),
        }
    }
}

/// Count decodable GIF frames, stopping once `scan_limit` is exceeded
fn count_gif_frames(bytes: &[u8], scan_limit: usize) -> Result<usize, ExtractionError> {
    let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(ExtractionError::corrupt)?;

    let mut frames = 0;
    for frame in decoder.into_frames().take(scan_limit + 1) {
        frame.map_err(ExtractionError::corrupt)?;
        frames += 1;
    }

    if frames == 0 {
        return Err(ExtractionError::corrupt("GIF contains no frames"));
    }

    Ok(frames)
}
