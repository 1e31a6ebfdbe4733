//! In-memory test images

use std::io::Cursor;

use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

/// Gradient with a dark bar so contrast changes are observable
fn pattern(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if y > height / 3 && y < height / 2 && x > width / 8 && x < width - width / 8 {
            Rgb([20, 20, 20])
        } else {
            let shade = (96 + (x * 64 / width.max(1)) + (y * 64 / height.max(1))) as u8;
            Rgb([shade, shade, shade.saturating_add(10)])
        }
    })
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 85)
        .encode_image(&pattern(width, height))
        .unwrap();
    buffer
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Vec::new();
    DynamicImage::ImageRgb8(pattern(width, height))
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// GIF with `frames` distinct frames (1 = still image)
pub fn gif(width: u32, height: u32, frames: usize) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buffer);
        let frames = (0..frames).map(|i| {
            let shade = (i * 20 % 255) as u8;
            Frame::new(RgbaImage::from_pixel(width, height, Rgba([shade, 80, 160, 255])))
        });
        encoder.encode_frames(frames).unwrap();
    }
    buffer
}
