//! Pipeline Benchmarks
//!
//! Measures the CPU-bound stages that run on every cache miss: image
//! normalization, fingerprinting and text cleanup.
//!
//! Run with: `cargo bench --bench pipeline`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::time::Duration;

use ocr_gateway::cache::ContentFingerprint;
use ocr_gateway::intake::MediaType;
use ocr_gateway::normalize::Normalizer;
use ocr_gateway::text::clean_text;

/// Synthetic scanned page: light background with dark text-like bars
fn create_page_jpeg(width: u32, height: u32) -> Vec<u8> {
    let page = RgbImage::from_fn(width, height, |x, y| {
        let in_line = (y / 12) % 3 == 0 && x % 40 < 32;
        if in_line {
            Rgb([30, 30, 30])
        } else {
            Rgb([235, 232, 225])
        }
    });

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 85)
        .encode_image(&page)
        .expect("Failed to encode benchmark page");
    buffer
}

fn create_noisy_text(lines: usize) -> String {
    let mut text = String::new();
    for i in 0..lines {
        text.push_str(&format!("  Line {}\t\t with   extra   spacing \x0c \r\n", i));
        if i % 5 == 0 {
            text.push_str("\n\n\n\n");
        }
    }
    text
}

fn bench_normalize(c: &mut Criterion) {
    let normalizer = Normalizer::default();

    let mut group = c.benchmark_group("normalize");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(30);

    for (width, height) in [(800, 600), (1700, 2200)] {
        let input = create_page_jpeg(width, height);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &input,
            |b, input| {
                b.iter(|| {
                    normalizer
                        .normalize(black_box(input), MediaType::Jpeg)
                        .expect("normalize failed")
                })
            },
        );
    }

    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let input = create_page_jpeg(1700, 2200);

    c.bench_function("fingerprint_page", |b| {
        b.iter(|| ContentFingerprint::of(black_box(&input)))
    });
}

fn bench_clean_text(c: &mut Criterion) {
    let text = create_noisy_text(500);

    c.bench_function("clean_text_500_lines", |b| {
        b.iter(|| clean_text(black_box(&text)))
    });
}

criterion_group!(benches, bench_normalize, bench_fingerprint, bench_clean_text);
criterion_main!(benches);
