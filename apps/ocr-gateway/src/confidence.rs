//! Confidence aggregation

use crate::ocr::Page;

/// Mean of every word confidence across all pages, rounded to three places.
///
/// Returns `None` when no words were recognized.
pub fn aggregate(pages: &[Page]) -> Option<f64> {
    let (sum, count) = pages
        .iter()
        .flat_map(|page| page.words())
        .fold((0.0_f64, 0_usize), |(sum, count), word| {
            (sum + word.confidence, count + 1)
        });

    if count == 0 {
        return None;
    }

    let mean = sum / count as f64;
    Some((mean * 1000.0).round() / 1000.0)
}
