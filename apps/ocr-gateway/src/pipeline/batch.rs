//! Batch orchestration
//!
//! Every upload runs the full single-item pipeline; one item failing never
//! stops the others. Results keep input order even when items run
//! concurrently.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::types::OcrResult;
use super::OcrPipeline;
use crate::cache::CacheStatus;
use crate::intake::UploadedImage;

/// A result tagged with the filename it came from
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub filename: String,
    #[serde(flatten)]
    pub result: OcrResult,
    #[serde(skip)]
    pub cache: CacheStatus,
}

/// Caller-facing batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every item succeeded
    Success,
    /// At least one item failed, including when all of them did
    PartialSuccess,
}

/// Ordered batch outcome
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub success: bool,
    pub status: BatchStatus,
    pub total_images: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_processing_time_ms: u64,
    pub results: Vec<BatchItem>,
}

impl BatchResult {
    fn from_items(results: Vec<BatchItem>, total_processing_time_ms: u64) -> Self {
        let successful = results.iter().filter(|item| item.result.success).count();
        let failed = results.len() - successful;
        let success = failed == 0;

        Self {
            success,
            status: if success {
                BatchStatus::Success
            } else {
                BatchStatus::PartialSuccess
            },
            total_images: results.len(),
            successful,
            failed,
            total_processing_time_ms,
            results,
        }
    }

    /// Per-item cache status in result order
    pub fn cache_statuses(&self) -> impl Iterator<Item = CacheStatus> + '_ {
        self.results.iter().map(|item| item.cache)
    }
}

/// Runs uploads through the pipeline and assembles the batch result
#[derive(Clone)]
pub struct BatchOrchestrator {
    pipeline: Arc<OcrPipeline>,
    concurrency: usize,
}

impl BatchOrchestrator {
    /// `concurrency` bounds how many items are in flight; 1 is sequential
    pub fn new(pipeline: Arc<OcrPipeline>, concurrency: usize) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run(&self, uploads: &[UploadedImage]) -> BatchResult {
        let start = Instant::now();
        // Owned futures keep the stream `Send` for the handler
        let jobs: Vec<_> = uploads
            .iter()
            .cloned()
            .map(|upload| {
                let pipeline = self.pipeline.clone();
                async move {
                    let outcome = pipeline.process(&upload).await;
                    BatchItem {
                        filename: upload.display_name().to_string(),
                        result: outcome.result,
                        cache: outcome.cache,
                    }
                }
            })
            .collect();

        // `buffered` yields in submission order regardless of completion order
        let results: Vec<BatchItem> = stream::iter(jobs)
            .buffered(self.concurrency)
            .collect()
            .await;

        let batch = BatchResult::from_items(results, start.elapsed().as_millis() as u64);

        tracing::info!(
            total = batch.total_images,
            successful = batch.successful,
            failed = batch.failed,
            elapsed_ms = batch.total_processing_time_ms,
            "Batch complete"
        );

        batch
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::CacheConfig;
    use crate::fixtures;
    use crate::ocr::{RawRecognition, StaticRecognizer};

    fn orchestrator(concurrency: usize) -> BatchOrchestrator {
        let recognizer = StaticRecognizer::returning(RawRecognition::from_lines(&[&[
            ("INVOICE", 0.95),
        ]]))
        .with_delay(Duration::from_millis(5));
        let pipeline = OcrPipeline::with_recognizer(Arc::new(recognizer), CacheConfig::default());
        BatchOrchestrator::new(Arc::new(pipeline), concurrency)
    }

    fn upload(name: &str, bytes: Vec<u8>, content_type: &str) -> UploadedImage {
        UploadedImage::new(bytes, Some(content_type.to_string()), Some(name.to_string()))
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_order() {
        let uploads = vec![
            upload("first.png", fixtures::png(40, 30), "image/png"),
            upload("broken.png", vec![0u8; 512], "image/png"),
            upload("third.jpg", fixtures::jpeg(40, 30), "image/jpeg"),
        ];

        let batch = orchestrator(1).run(&uploads).await;

        assert!(!batch.success);
        assert_eq!(batch.status, BatchStatus::PartialSuccess);
        assert_eq!((batch.total_images, batch.successful, batch.failed), (3, 2, 1));

        let names: Vec<&str> = batch.results.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, vec!["first.png", "broken.png", "third.jpg"]);

        assert!(batch.results[0].result.success);
        assert_eq!(batch.results[0].result.error, None);
        assert!(!batch.results[1].result.success);
        assert!(batch.results[1].result.error.is_some());
        assert!(batch.results[2].result.success);
    }

    #[tokio::test]
    async fn test_all_success() {
        let uploads = vec![
            upload("a.png", fixtures::png(20, 20), "image/png"),
            upload("b.gif", fixtures::gif(20, 20, 1), "image/gif"),
        ];

        let batch = orchestrator(1).run(&uploads).await;

        assert!(batch.success);
        assert_eq!(batch.status, BatchStatus::Success);
    }

    #[tokio::test]
    async fn test_all_failed_is_still_partial() {
        let uploads = vec![
            upload("a.txt", b"hello".to_vec(), "text/plain"),
            upload("b.png", vec![1, 2, 3], "image/png"),
        ];

        let batch = orchestrator(1).run(&uploads).await;

        assert!(!batch.success);
        assert_eq!(batch.status, BatchStatus::PartialSuccess);
        assert_eq!(batch.failed, 2);
        assert_eq!(batch.results.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_batch_preserves_order() {
        let uploads: Vec<UploadedImage> = (0..6)
            .map(|i| {
                upload(
                    &format!("page-{}.png", i),
                    fixtures::png(16 + i, 16),
                    "image/png",
                )
            })
            .collect();

        let batch = orchestrator(4).run(&uploads).await;

        let names: Vec<String> = batch.results.iter().map(|i| i.filename.clone()).collect();
        let expected: Vec<String> = (0..6).map(|i| format!("page-{}.png", i)).collect();
        assert_eq!(names, expected);
        assert!(batch.success);
    }

    #[tokio::test]
    async fn test_repeated_item_hits_cache_within_batch() {
        let bytes = fixtures::png(24, 24);
        let uploads = vec![
            upload("one.png", bytes.clone(), "image/png"),
            upload("two.png", bytes, "image/png"),
        ];

        let batch = orchestrator(1).run(&uploads).await;

        let statuses: Vec<bool> = batch.cache_statuses().map(|s| s.is_hit()).collect();
        assert_eq!(statuses, vec![false, true]);
    }

    #[tokio::test]
    async fn test_batch_runs_on_spawned_task() {
        let batch = orchestrator(2);
        let uploads = vec![
            upload("a.png", fixtures::png(20, 20), "image/png"),
            upload("b.png", fixtures::png(22, 20), "image/png"),
        ];

        // Handlers need a `Send` future; spawning enforces the same bound
        let result = tokio::spawn(async move { batch.run(&uploads).await })
            .await
            .unwrap();

        assert_eq!(result.total_images, 2);
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_serialized_item_shape() {
        let uploads = vec![upload("a.png", fixtures::png(20, 20), "image/png")];

        let batch = orchestrator(1).run(&uploads).await;
        let json = serde_json::to_value(&batch).unwrap();

        assert_eq!(json["status"], "success");
        let item = &json["results"][0];
        assert_eq!(item["filename"], "a.png");
        assert!(item["error"].is_null());
        assert_eq!(item["metadata"]["format"], "PNG");
        assert!(item.get("cache").is_none());
    }
}
