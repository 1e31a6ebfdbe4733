//! Tesseract backend
//!
//! Runs the `tesseract` CLI as a child process, feeding the image on stdin
//! and reading TSV from stdout. Level-5 TSV rows are words; their
//! page/block/paragraph/line numbers rebuild both the hierarchy and the text.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::provider::Recognizer;
use super::types::{Block, OcrError, Page, Paragraph, RawRecognition, Word};

const WORD_LEVEL: u32 = 5;

/// Tesseract CLI recognizer
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(language: &str) -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: language.to_string(),
        }
    }

    /// Use a specific executable instead of `tesseract` on the PATH
    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn recognize(&self, image: &[u8]) -> Result<RawRecognition, OcrError> {
        let tsv = run_tesseract(&self.binary, &self.language, image).await?;
        Ok(parse_tsv(&tsv))
    }
}

/// Run the CLI once. The child is killed if this future is dropped, so an
/// abandoned call never outlives its worker slot.
async fn run_tesseract(binary: &str, language: &str, image: &[u8]) -> Result<String, OcrError> {
    let mut child = Command::new(binary)
        .args(["stdin", "stdout", "-l", language, "tsv"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                OcrError::Unavailable(format!("{} is not installed", binary))
            }
            _ => OcrError::Engine(format!("Failed to run tesseract: {}", e)),
        })?;

    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(image).await,
        None => Ok(()),
    };

    // Collect output even when the write failed; stderr holds the cause
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| OcrError::Engine(format!("Failed to read tesseract output: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OcrError::Engine(format!(
            "Tesseract failed: {}",
            stderr.trim()
        )));
    }

    written.map_err(|e| OcrError::Engine(format!("Failed to send image to tesseract: {}", e)))?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Position of a word row in the layout hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RowKey {
    page: u32,
    block: u32,
    paragraph: u32,
    line: u32,
}

/// Parse Tesseract TSV output into the recognition hierarchy
pub fn parse_tsv(tsv: &str) -> RawRecognition {
    let mut pages: Vec<Page> = Vec::new();
    let mut text = String::new();
    let mut last: Option<RowKey> = None;

    for row in tsv.lines() {
        let cols: Vec<&str> = row.splitn(12, '\t').collect();
        if cols.len() < 11 {
            continue;
        }

        let level = match cols[0].trim().parse::<u32>() {
            Ok(level) => level,
            // Header row
            Err(_) => continue,
        };
        if level != WORD_LEVEL {
            continue;
        }

        let confidence = match cols[10].trim().parse::<f64>() {
            Ok(conf) if conf >= 0.0 => (conf / 100.0).clamp(0.0, 1.0),
            _ => continue,
        };
        let word = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        if word.is_empty() {
            continue;
        }

        let parse = |idx: usize| cols[idx].trim().parse::<u32>().unwrap_or(0);
        let key = RowKey {
            page: parse(1),
            block: parse(2),
            paragraph: parse(3),
            line: parse(4),
        };

        match last {
            Some(prev) if prev.page == key.page => {
                if prev.block != key.block {
                    if let Some(page) = pages.last_mut() {
                        page.blocks.push(Block {
                            paragraphs: vec![Paragraph::default()],
                        });
                    }
                    text.push_str("\n\n");
                } else if prev.paragraph != key.paragraph {
                    if let Some(block) = pages.last_mut().and_then(|p| p.blocks.last_mut()) {
                        block.paragraphs.push(Paragraph::default());
                    }
                    text.push_str("\n\n");
                } else if prev.line != key.line {
                    text.push('\n');
                } else {
                    text.push(' ');
                }
            }
            _ => {
                if last.is_some() {
                    text.push_str("\n\n");
                }
                pages.push(Page {
                    blocks: vec![Block {
                        paragraphs: vec![Paragraph::default()],
                    }],
                });
            }
        }

        if let Some(paragraph) = pages
            .last_mut()
            .and_then(|p| p.blocks.last_mut())
            .and_then(|b| b.paragraphs.last_mut())
        {
            paragraph.words.push(Word {
                text: word.to_string(),
                confidence,
            });
        }
        text.push_str(word);
        last = Some(key);
    }

    RawRecognition { text, pages }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn row(key: (u32, u32, u32, u32), conf: &str, text: &str) -> String {
        format!(
            "5\t{}\t{}\t{}\t{}\t1\t0\t0\t10\t10\t{}\t{}",
            key.0, key.1, key.2, key.3, conf, text
        )
    }

    #[test]
    fn test_parse_words_and_lines() {
        let tsv = [
            HEADER.to_string(),
            "1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t".to_string(),
            row((1, 1, 1, 1), "96.5", "INVOICE"),
            row((1, 1, 1, 2), "90", "Total:"),
            row((1, 1, 1, 2), "80", "42"),
        ]
        .join("\n");

        let raw = parse_tsv(&tsv);

        assert_eq!(raw.text, "INVOICE\nTotal: 42");
        assert_eq!(raw.pages.len(), 1);
        let confidences: Vec<f64> = raw.pages[0].words().map(|w| w.confidence).collect();
        assert_eq!(confidences, vec![0.965, 0.9, 0.8]);
    }

    #[test]
    fn test_blocks_and_paragraphs_separated_by_blank_line() {
        let tsv = [
            HEADER.to_string(),
            row((1, 1, 1, 1), "90", "Header"),
            row((1, 1, 2, 1), "90", "Body"),
            row((1, 2, 1, 1), "90", "Footer"),
        ]
        .join("\n");

        let raw = parse_tsv(&tsv);

        assert_eq!(raw.text, "Header\n\nBody\n\nFooter");
        assert_eq!(raw.pages[0].blocks.len(), 2);
        assert_eq!(raw.pages[0].blocks[0].paragraphs.len(), 2);
    }

    #[test]
    fn test_skips_negative_confidence_and_blank_words() {
        let tsv = [
            HEADER.to_string(),
            row((1, 1, 1, 1), "-1", "ghost"),
            row((1, 1, 1, 1), "70", " "),
            row((1, 1, 1, 1), "70", "real"),
        ]
        .join("\n");

        let raw = parse_tsv(&tsv);

        assert_eq!(raw.text, "real");
        assert_eq!(raw.pages[0].words().count(), 1);
    }

    #[test]
    fn test_empty_output() {
        let raw = parse_tsv(HEADER);
        assert!(raw.text.is_empty());
        assert!(raw.pages.is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let recognizer = TesseractRecognizer::new("eng").with_binary("definitely-not-tesseract-bin");

        assert!(!recognizer.is_available().await);
        let err = recognizer.recognize(b"jpeg").await.unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)));
    }

    /// Write an executable stand-in for the tesseract binary
    #[cfg(unix)]
    fn fake_tesseract(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("tesseract");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_tsv_from_child() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_tesseract(
            &dir,
            "cat > /dev/null\nprintf '5\\t1\\t1\\t1\\t1\\t1\\t0\\t0\\t10\\t10\\t91\\tHELLO\\n'",
        );
        let recognizer = TesseractRecognizer::new("eng").with_binary(binary.to_str().unwrap());

        let raw = recognizer.recognize(&[7u8; 4096]).await.unwrap();

        assert_eq!(raw.text, "HELLO");
        assert_eq!(raw.pages[0].words().next().unwrap().confidence, 0.91);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let binary = fake_tesseract(
            &dir,
            "echo \"Failed loading language 'xx'\" >&2\nexit 1",
        );
        let recognizer = TesseractRecognizer::new("xx").with_binary(binary.to_str().unwrap());

        // Large enough that the write hits a closed pipe
        let err = recognizer.recognize(&vec![0u8; 4 * 1024 * 1024]).await.unwrap_err();

        match err {
            OcrError::Engine(message) => {
                assert!(message.contains("Failed loading language 'xx'"), "{}", message)
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    /// Whether a process is still running; zombies count as ended
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .map(|state| state != "Z")
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_engine_process_is_killed() {
        use std::sync::Arc;
        use std::time::Duration;

        use crate::error::ExtractionError;
        use crate::ocr::RecognitionAdapter;

        let dir = tempfile::tempdir().unwrap();
        let binary = fake_tesseract(&dir, "echo $$ >> \"$0.pids\"\nexec sleep 30");
        let recognizer = TesseractRecognizer::new("eng").with_binary(binary.to_str().unwrap());
        let adapter = RecognitionAdapter::new(Arc::new(recognizer), 1, Duration::from_millis(500));

        for _ in 0..3 {
            let err = adapter.recognize(vec![1u8; 64].into()).await.unwrap_err();
            assert!(matches!(err, ExtractionError::RecognitionTimeout(_)));
        }

        let pids: Vec<u32> = std::fs::read_to_string(dir.path().join("tesseract.pids"))
            .unwrap()
            .lines()
            .map(|line| line.trim().parse().unwrap())
            .collect();
        assert_eq!(pids.len(), 3);

        // Abort and kill are asynchronous; give them a moment to land
        for _ in 0..50 {
            if pids.iter().all(|pid| !is_running(*pid)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let live: Vec<u32> = pids.iter().copied().filter(|pid| is_running(*pid)).collect();
        assert!(live.is_empty(), "engine processes outlived their timeout: {:?}", live);
    }
}
