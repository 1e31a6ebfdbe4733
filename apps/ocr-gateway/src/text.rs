//! Recognized text cleanup

use std::sync::LazyLock;

use regex::Regex;

/// Control characters other than newline and tab
static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B-\x1F\x7F]+").expect("valid control character pattern")
});

static HORIZONTAL_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid whitespace pattern"));

static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline pattern"));

/// Normalize engine text for output.
///
/// Line endings become `\n`, control characters are stripped, runs of spaces
/// and tabs collapse to one space, every line is trimmed, runs of three or
/// more newlines collapse to two and the whole text is trimmed. Applying it
/// twice gives the same result as applying it once.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = CONTROL_CHARS.replace_all(&text, "");
    let text = HORIZONTAL_RUNS.replace_all(&text, " ");

    let text = text
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    BLANK_LINE_RUNS.replace_all(&text, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_is_idempotent_on_clean_input() {
        let clean = "INVOICE\nTotal: 42\n\nThank you";
        assert_eq!(clean_text(clean), clean);
        assert_eq!(clean_text(&clean_text(clean)), clean);
    }

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(clean_text("IN\x00VO\x07ICE\x7F"), "INVOICE");
    }

    #[test]
    fn test_collapses_blank_lines() {
        assert_eq!(clean_text("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(clean_text("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_collapses_spaces_and_trims_lines() {
        assert_eq!(clean_text("  Total:\t\t 42   \n   next  "), "Total: 42\nnext");
    }

    #[test]
    fn test_whitespace_only_lines_do_not_leave_gaps() {
        // Lines holding only spaces become empty and then collapse
        assert_eq!(clean_text("a\n   \n \t \n  \nb"), "a\n\nb");
    }

    #[test]
    fn test_windows_line_endings() {
        assert_eq!(clean_text("a\r\nb\r\n\r\n\r\n\r\nc"), "a\nb\n\nc");
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \n\t\n "), "");
    }
}
