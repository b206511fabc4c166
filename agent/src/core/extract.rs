//! Tolerant extraction of a JSON payload from free-form agent output.
//!
//! Agents interleave commentary with machine-readable output. Lines starting
//! with `#` are dropped first, then the filtered text is tried as:
//!
//! 1. the first ```` ```json ```` fenced block,
//! 2. the span from the first `{` to the last `}`,
//! 3. the whole text.
//!
//! The first candidate that parses wins.

use std::error::Error;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

/// Characters of filtered text kept in [`ExtractError`] messages.
pub const PREVIEW_CHARS: usize = 500;

/// Marker for commentary lines.
pub const COMMENT_MARKER: char = '#';

static FENCED_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*\n(.*?)\n\s*```").expect("fenced json regex"));
static OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(\{.*\})").expect("object regex"));

/// No candidate in the text parsed as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractError {
    /// Leading slice of the filtered text.
    pub preview: String,
    /// Whether the filtered text was longer than the preview.
    pub truncated: bool,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse JSON from result: {}", self.preview)?;
        if self.truncated {
            f.write_str("...")?;
        }
        Ok(())
    }
}

impl Error for ExtractError {}

/// Extract a single JSON value from `raw`.
pub fn extract(raw: &str) -> Result<Value, ExtractError> {
    let filtered = strip_comment_lines(raw);

    if let Some(caps) = FENCED_JSON_RE.captures(&filtered) {
        match serde_json::from_str(&caps[1]) {
            Ok(value) => return Ok(value),
            Err(err) => warn!(error = %err, "failed to parse JSON from code block"),
        }
    }

    if let Some(caps) = OBJECT_RE.captures(&filtered) {
        match serde_json::from_str(&caps[1]) {
            Ok(value) => return Ok(value),
            Err(err) => warn!(error = %err, "failed to parse JSON from matched object"),
        }
    }

    match serde_json::from_str(&filtered) {
        Ok(value) => Ok(value),
        Err(err) => {
            debug!(error = %err, "filtered text is not JSON");
            Err(preview_error(&filtered))
        }
    }
}

/// Render `value` the way agents are asked to return it.
pub fn render_fenced(value: &Value) -> String {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{body}\n```")
}

/// Drop every line whose trimmed form starts with `#`, preserving order.
pub fn strip_comment_lines(raw: &str) -> String {
    raw.lines()
        .filter(|line| !is_comment_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn is_comment_line(line: &str) -> bool {
    line.trim_start().starts_with(COMMENT_MARKER)
}

fn preview_error(filtered: &str) -> ExtractError {
    let preview: String = filtered.chars().take(PREVIEW_CHARS).collect();
    let truncated = filtered.chars().nth(PREVIEW_CHARS).is_some();
    ExtractError { preview, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_fenced_block() {
        let raw = "Here's the result:\n\n```json\n{\n  \"key\": \"value\",\n  \"number\": 42\n}\n```\n";
        assert_eq!(extract(raw).expect("extract"), json!({"key": "value", "number": 42}));
    }

    #[test]
    fn parses_embedded_object() {
        let raw = "Here's the result:\n\n{\"key\": \"value\", \"number\": 42}\n\nHope that helps!";
        assert_eq!(extract(raw).expect("extract"), json!({"key": "value", "number": 42}));
    }

    #[test]
    fn parses_whole_text() {
        assert_eq!(extract("[1, 2, 3]").expect("extract"), json!([1, 2, 3]));
    }

    #[test]
    fn comment_lines_are_dropped_before_parsing() {
        let raw = "# note\n{\"a\": 1}\n# end";
        assert_eq!(extract(raw).expect("extract"), json!({"a": 1}));
    }

    #[test]
    fn comment_inside_object_is_dropped() {
        let raw = "{\n  \"a\": 1,\n  # explain b\n  \"b\": 2\n}";
        assert_eq!(extract(raw).expect("extract"), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn broken_fence_falls_through_to_object() {
        let raw = "```json\n{not json}\n```\nactual: {\"ok\": true}";
        // Greedy object match spans both brace pairs, so the final whole-text
        // attempt also fails; only a well-formed object survives.
        assert!(extract(raw).is_err());

        let raw = "```json\nnot json\n```\n{\"ok\": true}";
        assert_eq!(extract(raw).expect("extract"), json!({"ok": true}));
    }

    #[test]
    fn fenced_rendering_round_trips() {
        let value = json!({"issues": [{"file": "src/lib.rs", "line": 3}], "ok": false});
        assert_eq!(extract(&render_fenced(&value)).expect("extract"), value);
    }

    #[test]
    fn error_preview_is_bounded() {
        let raw = "x".repeat(2_000);
        let err = extract(&raw).expect_err("not json");
        assert_eq!(err.preview.chars().count(), PREVIEW_CHARS);
        assert!(err.truncated);
        assert!(err.to_string().ends_with("..."));
    }

    #[test]
    fn short_error_is_not_marked_truncated() {
        let err = extract("This is not JSON").expect_err("not json");
        assert_eq!(err.preview, "This is not JSON");
        assert!(!err.truncated);
    }
}
