//! Splitting agent output into discrete review comments.

use crate::core::extract::is_comment_line;

/// Every non-blank, non-`#` line of `text`, trimmed, in original order.
pub fn comment_lines(text: &str) -> Vec<String> {
    text.lines().filter_map(keep_comment).collect()
}

/// Apply the same filter to comments that are already split.
pub fn filter_comments<S: AsRef<str>>(comments: &[S]) -> Vec<String> {
    comments
        .iter()
        .filter_map(|comment| keep_comment(comment.as_ref()))
        .collect()
}

fn keep_comment(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_comment_line(trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}
