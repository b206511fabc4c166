//! Turning a finished task's free-form result into actions.
//!
//! Two modes: structured extraction of a JSON payload, and line-comment mode
//! where each kept line of the result is posted as one review comment.

use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::comments::comment_lines;
use crate::core::extract::extract;
use crate::core::types::Task;
use crate::io::github::{RepoRef, ReviewHost};

/// Extract the JSON payload from a task's result.
pub fn parse_structured(task: &Task) -> Result<Value> {
    let raw = task
        .result
        .as_deref()
        .filter(|result| !result.trim().is_empty())
        .ok_or_else(|| anyhow!("task {} has no result to parse", task.task_id))?;
    Ok(extract(raw)?)
}

/// Outcome of posting one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentResult {
    pub comment: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<CommentResult>,
}

/// Split `text` into comments and post them; see [`post_comments`].
pub fn post_result_comments<H: ReviewHost>(
    host: &H,
    repo: &RepoRef,
    number: u64,
    text: &str,
    delay: Duration,
) -> PostSummary {
    post_comments(host, repo, number, &comment_lines(text), delay)
}

/// Post each comment in order, pausing `delay` between posts.
///
/// A failed post is recorded and does not stop the remaining posts.
#[instrument(skip_all, fields(repo = %repo, number = number, total = comments.len()))]
pub fn post_comments<H: ReviewHost>(
    host: &H,
    repo: &RepoRef,
    number: u64,
    comments: &[String],
    delay: Duration,
) -> PostSummary {
    let mut summary = PostSummary {
        total: comments.len(),
        ..PostSummary::default()
    };

    for (index, comment) in comments.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }
        let result = match host.post_comment(repo, number, comment) {
            Ok(id) => {
                info!(index, comment_id = id, "posted comment");
                summary.succeeded += 1;
                CommentResult {
                    comment: comment.clone(),
                    success: true,
                    comment_id: Some(id),
                    error: None,
                }
            }
            Err(err) => {
                warn!(index, error = %format!("{err:#}"), "failed to post comment");
                summary.failed += 1;
                CommentResult {
                    comment: comment.clone(),
                    success: false,
                    comment_id: None,
                    error: Some(format!("{err:#}")),
                }
            }
        };
        summary.results.push(result);
    }

    summary
}
