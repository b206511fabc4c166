//! Pull request review flow.
//!
//! `command → fetch metadata + diff → prompt → execute → post comments`.
//! Each step's failure ends the flow with an [`ReviewOutcome::Error`]; later
//! steps never run.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::variant::ReviewVariant;
use crate::executor::TaskExecutor;
use crate::interpret::{PostSummary, post_result_comments};
use crate::io::github::{RepoRef, ReviewHost};
use crate::io::prompt::build_review_prompt;
use crate::io::service::AgentService;

/// One review invocation.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub repo: RepoRef,
    pub number: u64,
    /// Review command such as `/review` or `/security-review`.
    pub command: String,
    pub wait: bool,
    /// Pause between comment posts.
    pub comment_delay: Duration,
}

/// Pull request data the review prompt is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewContext {
    pub repo: RepoRef,
    pub number: u64,
    pub variant: ReviewVariant,
    pub title: String,
    pub description: String,
    pub diff: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        task_id: Option<String>,
    },
    Pending {
        task_id: String,
        variant: ReviewVariant,
    },
    Completed {
        task_id: String,
        variant: ReviewVariant,
        comments: PostSummary,
    },
}

impl ReviewOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    fn error(message: impl Into<String>, task_id: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            task_id,
        }
    }
}

/// Fetch metadata and diff for `request`.
pub fn fetch_context<H: ReviewHost>(
    host: &H,
    request: &ReviewRequest,
) -> anyhow::Result<ReviewContext> {
    let variant = ReviewVariant::from_command(&request.command);
    let pull = host.pull_request(&request.repo, request.number)?;
    let diff = host.pull_request_diff(&request.repo, request.number)?;
    Ok(ReviewContext {
        repo: request.repo.clone(),
        number: request.number,
        variant,
        title: pull.title,
        description: pull.body.unwrap_or_default(),
        diff,
    })
}

/// Run one review end to end.
#[instrument(skip_all, fields(repo = %request.repo, number = request.number, command = %request.command.trim()))]
pub fn run_review<S, H>(
    executor: &mut TaskExecutor<S>,
    host: &H,
    request: &ReviewRequest,
) -> ReviewOutcome
where
    S: AgentService,
    H: ReviewHost,
{
    let ctx = match fetch_context(host, request) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "failed to fetch pull request");
            return ReviewOutcome::error(format!("Failed to fetch pull request: {err:#}"), None);
        }
    };
    info!(variant = %ctx.variant, "reviewing pull request");

    let prompt = match build_review_prompt(&ctx, executor.settings().max_prompt_chars) {
        Ok(prompt) => prompt,
        Err(err) => {
            return ReviewOutcome::error(format!("Failed to build review prompt: {err:#}"), None);
        }
    };

    let task = executor.run_task(&prompt, request.wait);
    let task_id = (!task.task_id.is_empty()).then(|| task.task_id.clone());

    if !request.wait && !task.status.is_terminal() {
        return ReviewOutcome::Pending {
            task_id: task.task_id,
            variant: ctx.variant,
        };
    }

    if !task.is_completed() {
        let message = task
            .error
            .unwrap_or_else(|| format!("Task ended with status {}", task.status));
        return ReviewOutcome::error(message, task_id);
    }

    let text = task.result.as_deref().unwrap_or_default();
    let comments = post_result_comments(host, &ctx.repo, ctx.number, text, request.comment_delay);
    info!(
        posted = comments.succeeded,
        failed = comments.failed,
        "review comments posted"
    );
    ReviewOutcome::Completed {
        task_id: task.task_id,
        variant: ctx.variant,
        comments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedHost, ScriptedService, fast_settings};
    use serde_json::json;

    fn request(command: &str, wait: bool) -> ReviewRequest {
        ReviewRequest {
            repo: RepoRef::new("octo", "widgets"),
            number: 8,
            command: command.to_string(),
            wait,
            comment_delay: Duration::ZERO,
        }
    }

    #[test]
    fn fetch_context_resolves_variant() {
        let host = ScriptedHost::new().with_pull("Tighten auth", Some("desc"), "+check()");
        let ctx = fetch_context(&host, &request("/security-review", true)).expect("ctx");
        assert_eq!(ctx.variant, ReviewVariant::Security);
        assert_eq!(ctx.title, "Tighten auth");
        assert_eq!(ctx.description, "desc");
        assert_eq!(ctx.diff, "+check()");
    }

    #[test]
    fn fetch_failure_skips_executor() {
        let host = ScriptedHost::new();
        let mut executor =
            TaskExecutor::with_settings(ScriptedService::new().accept("t-1"), fast_settings());
        let outcome = run_review(&mut executor, &host, &request("/review", true));
        assert!(outcome.is_error());
        assert_eq!(executor.service().submit_calls(), 0);
    }

    #[test]
    fn pending_outcome_serializes_with_status_tag() {
        let outcome = ReviewOutcome::Pending {
            task_id: "t-9".to_string(),
            variant: ReviewVariant::DeepDive,
        };
        assert_eq!(
            serde_json::to_value(&outcome).expect("json"),
            json!({"status": "pending", "task_id": "t-9", "variant": "deep_dive"})
        );
    }
}
