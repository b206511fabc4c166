//! Issue solving: fetch an issue, hand it to the agent, report a tracking URL.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::keywords::extract_keywords;
use crate::core::types::Task;
use crate::executor::TaskExecutor;
use crate::io::context::{ContextFile, IssueContext, select_context};
use crate::io::github::{RepoRef, ReviewHost};
use crate::io::prompt::build_issue_prompt;
use crate::io::service::AgentService;

/// Kind of work the issue asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum IssueTaskType {
    #[default]
    Bug,
    Feature,
    Documentation,
    CodeReview,
    Refactoring,
}

impl IssueTaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Documentation => "documentation",
            Self::CodeReview => "code_review",
            Self::Refactoring => "refactoring",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub repo: RepoRef,
    pub number: u64,
    pub task_type: IssueTaskType,
    pub wait: bool,
    /// Repository files and logs to mine for relevant snippets.
    pub context: Option<ContextFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueOutcome {
    pub task: Task,
    /// Web page for the task; `None` when no task was created.
    pub tracking_url: Option<String>,
}

/// Fetch the issue and submit it to the agent.
///
/// Fetch and prompt errors are returned; task failures are data on the task.
#[instrument(skip_all, fields(repo = %request.repo, number = request.number, task_type = request.task_type.as_str()))]
pub fn solve_issue<S, H>(
    executor: &mut TaskExecutor<S>,
    host: &H,
    request: &IssueRequest,
    web_url: &str,
) -> Result<IssueOutcome>
where
    S: AgentService,
    H: ReviewHost,
{
    let issue = host
        .issue(&request.repo, request.number)
        .with_context(|| format!("fetch issue {}#{}", request.repo, request.number))?;
    let extra = match &request.context {
        Some(file) => {
            let body = issue.body.as_deref().unwrap_or_default();
            let keywords = extract_keywords(&issue.title, body);
            debug!(?keywords, "issue keywords");
            select_context(file, &keywords)
        }
        None => IssueContext::default(),
    };
    let prompt = build_issue_prompt(&request.repo, &issue, request.task_type, &extra)
        .context("build issue prompt")?;

    let task = executor.run_task(&prompt, request.wait);
    let tracking_url = tracking_url(web_url, &task.task_id);
    if let Some(url) = &tracking_url {
        info!(task_id = %task.task_id, url = %url, "issue submitted");
    }
    Ok(IssueOutcome { task, tracking_url })
}

pub fn tracking_url(web_url: &str, task_id: &str) -> Option<String> {
    (!task_id.is_empty()).then(|| format!("{}/tasks/{task_id}", web_url.trim_end_matches('/')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TaskStatus;
    use crate::io::github::Issue;
    use crate::test_support::{ScriptedHost, ScriptedService, fast_settings};

    fn request() -> IssueRequest {
        IssueRequest {
            repo: RepoRef::new("octo", "widgets"),
            number: 21,
            task_type: IssueTaskType::Feature,
            wait: false,
            context: None,
        }
    }

    #[test]
    fn submits_issue_and_reports_tracking_url() {
        let host = ScriptedHost::new().with_issue(Issue {
            number: 21,
            title: "Add dark mode".to_string(),
            ..Issue::default()
        });
        let mut executor =
            TaskExecutor::with_settings(ScriptedService::new().accept("981"), fast_settings());
        let outcome = solve_issue(&mut executor, &host, &request(), "https://app.codegen.com/")
            .expect("solve");
        assert_eq!(outcome.task.status, TaskStatus::Pending);
        assert_eq!(
            outcome.tracking_url.as_deref(),
            Some("https://app.codegen.com/tasks/981")
        );
        let prompt = executor.service().prompts().pop().expect("prompt");
        assert!(prompt.contains("Add dark mode"));
        assert!(prompt.contains("feature request"));
    }

    #[test]
    fn context_snippets_matching_issue_reach_prompt() {
        let host = ScriptedHost::new().with_issue(Issue {
            number: 21,
            title: "Fix the authentication bug in login module".to_string(),
            body: Some("`AuthenticationError: Invalid credentials` in `authenticate_user`".into()),
            ..Issue::default()
        });
        let auth = "def authenticate_user(username, password):\n    raise AuthenticationError";
        let log = "ERROR: Authentication failed for user admin";
        let file: ContextFile = serde_json::from_value(serde_json::json!({
            "files": {
                "auth.py": {"content": auth},
                "readme.md": {"content": "Widgets for everyone."}
            },
            "error_logs": [{"file": "app.log", "content": log}]
        }))
        .expect("context json");
        let mut executor =
            TaskExecutor::with_settings(ScriptedService::new().accept("5"), fast_settings());
        let mut request = request();
        request.task_type = IssueTaskType::Bug;
        request.context = Some(file);

        solve_issue(&mut executor, &host, &request, "https://x").expect("solve");
        let prompt = executor.service().prompts().pop().expect("prompt");
        assert!(prompt.contains("### auth.py"));
        assert!(prompt.contains("def authenticate_user(username, password):"));
        assert!(!prompt.contains("readme.md"));
        assert!(prompt.contains("ERROR: Authentication failed for user admin"));
    }

    #[test]
    fn missing_issue_is_error_without_submission() {
        let mut executor =
            TaskExecutor::with_settings(ScriptedService::new().accept("1"), fast_settings());
        let err = solve_issue(&mut executor, &ScriptedHost::new(), &request(), "https://x")
            .expect_err("no issue");
        assert!(format!("{err:#}").contains("octo/widgets#21"));
        assert_eq!(executor.service().submit_calls(), 0);
    }

    #[test]
    fn rejected_task_has_no_tracking_url() {
        assert_eq!(tracking_url("https://app.codegen.com", ""), None);
    }

    #[test]
    fn task_type_names_match_prompt_branches() {
        assert_eq!(IssueTaskType::CodeReview.as_str(), "code_review");
        assert_eq!(
            IssueTaskType::from_str("code_review", true).expect("parse"),
            IssueTaskType::CodeReview
        );
    }
}
