//! Test-only fakes for the agent service and review host.
//!
//! Both fakes replay queued responses in order and record what they were
//! asked to do, so tests can assert on call counts and payloads.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::core::backoff::BackoffPolicy;
use crate::executor::ExecutorSettings;
use crate::io::config::AgentConfig;
use crate::io::github::{Issue, PullRequest, RepoRef, ReviewHost};
use crate::io::service::{AgentService, RemoteTask};

/// Executor settings with millisecond delays and a one-second poll budget.
pub fn fast_settings() -> ExecutorSettings {
    ExecutorSettings {
        max_retries: 3,
        backoff: BackoffPolicy::new(Duration::from_millis(1)),
        jitter: false,
        poll_interval: Duration::from_millis(5),
        poll_timeout: Duration::from_secs(1),
        max_prompt_chars: 32_000,
        breaker_threshold: 5,
        breaker_recovery: Duration::from_secs(60),
    }
}

/// Config with the same fast timings plus dummy credentials.
pub fn fast_config() -> AgentConfig {
    AgentConfig {
        codegen_token: "test_token".to_string(),
        codegen_org_id: "test_org_id".to_string(),
        github_token: "test_github_token".to_string(),
        repo_name: "octo/widgets".to_string(),
        retry_delay_secs: 0.001,
        poll_interval_secs: 0.005,
        poll_timeout_secs: 1.0,
        comment_delay_secs: 0.0,
        ..AgentConfig::default()
    }
}

/// Submission response for [`ScriptedService`].
#[derive(Debug, Clone)]
pub enum ScriptedSubmit {
    Accept(String),
    Reject(String),
}

/// Refresh response for [`ScriptedService`].
#[derive(Debug, Clone)]
pub enum ScriptedRefresh {
    Status {
        status: String,
        result: Option<String>,
        error: Option<String>,
    },
    Error(String),
}

/// Agent service replaying queued submissions and refreshes.
///
/// An empty submission queue rejects; an empty refresh queue leaves the task
/// unchanged, so polling continues until the deadline.
#[derive(Debug, Default)]
pub struct ScriptedService {
    submits: VecDeque<ScriptedSubmit>,
    refreshes: VecDeque<ScriptedRefresh>,
    prompts: Vec<String>,
    refresh_calls: usize,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(mut self, task_id: &str) -> Self {
        self.submits
            .push_back(ScriptedSubmit::Accept(task_id.to_string()));
        self
    }

    pub fn reject(mut self, error: &str) -> Self {
        self.submits
            .push_back(ScriptedSubmit::Reject(error.to_string()));
        self
    }

    pub fn status(mut self, status: &str, result: Option<&str>, error: Option<&str>) -> Self {
        self.refreshes.push_back(ScriptedRefresh::Status {
            status: status.to_string(),
            result: result.map(str::to_string),
            error: error.map(str::to_string),
        });
        self
    }

    pub fn refresh_error(mut self, error: &str) -> Self {
        self.refreshes
            .push_back(ScriptedRefresh::Error(error.to_string()));
        self
    }

    /// Number of submission attempts, successful or not.
    pub fn submit_calls(&self) -> usize {
        self.prompts.len()
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls
    }

    /// Prompts in submission order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.clone()
    }
}

impl AgentService for ScriptedService {
    fn submit(&mut self, prompt: &str) -> Result<RemoteTask> {
        self.prompts.push(prompt.to_string());
        match self.submits.pop_front() {
            Some(ScriptedSubmit::Accept(id)) => Ok(RemoteTask {
                raw: Some(json!({ "id": id, "status": "pending" })),
                id,
                status: "pending".to_string(),
                ..RemoteTask::default()
            }),
            Some(ScriptedSubmit::Reject(error)) => Err(anyhow!(error)),
            None => Err(anyhow!("no scripted submission left")),
        }
    }

    fn refresh(&mut self, task: &mut RemoteTask) -> Result<()> {
        self.refresh_calls += 1;
        match self.refreshes.pop_front() {
            Some(ScriptedRefresh::Status {
                status,
                result,
                error,
            }) => {
                task.raw = Some(json!({
                    "id": task.id,
                    "status": status,
                    "result": result,
                    "error": error,
                }));
                task.status = status;
                task.result = result;
                task.error = error;
                Ok(())
            }
            Some(ScriptedRefresh::Error(error)) => Err(anyhow!(error)),
            None => Ok(()),
        }
    }
}

/// Review host backed by in-memory pull requests and issues.
///
/// Pull requests and issues answer for any repository and number. Without
/// one configured, lookups fail.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    pull: Option<(PullRequest, String)>,
    issue: Option<Issue>,
    failing_posts: BTreeMap<usize, String>,
    post_attempts: RefCell<usize>,
    posted: RefCell<Vec<String>>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pull(mut self, title: &str, body: Option<&str>, diff: &str) -> Self {
        let pull = PullRequest {
            number: 0,
            title: title.to_string(),
            body: body.map(str::to_string),
        };
        self.pull = Some((pull, diff.to_string()));
        self
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issue = Some(issue);
        self
    }

    /// Make the `index`-th post attempt (zero-based) fail with `error`.
    pub fn fail_post(mut self, index: usize, error: &str) -> Self {
        self.failing_posts.insert(index, error.to_string());
        self
    }

    /// Successfully posted comment bodies, in order.
    pub fn posted(&self) -> Vec<String> {
        self.posted.borrow().clone()
    }

    pub fn post_attempts(&self) -> usize {
        *self.post_attempts.borrow()
    }
}

impl ReviewHost for ScriptedHost {
    fn pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequest> {
        let (pull, _) = self
            .pull
            .as_ref()
            .ok_or_else(|| anyhow!("pull request {repo}#{number} not found"))?;
        Ok(PullRequest {
            number,
            ..pull.clone()
        })
    }

    fn pull_request_diff(&self, repo: &RepoRef, number: u64) -> Result<String> {
        self.pull
            .as_ref()
            .map(|(_, diff)| diff.clone())
            .ok_or_else(|| anyhow!("pull request {repo}#{number} not found"))
    }

    fn issue(&self, repo: &RepoRef, number: u64) -> Result<Issue> {
        self.issue
            .clone()
            .ok_or_else(|| anyhow!("issue {repo}#{number} not found"))
    }

    fn post_comment(&self, _repo: &RepoRef, _number: u64, body: &str) -> Result<u64> {
        let index = {
            let mut attempts = self.post_attempts.borrow_mut();
            let index = *attempts;
            *attempts += 1;
            index
        };
        if let Some(error) = self.failing_posts.get(&index) {
            return Err(anyhow!(error.clone()));
        }
        self.posted.borrow_mut().push(body.to_string());
        Ok(1_000 + index as u64)
    }
}

/// Temporary working directory holding an `agent.toml`.
pub struct TempConfig {
    dir: TempDir,
}

impl TempConfig {
    pub fn new(contents: &str) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("agent.toml"), contents)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("agent.toml")
    }
}
