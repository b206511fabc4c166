//! Remote agent service abstraction.
//!
//! The [`AgentService`] trait decouples the task lifecycle from the HTTP
//! backend. Tests use scripted services that return predetermined handles
//! without touching the network.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::io::config::AgentConfig;

/// Handle to a task living on the remote service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteTask {
    pub id: String,
    /// Status string exactly as reported by the service.
    pub status: String,
    pub result: Option<String>,
    pub error: Option<String>,
    /// Last raw response body.
    pub raw: Option<Value>,
}

/// Abstraction over remote agent backends.
pub trait AgentService {
    /// Create a task for `prompt` and return its handle.
    fn submit(&mut self, prompt: &str) -> Result<RemoteTask>;
    /// Re-read the task's status, result and error from the service.
    fn refresh(&mut self, task: &mut RemoteTask) -> Result<()>;
}

/// Agent service speaking the Codegen REST API.
pub struct CodegenService {
    client: Client,
    base_url: String,
    org_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    id: Value,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl CodegenService {
    /// Build a client from `config`. Fails when credentials are missing.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        config.require_agent_credentials()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("build codegen http client")?;
        Ok(Self {
            client,
            base_url: config.codegen_api_url.trim_end_matches('/').to_string(),
            org_id: config.codegen_org_id.clone(),
            token: config.codegen_token.clone(),
        })
    }

    fn runs_url(&self) -> String {
        runs_url(&self.base_url, &self.org_id)
    }
}

impl AgentService for CodegenService {
    #[instrument(skip_all, fields(prompt_chars = prompt.chars().count()))]
    fn submit(&mut self, prompt: &str) -> Result<RemoteTask> {
        let response = self
            .client
            .post(self.runs_url())
            .bearer_auth(&self.token)
            .json(&json!({ "prompt": prompt }))
            .send()
            .context("send create-task request")?;
        let raw = read_json(response).context("create task")?;
        let task = remote_task_from(raw)?;
        debug!(task_id = %task.id, status = %task.status, "task submitted");
        Ok(task)
    }

    #[instrument(skip_all, fields(task_id = %task.id))]
    fn refresh(&mut self, task: &mut RemoteTask) -> Result<()> {
        let url = format!("{}/{}", self.runs_url(), task.id);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .context("send refresh request")?;
        let raw = read_json(response).context("refresh task")?;
        let fresh = remote_task_from(raw)?;
        task.status = fresh.status;
        task.result = fresh.result;
        task.error = fresh.error;
        task.raw = fresh.raw;
        Ok(())
    }
}

fn runs_url(base_url: &str, org_id: &str) -> String {
    format!("{base_url}/v1/organizations/{org_id}/agent/run")
}

fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(anyhow!("agent service returned {status}: {}", body.trim()));
    }
    response.json().context("decode agent service response")
}

/// Map a response body to a handle. The id may be numeric or a string.
fn remote_task_from(raw: Value) -> Result<RemoteTask> {
    let body: RunBody =
        serde_json::from_value(raw.clone()).context("agent service response has no task id")?;
    let id = match body.id {
        Value::String(id) => id,
        Value::Number(id) => id.to_string(),
        other => return Err(anyhow!("unexpected task id {other}")),
    };
    if id.is_empty() {
        return Err(anyhow!("agent service returned an empty task id"));
    }
    Ok(RemoteTask {
        id,
        status: body.status.unwrap_or_else(|| "pending".to_string()),
        result: body.result,
        error: body.error,
        raw: Some(raw),
    })
}
