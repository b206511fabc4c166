//! Review-hosting backend: pull requests, issues and comments.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::io::config::AgentConfig;

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.diff";

/// `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl FromStr for RepoRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(anyhow!("repository must be owner/name, got {trimmed:?}")),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Abstraction over the review-hosting backend.
pub trait ReviewHost {
    fn pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequest>;
    /// Unified diff of the pull request.
    fn pull_request_diff(&self, repo: &RepoRef, number: u64) -> Result<String>;
    fn issue(&self, repo: &RepoRef, number: u64) -> Result<Issue>;
    /// Post `body` as an issue/PR comment and return the new comment's id.
    fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<u64>;
}

/// GitHub REST client.
pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedComment {
    id: u64,
}

impl GitHubClient {
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        config.require_github_token()?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("agent-task-runner"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .context("build github http client")?;
        Ok(Self {
            client,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            token: config.github_token.clone(),
        })
    }

    fn get(&self, path: &str, accept: &'static str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.api_url))
            .bearer_auth(&self.token)
            .header(ACCEPT, accept)
    }
}

impl ReviewHost for GitHubClient {
    #[instrument(skip_all, fields(repo = %repo, number = number))]
    fn pull_request(&self, repo: &RepoRef, number: u64) -> Result<PullRequest> {
        let response = self
            .get(&pull_path(repo, number), JSON_MEDIA_TYPE)
            .send()
            .context("send pull request lookup")?;
        check(response)?
            .json()
            .with_context(|| format!("decode pull request {repo}#{number}"))
    }

    #[instrument(skip_all, fields(repo = %repo, number = number))]
    fn pull_request_diff(&self, repo: &RepoRef, number: u64) -> Result<String> {
        let response = self
            .get(&pull_path(repo, number), DIFF_MEDIA_TYPE)
            .send()
            .context("send pull request diff lookup")?;
        let diff = check(response)?
            .text()
            .with_context(|| format!("read diff for {repo}#{number}"))?;
        debug!(bytes = diff.len(), "fetched diff");
        Ok(diff)
    }

    #[instrument(skip_all, fields(repo = %repo, number = number))]
    fn issue(&self, repo: &RepoRef, number: u64) -> Result<Issue> {
        let response = self
            .get(&issue_path(repo, number), JSON_MEDIA_TYPE)
            .send()
            .context("send issue lookup")?;
        check(response)?
            .json()
            .with_context(|| format!("decode issue {repo}#{number}"))
    }

    #[instrument(skip_all, fields(repo = %repo, number = number))]
    fn post_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<u64> {
        let response = self
            .client
            .post(format!("{}{}/comments", self.api_url, issue_path(repo, number)))
            .bearer_auth(&self.token)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .json(&json!({ "body": body }))
            .send()
            .context("send comment")?;
        let created: CreatedComment = check(response)?.json().context("decode created comment")?;
        Ok(created.id)
    }
}

fn pull_path(repo: &RepoRef, number: u64) -> String {
    format!("/repos/{}/{}/pulls/{number}", repo.owner, repo.name)
}

fn issue_path(repo: &RepoRef, number: u64) -> String {
    format!("/repos/{}/{}/issues/{number}", repo.owner, repo.name)
}

fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().unwrap_or_default();
    Err(anyhow!("{url} returned {status}: {}", body.trim()))
}
