//! Agent configuration: defaults, optional `agent.toml`, then environment.
//!
//! The config is built once at startup and passed by reference into each
//! component. Nothing here is global and nothing is written back to disk.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "agent.toml";

/// Runtime configuration (TOML + environment).
///
/// Missing fields take the defaults below. Durations are stored as seconds so
/// the file stays readable by hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub codegen_token: String,
    pub codegen_org_id: String,
    pub codegen_api_url: String,
    /// Base of the human-facing task pages.
    pub codegen_web_url: String,

    pub github_token: String,
    pub github_api_url: String,
    /// Default `owner/name` repository.
    pub repo_name: String,

    /// Submission attempts per task (including the first).
    pub max_retries: u32,
    /// Base delay for exponential backoff between submission attempts.
    pub retry_delay_secs: f64,
    pub poll_interval_secs: f64,
    /// Wall-clock budget for polling, measured from the first poll.
    pub poll_timeout_secs: f64,
    /// Per-HTTP-call timeout.
    pub request_timeout_secs: f64,

    /// Consecutive exhausted submissions that open the breaker.
    pub breaker_threshold: u32,
    pub breaker_recovery_secs: f64,

    pub max_prompt_chars: usize,
    /// Pause between sequential comment posts.
    pub comment_delay_secs: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            codegen_token: String::new(),
            codegen_org_id: String::new(),
            codegen_api_url: "https://api.codegen.com".to_string(),
            codegen_web_url: "https://app.codegen.com".to_string(),
            github_token: String::new(),
            github_api_url: "https://api.github.com".to_string(),
            repo_name: String::new(),
            max_retries: 3,
            retry_delay_secs: 2.0,
            poll_interval_secs: 10.0,
            poll_timeout_secs: 300.0,
            request_timeout_secs: 30.0,
            breaker_threshold: 5,
            breaker_recovery_secs: 60.0,
            max_prompt_chars: 32_000,
            comment_delay_secs: 1.0,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(anyhow!("max_retries must be > 0"));
        }
        if self.breaker_threshold == 0 {
            return Err(anyhow!("breaker_threshold must be > 0"));
        }
        if self.max_prompt_chars == 0 {
            return Err(anyhow!("max_prompt_chars must be > 0"));
        }
        for (name, secs) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("poll_timeout_secs", self.poll_timeout_secs),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(anyhow!("{name} must be > 0"));
            }
            check_representable(name, secs)?;
        }
        for (name, secs) in [
            ("retry_delay_secs", self.retry_delay_secs),
            ("breaker_recovery_secs", self.breaker_recovery_secs),
            ("comment_delay_secs", self.comment_delay_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(anyhow!("{name} must be >= 0"));
            }
            check_representable(name, secs)?;
        }
        Ok(())
    }

    /// Credentials for the agent service are required to construct a client.
    pub fn require_agent_credentials(&self) -> Result<()> {
        if self.codegen_token.trim().is_empty() {
            return Err(anyhow!(
                "Codegen API token is required (set CODEGEN_TOKEN or pass --codegen-token)"
            ));
        }
        if self.codegen_org_id.trim().is_empty() {
            return Err(anyhow!(
                "Codegen organization ID is required (set CODEGEN_ORG_ID or pass --codegen-org-id)"
            ));
        }
        Ok(())
    }

    pub fn require_github_token(&self) -> Result<()> {
        if self.github_token.trim().is_empty() {
            return Err(anyhow!(
                "GitHub token is required (set GITHUB_TOKEN or pass --github-token)"
            ));
        }
        Ok(())
    }

    /// Override fields from environment variables resolved through `lookup`.
    ///
    /// Empty values are ignored. Malformed numbers are errors naming the variable.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        for (key, field) in [
            ("CODEGEN_TOKEN", &mut self.codegen_token),
            ("CODEGEN_ORG_ID", &mut self.codegen_org_id),
            ("CODEGEN_API_URL", &mut self.codegen_api_url),
            ("CODEGEN_WEB_URL", &mut self.codegen_web_url),
            ("GITHUB_TOKEN", &mut self.github_token),
            ("GITHUB_API_URL", &mut self.github_api_url),
            ("GITHUB_REPOSITORY", &mut self.repo_name),
        ] {
            if let Some(value) = get(key) {
                *field = value;
            }
        }

        parse_env(&get, "AGENT_MAX_RETRIES", &mut self.max_retries)?;
        parse_env(&get, "AGENT_RETRY_DELAY_SECS", &mut self.retry_delay_secs)?;
        parse_env(&get, "AGENT_POLL_INTERVAL_SECS", &mut self.poll_interval_secs)?;
        parse_env(&get, "AGENT_POLL_TIMEOUT_SECS", &mut self.poll_timeout_secs)?;
        parse_env(&get, "AGENT_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs)?;
        parse_env(&get, "AGENT_BREAKER_THRESHOLD", &mut self.breaker_threshold)?;
        parse_env(&get, "AGENT_BREAKER_RECOVERY_SECS", &mut self.breaker_recovery_secs)?;
        parse_env(&get, "AGENT_MAX_PROMPT_CHARS", &mut self.max_prompt_chars)?;
        parse_env(&get, "AGENT_COMMENT_DELAY_SECS", &mut self.comment_delay_secs)?;
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        secs(self.retry_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        secs(self.poll_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        secs(self.request_timeout_secs)
    }

    pub fn breaker_recovery(&self) -> Duration {
        secs(self.breaker_recovery_secs)
    }

    pub fn comment_delay(&self) -> Duration {
        secs(self.comment_delay_secs)
    }
}

fn parse_env<G, T>(get: &G, key: &str, field: &mut T) -> Result<()>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = get(key) {
        *field = raw
            .trim()
            .parse()
            .map_err(|err| anyhow!("invalid {key}={raw:?}: {err}"))?;
    }
    Ok(())
}

/// Only valid after `validate`, which rejects values that do not fit.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Durations are added to `Instant`s, so keep them within a year.
const MAX_DURATION_SECS: f64 = 365.0 * 24.0 * 60.0 * 60.0;

fn check_representable(name: &str, secs: f64) -> Result<()> {
    if secs > MAX_DURATION_SECS || Duration::try_from_secs_f64(secs).is_err() {
        return Err(anyhow!("{name} is too large (max {MAX_DURATION_SECS} seconds)"));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        return Ok(AgentConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Defaults, then `path`, then the process environment; validated.
pub fn resolve_config(path: &Path) -> Result<AgentConfig> {
    let mut cfg = load_config(path)?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}
