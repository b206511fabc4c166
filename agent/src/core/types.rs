//! Task value and status enumeration shared by the executor and its callers.
//!
//! These types carry no I/O. A `Task` is the single result value of one
//! submission: failures are recorded on it as data rather than returned as
//! errors.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Status of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl TaskStatus {
    /// Map a status string reported by the remote service.
    ///
    /// Matching is case-insensitive; anything unrecognized is `Unknown`.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted unit of remote work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier assigned by the remote service; empty if creation failed.
    pub task_id: String,
    pub status: TaskStatus,
    /// Free-form result text, populated on completion.
    pub result: Option<String>,
    pub error: Option<String>,
    /// Last raw payload observed from the remote service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
}

impl Task {
    /// A freshly submitted task that the remote service has acknowledged.
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            raw_response: None,
        }
    }

    /// A task that never obtained a remote handle.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            task_id: String::new(),
            status: TaskStatus::Failed,
            result: None,
            error: Some(error.into()),
            raw_response: None,
        }
    }

    /// Move to `next` unless the task already reached a terminal state.
    ///
    /// Returns `true` when the status changed.
    pub fn set_status(&mut self, next: TaskStatus) -> bool {
        if self.status.is_terminal() {
            if self.status != next {
                debug!(task_id = %self.task_id, current = %self.status, ignored = %next, "status is terminal");
            }
            return false;
        }
        let changed = self.status != next;
        self.status = next;
        changed
    }

    /// Finalize as failed with `error`, keeping any terminal status already set.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.set_status(TaskStatus::Failed);
        self.error = Some(error.into());
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}
