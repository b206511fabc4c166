//! Writing finished tasks to a file or stdout.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::core::types::{Task, TaskStatus};

/// Persisted shape of a task result.
#[derive(Debug, Serialize)]
struct SavedResult<'a> {
    task_id: &'a str,
    status: TaskStatus,
    result: Option<&'a str>,
    error: Option<&'a str>,
}

/// Write `task` as pretty JSON to `path`, or print it for humans when `None`.
pub fn save_result(task: &Task, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            write_json(path, &saved(task))?;
            info!(path = %path.display(), "saved task result");
        }
        None => print!("{}", render_result(task)),
    }
    Ok(())
}

/// Human-readable summary of `task`.
pub fn render_result(task: &Task) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Task ID: {}", task.task_id);
    let _ = writeln!(out, "Status: {}", task.status);
    if let Some(error) = &task.error {
        let _ = writeln!(out, "Error: {error}");
    }
    if let Some(result) = &task.result {
        let _ = writeln!(out, "\nResult:\n{}", result.trim_end());
    }
    out
}

fn saved(task: &Task) -> SavedResult<'_> {
    SavedResult {
        task_id: &task.task_id,
        status: task.status,
        result: task.result.as_deref(),
        error: task.error.as_deref(),
    }
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
