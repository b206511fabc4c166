//! Task lifecycle: validate, submit with retries, then poll to completion.
//!
//! [`TaskExecutor`] owns one [`CircuitBreaker`] and drives a single remote
//! task per call. Every outcome, including rejection before submission and
//! polling timeout, is returned as a [`Task`] rather than an error.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, warn};

use crate::core::backoff::BackoffPolicy;
use crate::core::breaker::CircuitBreaker;
use crate::core::types::{Task, TaskStatus};
use crate::io::config::AgentConfig;
use crate::io::service::{AgentService, RemoteTask};

pub const EMPTY_PROMPT_ERROR: &str = "Prompt cannot be empty";
pub const SERVICE_UNAVAILABLE_ERROR: &str = "Service unavailable: circuit breaker is open";
pub const NO_TASK_ERROR: &str = "Failed to create task";
pub const CANCELLED_ERROR: &str = "Task was cancelled";
const UNKNOWN_ERROR: &str = "Unknown error";

/// Tunables for one executor.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Submission attempts, including the first.
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    /// Randomize retry delays.
    pub jitter: bool,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub max_prompt_chars: usize,
    pub breaker_threshold: u32,
    pub breaker_recovery: Duration,
}

impl ExecutorSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: BackoffPolicy::new(config.retry_delay()),
            jitter: true,
            poll_interval: config.poll_interval(),
            poll_timeout: config.poll_timeout(),
            max_prompt_chars: config.max_prompt_chars,
            breaker_threshold: config.breaker_threshold,
            breaker_recovery: config.breaker_recovery(),
        }
    }
}

pub struct TaskExecutor<S> {
    service: S,
    settings: ExecutorSettings,
    breaker: CircuitBreaker,
}

impl<S: AgentService> TaskExecutor<S> {
    pub fn new(service: S, config: &AgentConfig) -> Self {
        Self::with_settings(service, ExecutorSettings::from_config(config))
    }

    pub fn with_settings(service: S, settings: ExecutorSettings) -> Self {
        let breaker = CircuitBreaker::new(settings.breaker_threshold, settings.breaker_recovery);
        Self {
            service,
            settings,
            breaker,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Run `prompt` and, when `wait` is set, poll until it finishes.
    pub fn run_task(&mut self, prompt: &str, wait: bool) -> Task {
        self.run_task_with(prompt, wait, |_| {})
    }

    /// Like [`run_task`](Self::run_task), calling `on_update` with each
    /// observed state: once after submission when not waiting, otherwise
    /// after every successful poll.
    #[instrument(skip_all, fields(prompt_chars = prompt.chars().count(), wait = wait))]
    pub fn run_task_with<F>(&mut self, prompt: &str, wait: bool, mut on_update: F) -> Task
    where
        F: FnMut(&Task),
    {
        info!("starting task");

        if let Err(message) = self.validate_prompt(prompt) {
            warn!(error = %message, "prompt rejected");
            return Task::rejected(message);
        }

        if !self.breaker.allow_request() {
            warn!(
                failures = self.breaker.failure_count(),
                "circuit breaker open, not submitting"
            );
            return Task::rejected(SERVICE_UNAVAILABLE_ERROR);
        }

        let remote = match self.submit_with_retries(prompt) {
            Ok(remote) => remote,
            Err(task) => return task,
        };

        info!(task_id = %remote.id, "task created");
        let mut task = Task::pending(remote.id.clone());
        task.raw_response = remote.raw.clone();

        if !wait {
            on_update(&task);
            return task;
        }

        self.poll(remote, task, &mut on_update)
    }

    fn validate_prompt(&self, prompt: &str) -> Result<(), String> {
        if prompt.trim().is_empty() {
            return Err(EMPTY_PROMPT_ERROR.to_string());
        }
        let chars = prompt.chars().count();
        if chars > self.settings.max_prompt_chars {
            return Err(format!(
                "Prompt exceeds maximum length of {} characters ({chars} given)",
                self.settings.max_prompt_chars
            ));
        }
        Ok(())
    }

    /// Submit, retrying with backoff. The breaker sees one failure per
    /// exhausted submission, not one per attempt.
    fn submit_with_retries(&mut self, prompt: &str) -> Result<RemoteTask, Task> {
        let attempts = self.settings.max_retries;
        for attempt in 0..attempts {
            match self.service.submit(prompt) {
                Ok(remote) => {
                    self.breaker.record_success();
                    return Ok(remote);
                }
                Err(err) if attempt + 1 < attempts => {
                    let delay = self.settings.backoff.delay(attempt, self.settings.jitter);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %format!("{err:#}"),
                        "submission failed, retrying"
                    );
                    thread::sleep(delay);
                }
                Err(err) => {
                    error!(
                        attempts,
                        error = %format!("{err:#}"),
                        "submission failed after all attempts"
                    );
                    self.breaker.record_failure();
                    return Err(Task::rejected(format!("{err:#}")));
                }
            }
        }

        self.breaker.record_failure();
        Err(Task::rejected(NO_TASK_ERROR))
    }

    fn poll<F>(&mut self, mut remote: RemoteTask, mut task: Task, on_update: &mut F) -> Task
    where
        F: FnMut(&Task),
    {
        let timeout = self.settings.poll_timeout;
        let started = Instant::now();

        while started.elapsed() < timeout {
            match self.service.refresh(&mut remote) {
                Ok(()) => {
                    let status = TaskStatus::from_remote(&remote.status);
                    task.set_status(status);
                    task.raw_response = remote.raw.clone();
                    match status {
                        TaskStatus::Completed => {
                            task.result = remote.result.clone();
                            on_update(&task);
                            info!(task_id = %task.task_id, "task completed");
                            return task;
                        }
                        TaskStatus::Failed => {
                            task.error =
                                Some(remote.error.clone().unwrap_or_else(|| UNKNOWN_ERROR.to_string()));
                            on_update(&task);
                            error!(task_id = %task.task_id, error = ?task.error, "task failed");
                            return task;
                        }
                        TaskStatus::Cancelled => {
                            task.error = Some(CANCELLED_ERROR.to_string());
                            on_update(&task);
                            warn!(task_id = %task.task_id, "task cancelled");
                            return task;
                        }
                        _ => {
                            on_update(&task);
                            info!(task_id = %task.task_id, status = %status, "task in progress");
                        }
                    }
                }
                Err(err) => {
                    warn!(task_id = %task.task_id, error = %format!("{err:#}"), "error checking task status");
                }
            }

            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }
            let pause = self.settings.poll_interval.min(remaining);
            debug!(pause_ms = pause.as_millis() as u64, "waiting before next poll");
            thread::sleep(pause);
        }

        let message = format!("Task timed out after {} seconds", timeout.as_secs_f64());
        error!(task_id = %task.task_id, "{message}");
        task.fail(message);
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::breaker::BreakerMode;
    use crate::test_support::{ScriptedService, fast_settings};

    #[test]
    fn empty_prompt_is_never_submitted() {
        let mut executor = TaskExecutor::with_settings(ScriptedService::new(), fast_settings());
        for prompt in ["", "   "] {
            let task = executor.run_task(prompt, true);
            assert_eq!(task.status, TaskStatus::Failed);
            assert_eq!(task.error.as_deref(), Some(EMPTY_PROMPT_ERROR));
            assert_eq!(task.task_id, "");
        }
        assert_eq!(executor.service().submit_calls(), 0);
        assert_eq!(executor.breaker().failure_count(), 0);
    }

    #[test]
    fn oversized_prompt_is_rejected() {
        let settings = ExecutorSettings {
            max_prompt_chars: 4,
            ..fast_settings()
        };
        let mut executor = TaskExecutor::with_settings(ScriptedService::new(), settings);
        let task = executor.run_task("hello", false);
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.as_deref().unwrap_or_default().contains("maximum length of 4"));
        assert_eq!(executor.service().submit_calls(), 0);
    }

    #[test]
    fn no_wait_returns_pending_and_notifies_once() {
        let service = ScriptedService::new().accept("t-1");
        let mut executor = TaskExecutor::with_settings(service, fast_settings());
        let mut updates = Vec::new();
        let task = executor.run_task_with("do it", false, |task| updates.push(task.clone()));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.task_id, "t-1");
        assert_eq!(updates.len(), 1);
        assert_eq!(executor.service().refresh_calls(), 0);
    }

    #[test]
    fn zero_attempts_fails_without_handle() {
        let settings = ExecutorSettings {
            max_retries: 0,
            ..fast_settings()
        };
        let mut executor = TaskExecutor::with_settings(ScriptedService::new(), settings);
        let task = executor.run_task("do it", true);
        assert_eq!(task.error.as_deref(), Some(NO_TASK_ERROR));
        assert_eq!(executor.breaker().failure_count(), 1);
    }

    #[test]
    fn retries_then_succeeds() {
        let service = ScriptedService::new()
            .reject("boom 1")
            .reject("boom 2")
            .accept("t-2")
            .status("completed", Some("done"), None);
        let mut executor = TaskExecutor::with_settings(service, fast_settings());
        let task = executor.run_task("do it", true);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("done"));
        assert_eq!(executor.service().submit_calls(), 3);
        assert_eq!(executor.breaker().failure_count(), 0);
    }

    #[test]
    fn exhausted_retries_record_one_breaker_failure() {
        let service = ScriptedService::new()
            .reject("a")
            .reject("b")
            .reject("final error");
        let mut executor = TaskExecutor::with_settings(service, fast_settings());
        let task = executor.run_task("do it", true);
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("final error"));
        assert_eq!(executor.breaker().failure_count(), 1);
        assert_eq!(executor.breaker().mode(), BreakerMode::Closed);
    }

    #[test]
    fn remote_failure_without_message_is_unknown_error() {
        let service = ScriptedService::new()
            .accept("t-3")
            .status("FAILED", None, None);
        let mut executor = TaskExecutor::with_settings(service, fast_settings());
        let task = executor.run_task("do it", true);
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("Unknown error"));
    }

    #[test]
    fn cancelled_is_terminal() {
        let service = ScriptedService::new()
            .accept("t-4")
            .status("running", None, None)
            .status("cancelled", None, None);
        let mut executor = TaskExecutor::with_settings(service, fast_settings());
        let mut seen = Vec::new();
        let task = executor.run_task_with("do it", true, |task| seen.push(task.status));
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.error.as_deref(), Some(CANCELLED_ERROR));
        assert_eq!(seen, vec![TaskStatus::Running, TaskStatus::Cancelled]);
    }

    #[test]
    fn refresh_errors_do_not_end_polling() {
        let service = ScriptedService::new()
            .accept("t-5")
            .refresh_error("network down")
            .status("completed", Some("ok"), None);
        let mut executor = TaskExecutor::with_settings(service, fast_settings());
        let task = executor.run_task("do it", true);
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(executor.service().refresh_calls(), 2);
    }
}
