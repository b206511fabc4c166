//! Stable exit codes for agent CLI commands.

/// Command succeeded (or a task was submitted without waiting).
pub const OK: i32 = 0;
/// Invalid usage, configuration or missing credentials.
pub const INVALID: i32 = 1;
/// The task or review ended in failure.
pub const TASK_FAILED: i32 = 2;
