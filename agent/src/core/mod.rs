//! Deterministic, pure logic shared by the task runner.
//!
//! Core modules perform no network or filesystem I/O and never sleep. Time
//! enters only through `Instant` arguments (or thin `Instant::now()` wrappers),
//! so everything here is testable in isolation.

pub mod backoff;
pub mod breaker;
pub mod comments;
pub mod extract;
pub mod keywords;
pub mod types;
pub mod variant;
