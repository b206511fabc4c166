//! Resilient client for a remote asynchronous agent service.
//!
//! Tasks are submitted with bounded retries behind a circuit breaker, polled
//! to completion under a wall-clock deadline, and their free-form results are
//! interpreted as JSON or as review comments. The crate is split as:
//!
//! - **[`core`]**: Pure, deterministic logic (breaker, backoff, extraction,
//!   issue keywords, status and variant mapping). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (HTTP clients, config, prompt
//!   rendering, result files). Remote backends sit behind traits so tests can
//!   script them.
//!
//! Orchestration modules ([`executor`], [`interpret`], [`review`], [`issue`])
//! combine the two to implement CLI commands.

pub mod core;
pub mod executor;
pub mod exit_codes;
pub mod interpret;
pub mod io;
pub mod issue;
pub mod logging;
pub mod review;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
