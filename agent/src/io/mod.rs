//! I/O helpers for agent commands.

pub mod config;
pub mod context;
pub mod github;
pub mod output;
pub mod prompt;
pub mod service;
