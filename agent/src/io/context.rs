//! Repository context for issue prompts: code snippets and error logs.
//!
//! A context file is JSON of the form
//!
//! ```json
//! {
//!   "files": { "src/auth.rs": { "content": "..." } },
//!   "error_logs": [ { "file": "app.log", "content": "ERROR: ..." } ]
//! }
//! ```
//!
//! Files are ranked by how many issue keywords they contain; only the best
//! few are rendered into the prompt.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MAX_SNIPPETS: usize = 5;
pub const MAX_ERROR_LOGS: usize = 5;
/// Characters kept per snippet or log before cutting with `[truncated]`.
pub const MAX_ENTRY_CHARS: usize = 4_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContextFile {
    #[serde(default)]
    pub files: BTreeMap<String, FileEntry>,
    #[serde(default)]
    pub error_logs: Vec<ContextEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    #[serde(default)]
    pub content: String,
}

/// A named block of text rendered into the prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub file: String,
    #[serde(default)]
    pub content: String,
}

/// Context selected for one issue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueContext {
    pub code_snippets: Vec<ContextEntry>,
    pub error_logs: Vec<ContextEntry>,
}

pub fn load_context_file(path: &Path) -> Result<ContextFile> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Pick the files mentioning the most `keywords`, plus the leading error logs.
///
/// Ties keep path order. Files matching no keyword are never selected.
pub fn select_context(file: &ContextFile, keywords: &[String]) -> IssueContext {
    let mut ranked: Vec<(usize, &String, &FileEntry)> = file
        .files
        .iter()
        .filter_map(|(path, entry)| {
            let content = entry.content.to_lowercase();
            let hits = keywords
                .iter()
                .filter(|keyword| content.contains(keyword.as_str()))
                .count();
            (hits > 0).then_some((hits, path, entry))
        })
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    debug!(matched = ranked.len(), keywords = keywords.len(), "ranked context files");

    let code_snippets = ranked
        .into_iter()
        .take(MAX_SNIPPETS)
        .map(|(_, path, entry)| ContextEntry {
            file: path.clone(),
            content: clip(&entry.content),
        })
        .collect();
    let error_logs = file
        .error_logs
        .iter()
        .take(MAX_ERROR_LOGS)
        .map(|log| ContextEntry {
            file: log.file.clone(),
            content: clip(&log.content),
        })
        .collect();

    IssueContext {
        code_snippets,
        error_logs,
    }
}

fn clip(content: &str) -> String {
    let trimmed = content.trim_end();
    if trimmed.chars().count() <= MAX_ENTRY_CHARS {
        return trimmed.to_string();
    }
    let mut clipped: String = trimmed.chars().take(MAX_ENTRY_CHARS).collect();
    clipped.push_str("\n[truncated]");
    clipped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_file(files: &[(&str, &str)]) -> ContextFile {
        ContextFile {
            files: files
                .iter()
                .map(|(path, content)| {
                    (
                        path.to_string(),
                        FileEntry {
                            content: content.to_string(),
                        },
                    )
                })
                .collect(),
            error_logs: Vec::new(),
        }
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn ranks_files_by_keyword_hits() {
        let file = context_file(&[
            ("a.rs", "fn login() {}"),
            ("b.rs", "fn authenticate_user() { login() }"),
            ("c.rs", "fn unrelated() {}"),
        ]);
        let ctx = select_context(&file, &keywords(&["login", "authenticate_user"]));
        let paths: Vec<&str> = ctx.code_snippets.iter().map(|s| s.file.as_str()).collect();
        assert_eq!(paths, vec!["b.rs", "a.rs"]);
    }

    #[test]
    fn matching_ignores_case() {
        let file = context_file(&[("a.rs", "struct AuthenticationError;")]);
        let ctx = select_context(&file, &keywords(&["authenticationerror"]));
        assert_eq!(ctx.code_snippets.len(), 1);
    }

    #[test]
    fn caps_snippets_and_logs() {
        let paths: Vec<String> = (0..8).map(|i| format!("f{i}.rs")).collect();
        let files: Vec<(&str, &str)> = paths.iter().map(|p| (p.as_str(), "login")).collect();
        let mut file = context_file(&files);
        file.error_logs = (0..8)
            .map(|i| ContextEntry {
                file: format!("log{i}"),
                content: "ERROR".to_string(),
            })
            .collect();

        let ctx = select_context(&file, &keywords(&["login"]));
        assert_eq!(ctx.code_snippets.len(), MAX_SNIPPETS);
        assert_eq!(ctx.error_logs.len(), MAX_ERROR_LOGS);
        assert_eq!(ctx.code_snippets[0].file, "f0.rs");
    }

    #[test]
    fn long_content_is_clipped() {
        let long = "login ".repeat(2_000);
        let file = context_file(&[("big.rs", &long)]);
        let ctx = select_context(&file, &keywords(&["login"]));
        let content = &ctx.code_snippets[0].content;
        assert!(content.ends_with("[truncated]"));
        assert_eq!(
            content.chars().count(),
            MAX_ENTRY_CHARS + "\n[truncated]".chars().count()
        );
    }

    #[test]
    fn no_keywords_selects_no_code() {
        let file = context_file(&[("a.rs", "anything")]);
        assert!(select_context(&file, &[]).code_snippets.is_empty());
    }

    #[test]
    fn loads_context_file_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("context.json");
        fs::write(
            &path,
            r#"{"files": {"auth.py": {"content": "def authenticate_user(): pass"}},
                "error_logs": [{"file": "app.log", "content": "ERROR: Authentication failed"}]}"#,
        )
        .expect("write");
        let file = load_context_file(&path).expect("load");
        assert_eq!(file.files.len(), 1);
        assert_eq!(file.error_logs[0].file, "app.log");
    }

    #[test]
    fn malformed_context_file_names_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("context.json");
        fs::write(&path, "{not json").expect("write");
        let err = load_context_file(&path).expect_err("malformed");
        assert!(format!("{err:#}").contains("context.json"));
    }
}
