//! Prompt builders for review, issue and templated tasks.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use minijinja::{Environment, UndefinedBehavior, context};
use serde::Serialize;
use tracing::debug;

use crate::io::context::IssueContext;
use crate::io::github::{Issue, RepoRef};
use crate::issue::IssueTaskType;
use crate::review::ReviewContext;

const REVIEW_TEMPLATE: &str = include_str!("prompts/review.md");
const ISSUE_TEMPLATE: &str = include_str!("prompts/issue.md");

const TRUNCATED_MARKER: &str = "\n[truncated]";

/// A named user-facing prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    pub name: &'static str,
    pub placeholders: &'static [&'static str],
    #[serde(skip)]
    source: &'static str,
}

const TEMPLATES: &[TemplateInfo] = &[
    TemplateInfo {
        name: "code_explanation",
        placeholders: &["code"],
        source: "Explain the following code in detail:\n\
                 ```\n{{ code }}\n```\n\
                 Focus on:\n\
                 - What the code does\n\
                 - Key functions and their purpose\n\
                 - Any potential issues or improvements",
    },
    TemplateInfo {
        name: "bug_fix",
        placeholders: &["code", "error"],
        source: "Fix the following bug in my code:\n\
                 ```\n{{ code }}\n```\n\
                 Error message:\n\
                 ```\n{{ error }}\n```\n\
                 Please provide a working solution with an explanation of what was wrong.",
    },
    TemplateInfo {
        name: "feature_implementation",
        placeholders: &["description", "context"],
        source: "Implement the following feature:\n\
                 Feature description: {{ description }}\n\n\
                 Context (existing code if applicable):\n\
                 ```\n{{ context }}\n```\n\
                 Please provide a complete implementation with explanations.",
    },
    TemplateInfo {
        name: "code_review",
        placeholders: &["code"],
        source: "Review the following code and provide feedback:\n\
                 ```\n{{ code }}\n```\n\
                 Focus on:\n\
                 - Code quality and best practices\n\
                 - Potential bugs or edge cases\n\
                 - Performance considerations\n\
                 - Security issues",
    },
    TemplateInfo {
        name: "refactoring",
        placeholders: &["code"],
        source: "Refactor the following code to improve its quality:\n\
                 ```\n{{ code }}\n```\n\
                 Focus on:\n\
                 - Improving readability and maintainability\n\
                 - Reducing complexity\n\
                 - Applying design patterns where appropriate\n\
                 - Maintaining the same functionality",
    },
    TemplateInfo {
        name: "custom",
        placeholders: &["prompt"],
        source: "{{ prompt }}",
    },
];

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_template("review", REVIEW_TEMPLATE)
            .expect("review template should be valid");
        env.add_template("issue", ISSUE_TEMPLATE)
            .expect("issue template should be valid");
        for info in TEMPLATES {
            env.add_template(info.name, info.source)
                .expect("user template should be valid");
        }
        Self { env }
    }

    fn render_review(&self, ctx: &ReviewContext, diff: &str) -> Result<String> {
        let template = self.env.get_template("review")?;
        let rendered = template.render(context! {
            repo => ctx.repo.to_string(),
            number => ctx.number,
            title => ctx.title.trim(),
            description => ctx.description.trim(),
            diff => diff.trim_end(),
            variant => ctx.variant.as_str(),
        })?;
        Ok(rendered)
    }
}

/// Compose the review prompt: header, variant checklist, response format.
///
/// When the prompt would exceed `budget` characters, the diff is cut short and
/// marked `[truncated]`. The header alone is never shortened.
pub fn build_review_prompt(ctx: &ReviewContext, budget: usize) -> Result<String> {
    let engine = PromptEngine::new();
    let rendered = engine.render_review(ctx, &ctx.diff)?;
    let total = rendered.chars().count();
    if total <= budget {
        return Ok(rendered);
    }

    let diff_chars = ctx.diff.trim_end().chars().count();
    let overflow = total - budget;
    let keep = diff_chars.saturating_sub(overflow + TRUNCATED_MARKER.chars().count());
    let mut diff: String = ctx.diff.chars().take(keep).collect();
    diff.push_str(TRUNCATED_MARKER);
    debug!(
        before_chars = diff_chars,
        after_chars = keep,
        budget,
        "truncated diff for prompt budget"
    );
    engine.render_review(ctx, &diff)
}

/// Compose the issue-solving prompt for `task_type`, with any selected
/// code snippets and error logs.
pub fn build_issue_prompt(
    repo: &RepoRef,
    issue: &Issue,
    task_type: IssueTaskType,
    extra: &IssueContext,
) -> Result<String> {
    let engine = PromptEngine::new();
    let template = engine.env.get_template("issue")?;
    let labels: Vec<&str> = issue.labels.iter().map(|label| label.name.as_str()).collect();
    let rendered = template.render(context! {
        repo => repo.to_string(),
        number => issue.number,
        title => issue.title.trim(),
        body => issue.body.as_deref().map(str::trim).unwrap_or_default(),
        labels => labels,
        task_type => task_type.as_str(),
        code_snippets => &extra.code_snippets,
        error_logs => &extra.error_logs,
    })?;
    Ok(rendered)
}

/// All named templates with their placeholders.
pub fn list_templates() -> &'static [TemplateInfo] {
    TEMPLATES
}

/// Render template `name` with `values`. Extra values are ignored.
pub fn fill_template(name: &str, values: &BTreeMap<String, String>) -> Result<String> {
    let info = TEMPLATES
        .iter()
        .find(|info| info.name == name)
        .ok_or_else(|| anyhow!("Unknown template: {name}"))?;

    let missing: Vec<&str> = info
        .placeholders
        .iter()
        .copied()
        .filter(|placeholder| !values.contains_key(*placeholder))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!(
            "Missing values for placeholders: {}",
            missing.join(", ")
        ));
    }

    let engine = PromptEngine::new();
    let rendered = engine.env.get_template(info.name)?.render(values)?;
    Ok(rendered)
}
