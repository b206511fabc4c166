//! Agent task runner CLI.
//!
//! Submits prompts, issues and pull request reviews to the remote agent
//! service. Configuration comes from `agent.toml`, the environment and
//! credential flags, in increasing precedence.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use agent::core::types::Task;
use agent::executor::TaskExecutor;
use agent::exit_codes;
use agent::interpret::parse_structured;
use agent::io::config::{AgentConfig, DEFAULT_CONFIG_FILE, resolve_config};
use agent::io::context::load_context_file;
use agent::io::github::{GitHubClient, RepoRef};
use agent::io::output::{render_result, save_result};
use agent::io::prompt::{fill_template, list_templates};
use agent::io::service::CodegenService;
use agent::issue::{IssueRequest, IssueTaskType, solve_issue};
use agent::logging;
use agent::review::{ReviewRequest, run_review};
use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "agent",
    version,
    about = "Submit tasks to a remote coding agent and act on the results"
)]
struct Cli {
    /// Config file; a missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(flatten)]
    credentials: Credentials,
    #[command(subcommand)]
    command: Command,
}

/// Credential flags; override config file and environment.
#[derive(Args, Default)]
struct Credentials {
    #[arg(long, global = true)]
    codegen_token: Option<String>,
    #[arg(long, global = true)]
    codegen_org_id: Option<String>,
    #[arg(long, global = true)]
    github_token: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a prompt given inline, from a file, or from a named template.
    Prompt {
        #[command(flatten)]
        source: PromptSource,
        /// Template value as `name=value`; repeatable.
        #[arg(long = "var", value_parser = parse_var, conflicts_with_all = ["prompt", "file"])]
        vars: Vec<(String, String)>,
        /// Return right after submission instead of polling.
        #[arg(long)]
        no_wait: bool,
        /// Extract a JSON payload from the result.
        #[arg(long)]
        json: bool,
        /// Write the result to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List prompt templates and their placeholders.
    Templates,
    /// Hand a GitHub issue to the agent.
    Issue {
        /// Repository as owner/name; defaults to GITHUB_REPOSITORY.
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        number: u64,
        #[arg(long, value_enum, default_value_t)]
        task_type: IssueTaskType,
        /// Poll until the task finishes.
        #[arg(long)]
        wait: bool,
        /// JSON file of repository files and error logs to draw snippets from.
        #[arg(long)]
        context: Option<PathBuf>,
    },
    /// Review a pull request and post the findings as comments.
    Review {
        /// Repository as owner/name; defaults to GITHUB_REPOSITORY.
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        number: u64,
        /// Review command, e.g. `/review` or `/security-review`.
        #[arg(long, default_value = "/review")]
        command: String,
        #[arg(long)]
        no_wait: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PromptSource {
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long)]
    file: Option<PathBuf>,
    #[arg(long)]
    template: Option<String>,
}

fn main() {
    logging::init();
    let code = match Cli::try_parse() {
        Ok(cli) => run(cli).unwrap_or_else(|err| {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }),
        Err(err) => {
            let _ = err.print();
            if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            }
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    if let Command::Templates = cli.command {
        return cmd_templates();
    }

    let mut config = resolve_config(&cli.config)?;
    apply_credentials(&mut config, cli.credentials);

    match cli.command {
        Command::Prompt {
            source,
            vars,
            no_wait,
            json,
            output,
        } => {
            let prompt = read_prompt(&source, vars)?;
            cmd_prompt(&config, &prompt, !no_wait, json, output.as_deref())
        }
        Command::Templates => cmd_templates(),
        Command::Issue {
            repo,
            number,
            task_type,
            wait,
            context,
        } => cmd_issue(
            &config,
            repo.as_deref(),
            number,
            task_type,
            wait,
            context.as_deref(),
        ),
        Command::Review {
            repo,
            number,
            command,
            no_wait,
        } => cmd_review(&config, repo.as_deref(), number, command, !no_wait),
    }
}

fn cmd_prompt(
    config: &AgentConfig,
    prompt: &str,
    wait: bool,
    json: bool,
    output: Option<&Path>,
) -> Result<i32> {
    let service = CodegenService::from_config(config)?;
    let mut executor = TaskExecutor::new(service, config);
    let task = executor.run_task_with(prompt, wait, |task| {
        info!(task_id = %task.task_id, status = %task.status, "task update");
    });

    if json && task.is_completed() {
        let value = match parse_structured(&task) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("{err:#}");
                return Ok(exit_codes::TASK_FAILED);
            }
        };
        let mut payload = serde_json::to_string_pretty(&value).context("serialize json")?;
        payload.push('\n');
        match output {
            Some(path) => {
                fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
            }
            None => print!("{payload}"),
        }
    } else {
        save_result(&task, output)?;
    }
    Ok(task_exit_code(&task))
}

fn cmd_templates() -> Result<i32> {
    for info in list_templates() {
        println!("{}: {}", info.name, info.placeholders.join(", "));
    }
    Ok(exit_codes::OK)
}

fn cmd_issue(
    config: &AgentConfig,
    repo: Option<&str>,
    number: u64,
    task_type: IssueTaskType,
    wait: bool,
    context: Option<&Path>,
) -> Result<i32> {
    let repo = resolve_repo(repo, config)?;
    let context = context.map(load_context_file).transpose()?;
    let host = GitHubClient::from_config(config)?;
    let service = CodegenService::from_config(config)?;
    let mut executor = TaskExecutor::new(service, config);

    let request = IssueRequest {
        repo,
        number,
        task_type,
        wait,
        context,
    };
    let outcome = solve_issue(&mut executor, &host, &request, &config.codegen_web_url)?;
    print!("{}", render_result(&outcome.task));
    if let Some(url) = &outcome.tracking_url {
        println!("Tracking URL: {url}");
    }
    Ok(task_exit_code(&outcome.task))
}

fn cmd_review(
    config: &AgentConfig,
    repo: Option<&str>,
    number: u64,
    command: String,
    wait: bool,
) -> Result<i32> {
    let repo = resolve_repo(repo, config)?;
    let host = GitHubClient::from_config(config)?;
    let service = CodegenService::from_config(config)?;
    let mut executor = TaskExecutor::new(service, config);

    let request = ReviewRequest {
        repo,
        number,
        command,
        wait,
        comment_delay: config.comment_delay(),
    };
    let outcome = run_review(&mut executor, &host, &request);
    let payload = serde_json::to_string_pretty(&outcome).context("serialize review outcome")?;
    println!("{payload}");
    Ok(if outcome.is_error() {
        exit_codes::TASK_FAILED
    } else {
        exit_codes::OK
    })
}

fn apply_credentials(config: &mut AgentConfig, credentials: Credentials) {
    if let Some(token) = credentials.codegen_token {
        config.codegen_token = token;
    }
    if let Some(org_id) = credentials.codegen_org_id {
        config.codegen_org_id = org_id;
    }
    if let Some(token) = credentials.github_token {
        config.github_token = token;
    }
}

fn read_prompt(source: &PromptSource, vars: Vec<(String, String)>) -> Result<String> {
    if !vars.is_empty() && source.template.is_none() {
        return Err(anyhow!("--var requires --template"));
    }
    if let Some(prompt) = &source.prompt {
        return Ok(prompt.clone());
    }
    if let Some(path) = &source.file {
        return fs::read_to_string(path).with_context(|| format!("read {}", path.display()));
    }
    if let Some(name) = &source.template {
        let values: BTreeMap<String, String> = vars.into_iter().collect();
        return fill_template(name, &values);
    }
    Err(anyhow!("one of --prompt, --file or --template is required"))
}

fn resolve_repo(flag: Option<&str>, config: &AgentConfig) -> Result<RepoRef> {
    let raw = flag.unwrap_or(&config.repo_name);
    if raw.trim().is_empty() {
        return Err(anyhow!(
            "repository is required (pass --repo or set GITHUB_REPOSITORY)"
        ));
    }
    raw.parse()
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, value)| (name.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))
}

fn task_exit_code(task: &Task) -> i32 {
    if task.status.is_terminal() && !task.is_completed() {
        exit_codes::TASK_FAILED
    } else {
        exit_codes::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent::core::types::TaskStatus;

    #[test]
    fn parse_prompt_inline() {
        let cli = Cli::parse_from(["agent", "prompt", "--prompt", "hello", "--no-wait"]);
        match cli.command {
            Command::Prompt {
                source, no_wait, ..
            } => {
                assert_eq!(source.prompt.as_deref(), Some("hello"));
                assert!(no_wait);
            }
            _ => panic!("expected prompt command"),
        }
    }

    #[test]
    fn prompt_sources_are_exclusive() {
        let err = Cli::try_parse_from(["agent", "prompt", "--prompt", "a", "--file", "b.txt"]);
        assert!(err.is_err());
        assert!(Cli::try_parse_from(["agent", "prompt"]).is_err());
    }

    #[test]
    fn template_vars_require_template() {
        assert!(Cli::try_parse_from(["agent", "prompt", "--prompt", "a", "--var", "x=1"]).is_err());
        let from_file = Cli::try_parse_from(["agent", "prompt", "--file", "a.md", "--var", "x=1"]);
        assert!(from_file.is_err());
        let cli = Cli::parse_from([
            "agent",
            "prompt",
            "--template",
            "bug_fix",
            "--var",
            "code=let x;",
            "--var",
            "error=E0282",
        ]);
        match cli.command {
            Command::Prompt { source, vars, .. } => {
                let prompt = read_prompt(&source, vars).expect("prompt");
                assert!(prompt.contains("E0282"));
            }
            _ => panic!("expected prompt command"),
        }
    }

    #[test]
    fn read_prompt_rejects_vars_without_template() {
        let source = PromptSource {
            prompt: Some("hello".to_string()),
            file: None,
            template: None,
        };
        let err = read_prompt(&source, vec![("x".to_string(), "1".to_string())])
            .expect_err("vars without template");
        assert_eq!(err.to_string(), "--var requires --template");
        assert_eq!(read_prompt(&source, Vec::new()).expect("prompt"), "hello");
    }

    #[test]
    fn parse_review_defaults() {
        let cli = Cli::parse_from(["agent", "review", "--number", "7"]);
        match cli.command {
            Command::Review {
                repo,
                number,
                command,
                no_wait,
            } => {
                assert_eq!(repo, None);
                assert_eq!(number, 7);
                assert_eq!(command, "/review");
                assert!(!no_wait);
            }
            _ => panic!("expected review command"),
        }
    }

    #[test]
    fn parse_issue_task_type() {
        let cli = Cli::parse_from([
            "agent",
            "issue",
            "--repo",
            "octo/widgets",
            "--number",
            "3",
            "--task-type",
            "code_review",
        ]);
        assert!(matches!(
            cli.command,
            Command::Issue {
                task_type: IssueTaskType::CodeReview,
                wait: false,
                context: None,
                ..
            }
        ));
    }

    #[test]
    fn parse_issue_context_file() {
        let cli = Cli::parse_from(["agent", "issue", "--number", "3", "--context", "ctx.json"]);
        match cli.command {
            Command::Issue { context, .. } => {
                assert_eq!(context, Some(PathBuf::from("ctx.json")));
            }
            _ => panic!("expected issue command"),
        }
    }

    #[test]
    fn credential_flags_override_config() {
        let mut config = AgentConfig {
            codegen_token: "from_env".to_string(),
            ..AgentConfig::default()
        };
        apply_credentials(
            &mut config,
            Credentials {
                codegen_token: Some("from_flag".to_string()),
                ..Credentials::default()
            },
        );
        assert_eq!(config.codegen_token, "from_flag");
        assert_eq!(config.codegen_org_id, "");
    }

    #[test]
    fn repo_falls_back_to_config() {
        let config = AgentConfig {
            repo_name: "octo/widgets".to_string(),
            ..AgentConfig::default()
        };
        assert_eq!(
            resolve_repo(None, &config).expect("repo"),
            RepoRef::new("octo", "widgets")
        );
        assert!(resolve_repo(None, &AgentConfig::default()).is_err());
    }

    #[test]
    fn var_parser_keeps_equals_in_value() {
        assert_eq!(
            parse_var("code=a = b").expect("var"),
            ("code".to_string(), "a = b".to_string())
        );
        assert!(parse_var("novalue").is_err());
    }

    #[test]
    fn exit_code_reflects_terminal_failure() {
        assert_eq!(task_exit_code(&Task::pending("t")), exit_codes::OK);
        assert_eq!(task_exit_code(&Task::rejected("x")), exit_codes::TASK_FAILED);
        let mut done = Task::pending("t");
        done.set_status(TaskStatus::Completed);
        assert_eq!(task_exit_code(&done), exit_codes::OK);
    }
}
