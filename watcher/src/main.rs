//! Jules comment watcher.
//!
//! Reads the comments Jules left on an issue and prints a JSON decision for
//! the calling workflow. The exit code mirrors the decision so shell steps
//! can branch without parsing JSON.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use watcher::check::{CheckRequest, CommentChecker, DEFAULT_MAX_RETRIES, DEFAULT_MIN_CONFIDENCE};
use watcher::core::analyzer::CommentAnalyzer;
use watcher::core::classifier::PatternAnalyzer;
use watcher::core::types::{Comment, CommentClassification, IssueRef};
use watcher::exit_codes;
use watcher::io::clock::SystemClock;
use watcher::io::comments::GhCommentSource;
use watcher::io::config::{DEFAULT_CONFIG_PATH, WatcherConfig, load_config, write_config};
use watcher::logging;

#[derive(Parser)]
#[command(
    name = "watcher",
    version,
    about = "Decide the next workflow action from Jules issue comments"
)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log more to stderr (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file if missing.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Decide the next action from the latest Jules comment on an issue.
    Check {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        /// Issue number.
        #[arg(long)]
        issue: u64,
        /// Attempts allowed before degrading to `no_action`.
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
        /// Minimum classifier confidence to act on a comment.
        #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE, value_parser = parse_confidence)]
        min_confidence: f64,
        /// GitHub App installation whose gh config to use.
        #[arg(long)]
        installation_id: Option<u64>,
    },
    /// Classify a single comment body (from `--body` or stdin).
    Classify {
        #[arg(long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap's own exit code (2) would collide with NO_ACTION.
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            err.print().context("print usage")?;
            return Ok(code);
        }
    };
    logging::init(cli.verbose);

    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Check {
            owner,
            repo,
            issue,
            max_retries,
            min_confidence,
            installation_id,
        } => {
            let request = CheckRequest {
                issue: IssueRef::new(owner, repo, issue),
                max_retries,
                min_confidence,
                installation_id,
            };
            cmd_check(&cli.config, &request).await
        }
        Command::Classify { body } => cmd_classify(body),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    if !force && config_path.exists() {
        info!(path = %config_path.display(), "config already exists");
        return Ok(exit_codes::OK);
    }
    write_config(config_path, &WatcherConfig::default())
        .with_context(|| format!("write {}", config_path.display()))?;
    println!("{}", config_path.display());
    Ok(exit_codes::OK)
}

async fn cmd_check(config_path: &Path, request: &CheckRequest) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let checker = CommentChecker::new(
        GhCommentSource::new(cfg.gh.clone(), cfg.installations.clone()),
        PatternAnalyzer,
        SystemClock,
        cfg.bot_identity(),
        cfg.backoff_policy(),
    );

    let decision = checker.check_comments(request).await;
    print_json(&decision)?;
    Ok(exit_code_for(decision.action))
}

fn cmd_classify(body: Option<String>) -> Result<i32> {
    let body = match body {
        Some(body) => body,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read comment body from stdin")?;
            buf
        }
    };
    if body.trim().is_empty() {
        bail!("comment body is empty");
    }

    let now = Utc::now();
    let comment = Comment {
        id: 0,
        author: None,
        created_at: now,
        body,
    };
    let analysis = PatternAnalyzer.analyze(&comment, now)?;
    print_json(&analysis)?;
    Ok(exit_codes::OK)
}

fn exit_code_for(action: CommentClassification) -> i32 {
    match action {
        CommentClassification::NoAction => exit_codes::NO_ACTION,
        CommentClassification::Unknown => exit_codes::UNKNOWN,
        _ => exit_codes::OK,
    }
}

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

fn parse_confidence(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|e| format!("invalid confidence {raw:?}: {e}"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(format!("confidence must be within 0.0..=1.0, got {value}"));
    }
    Ok(value)
}
