//! Watcher configuration stored in `watcher.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::backoff::BackoffPolicy;
use crate::core::identity::{BotIdentity, DEFAULT_BOT_LOGINS};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "watcher.toml";

/// Watcher configuration (TOML).
///
/// Missing fields default to the values used by the hosted Jules workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatcherConfig {
    /// Logins whose comments are treated as Jules output.
    pub bot_logins: Vec<String>,

    pub retry: RetryConfig,

    pub gh: GhConfig,

    /// GitHub App installation id -> `GH_CONFIG_DIR` holding that installation's credentials.
    pub installations: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay after the first failed attempt.
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each further failure.
    pub backoff_factor: f64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GhConfig {
    /// Program used to reach the GitHub API.
    pub program: String,
    /// Wall-clock budget for one comment listing.
    pub timeout_secs: u64,
    /// Cap on buffered stdout/stderr per call.
    pub output_limit_bytes: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            bot_logins: DEFAULT_BOT_LOGINS.iter().map(|s| s.to_string()).collect(),
            retry: RetryConfig::default(),
            gh: GhConfig::default(),
            installations: BTreeMap::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            backoff_factor: 2.0,
            max_delay_ms: 60_000,
        }
    }
}

impl Default for GhConfig {
    fn default() -> Self {
        Self {
            program: "gh".to_string(),
            timeout_secs: 30,
            output_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bot_logins.is_empty() || self.bot_logins.iter().any(|l| l.trim().is_empty()) {
            return Err(anyhow!("bot_logins must be a non-empty array of logins"));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(anyhow!("retry.backoff_factor must be a finite number >= 1"));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(anyhow!("retry.max_delay_ms must be >= retry.initial_delay_ms"));
        }
        if self.gh.program.trim().is_empty() {
            return Err(anyhow!("gh.program must be non-empty"));
        }
        if self.gh.timeout_secs == 0 {
            return Err(anyhow!("gh.timeout_secs must be > 0"));
        }
        if self.gh.output_limit_bytes == 0 {
            return Err(anyhow!("gh.output_limit_bytes must be > 0"));
        }
        for key in self.installations.keys() {
            key.parse::<u64>()
                .with_context(|| format!("installations key {key:?} is not an installation id"))?;
        }
        Ok(())
    }

    pub fn bot_identity(&self) -> BotIdentity {
        BotIdentity::new(self.bot_logins.iter().cloned())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WatcherConfig::default()`.
pub fn load_config(path: &Path) -> Result<WatcherConfig> {
    if !path.exists() {
        let cfg = WatcherConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WatcherConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WatcherConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
