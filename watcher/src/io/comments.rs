//! Comment source abstraction and the `gh api` backed implementation.
//!
//! The [`CommentSource`] trait decouples decisions from the tracker
//! transport. [`GhCommentSource`] shells out to the GitHub CLI, routing
//! credentials per installation via `GH_CONFIG_DIR`. Tests use scripted
//! sources that return predetermined comment lists.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::core::types::{Comment, IssueRef};
use crate::io::config::GhConfig;
use crate::io::process::run_command_with_timeout;

/// Lists every comment on an issue.
#[async_trait]
pub trait CommentSource {
    async fn list_comments(
        &self,
        issue: &IssueRef,
        installation_id: Option<u64>,
    ) -> Result<Vec<Comment>>;
}

/// Comment source that runs `gh api --paginate`.
#[derive(Debug, Clone)]
pub struct GhCommentSource {
    gh: GhConfig,
    installations: BTreeMap<String, PathBuf>,
}

impl GhCommentSource {
    pub fn new(gh: GhConfig, installations: BTreeMap<String, PathBuf>) -> Self {
        Self { gh, installations }
    }

    /// `GH_CONFIG_DIR` for an installation, if one is configured.
    fn config_dir(&self, installation_id: Option<u64>) -> Option<&PathBuf> {
        let id = installation_id?;
        let dir = self.installations.get(&id.to_string());
        if dir.is_none() {
            warn!(
                installation_id = id,
                "no gh config for installation, using ambient credentials"
            );
        }
        dir
    }
}

#[async_trait]
impl CommentSource for GhCommentSource {
    #[instrument(skip_all, fields(issue = %issue, installation_id = ?installation_id))]
    async fn list_comments(
        &self,
        issue: &IssueRef,
        installation_id: Option<u64>,
    ) -> Result<Vec<Comment>> {
        let endpoint = format!(
            "repos/{}/{}/issues/{}/comments?per_page=100",
            issue.owner, issue.repo, issue.number
        );
        let mut cmd = Command::new(&self.gh.program);
        cmd.arg("api")
            .arg("--paginate")
            .arg("-H")
            .arg("Accept: application/vnd.github+json")
            .arg(&endpoint);
        if let Some(dir) = self.config_dir(installation_id) {
            cmd.env("GH_CONFIG_DIR", dir);
        }

        let timeout = Duration::from_secs(self.gh.timeout_secs);
        let output = run_command_with_timeout(cmd, timeout, self.gh.output_limit_bytes)
            .await
            .with_context(|| format!("run {} api {endpoint}", self.gh.program))?;

        if output.timed_out {
            return Err(anyhow!("gh api timed out after {timeout:?}"));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "gh api failed with status {:?}: {}",
                output.status.code(),
                output.stderr_excerpt()
            ));
        }
        if output.stdout_truncated > 0 {
            return Err(anyhow!(
                "gh api output exceeded {} bytes",
                self.gh.output_limit_bytes
            ));
        }

        let comments = parse_comment_pages(&output.stdout)?;
        debug!(count = comments.len(), "fetched comments");
        Ok(comments)
    }
}

/// JSON shape of one issue comment from the REST API.
#[derive(Deserialize)]
struct GhComment {
    id: u64,
    user: Option<GhActor>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Deserialize)]
struct GhActor {
    login: String,
}

impl From<GhComment> for Comment {
    fn from(raw: GhComment) -> Self {
        Comment {
            id: raw.id,
            author: raw.user.map(|u| u.login),
            created_at: raw.created_at,
            body: raw.body.unwrap_or_default(),
        }
    }
}

/// Decode `gh api --paginate` output: one JSON array per page, back to back.
pub fn parse_comment_pages(raw: &[u8]) -> Result<Vec<Comment>> {
    let mut comments = Vec::new();
    for (index, page) in serde_json::Deserializer::from_slice(raw)
        .into_iter::<Vec<GhComment>>()
        .enumerate()
    {
        let page = page.with_context(|| format!("parse comment page {}", index + 1))?;
        comments.extend(page.into_iter().map(Comment::from));
    }
    Ok(comments)
}
