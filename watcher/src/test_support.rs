//! Test-only helpers: deterministic comments, scripted collaborators, fixed clock.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::core::analyzer::CommentAnalyzer;
use crate::core::types::{Comment, CommentAnalysis, CommentClassification, IssueRef};
use crate::io::clock::Clock;
use crate::io::comments::CommentSource;

/// Fixed evaluation time shared by tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// A Jules comment posted `minutes_ago` minutes before [`t0`].
pub fn bot_comment(id: u64, minutes_ago: i64) -> Comment {
    comment_by(id, Some("google-labs-jules[bot]"), minutes_ago)
}

/// A human comment posted `minutes_ago` minutes before [`t0`].
pub fn human_comment(id: u64, minutes_ago: i64) -> Comment {
    comment_by(id, Some("octocat"), minutes_ago)
}

fn comment_by(id: u64, author: Option<&str>, minutes_ago: i64) -> Comment {
    Comment {
        id,
        author: author.map(str::to_string),
        created_at: t0() - Duration::minutes(minutes_ago),
        body: format!("comment {id}"),
    }
}

/// Build a scripted analysis keyed by comment id.
pub fn scripted(
    id: u64,
    classification: CommentClassification,
    confidence: f64,
    age_minutes: f64,
) -> (u64, CommentAnalysis) {
    (
        id,
        CommentAnalysis {
            classification,
            confidence,
            patterns_matched: BTreeSet::new(),
            age_minutes,
        },
    )
}

/// Analyzer returning predetermined analyses by comment id; unknown ids fail.
pub struct ScriptedAnalyzer {
    analyses: HashMap<u64, CommentAnalysis>,
    failing_calls: usize,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn new(analyses: Vec<(u64, CommentAnalysis)>) -> Self {
        Self {
            analyses: analyses.into_iter().collect(),
            failing_calls: 0,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail the first `calls` analyses regardless of comment id.
    pub fn failing_first(mut self, calls: usize) -> Self {
        self.failing_calls = calls;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CommentAnalyzer for ScriptedAnalyzer {
    fn analyze(&self, comment: &Comment, _now: DateTime<Utc>) -> Result<CommentAnalysis> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failing_calls {
            return Err(anyhow!("scripted analyzer failure on call {}", call + 1));
        }
        self.analyses
            .get(&comment.id)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted analysis for comment {}", comment.id))
    }
}

/// Comment source replaying one scripted response per call.
///
/// `Err` entries become upstream errors. Once the script runs out every call
/// fails.
pub struct ScriptedCommentSource {
    responses: Mutex<VecDeque<std::result::Result<Vec<Comment>, String>>>,
    calls: AtomicUsize,
}

impl ScriptedCommentSource {
    pub fn new(responses: Vec<std::result::Result<Vec<Comment>, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentSource for ScriptedCommentSource {
    async fn list_comments(
        &self,
        _issue: &IssueRef,
        _installation_id: Option<u64>,
    ) -> Result<Vec<Comment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow!("scripted responses poisoned"))?
            .pop_front();
        match next {
            Some(Ok(comments)) => Ok(comments),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response left")),
        }
    }
}

/// Clock frozen at a single instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
