//! Shared deterministic types for comment decisions.
//!
//! These types are request-scoped: built at the start of one check and
//! discarded at its end. They carry no I/O handles.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue coordinates on the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl IssueRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u64) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// A single issue comment as fetched from the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    /// Login of the author. `None` when the account was deleted.
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub body: String,
}

impl Comment {
    /// Minutes elapsed between `created_at` and `now`. Negative under clock skew.
    pub fn minutes_since(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 60_000.0
    }
}

/// Classification label attached to a comment.
///
/// Decision logic treats this as an opaque tag and only compares values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentClassification {
    /// Jules acknowledged the task and is working on it.
    Working,
    /// Jules declined because its task quota is exhausted.
    TaskLimit,
    NoAction,
    Unknown,
}

/// Renders the serde wire name, so logs and JSON always agree.
impl fmt::Display for CommentClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(name)) => f.write_str(&name),
            _ => Err(fmt::Error),
        }
    }
}

/// Output of analyzing a single comment at a given evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAnalysis {
    pub classification: CommentClassification,
    /// Classifier certainty in `[0.0, 1.0]`.
    pub confidence: f64,
    pub patterns_matched: BTreeSet<String>,
    /// Age of the comment at evaluation time, never negative.
    pub age_minutes: f64,
}

/// The comment a decision was based on, paired with its analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub comment: Comment,
    pub analysis: CommentAnalysis,
}

/// The single artifact returned to the calling workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub action: CommentClassification,
    #[serde(flatten)]
    pub evidence: Option<Evidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
}

impl DecisionResult {
    /// Decision without any backing comment.
    pub fn bare(action: CommentClassification) -> Self {
        Self {
            action,
            evidence: None,
            retry_count: None,
        }
    }

    pub fn with_evidence(
        action: CommentClassification,
        comment: Comment,
        analysis: CommentAnalysis,
    ) -> Self {
        Self {
            action,
            evidence: Some(Evidence { comment, analysis }),
            retry_count: None,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn comment(&self) -> Option<&Comment> {
        self.evidence.as_ref().map(|evidence| &evidence.comment)
    }

    pub fn analysis(&self) -> Option<&CommentAnalysis> {
        self.evidence.as_ref().map(|evidence| &evidence.analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn comment() -> Comment {
        Comment {
            id: 7,
            author: Some("google-labs-jules[bot]".to_string()),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            body: "On it!".to_string(),
        }
    }

    #[test]
    fn bare_decision_serializes_action_only() {
        let json = serde_json::to_value(DecisionResult::bare(CommentClassification::NoAction))
            .expect("serialize");
        assert_eq!(json, serde_json::json!({ "action": "no_action" }));
    }

    #[test]
    fn evidence_is_flattened_next_to_action() {
        let analysis = CommentAnalysis {
            classification: CommentClassification::Working,
            confidence: 0.9,
            patterns_matched: BTreeSet::from(["on_it".to_string()]),
            age_minutes: 3.0,
        };
        let decision =
            DecisionResult::with_evidence(CommentClassification::Working, comment(), analysis)
                .with_retry_count(1);
        let json = serde_json::to_value(&decision).expect("serialize");

        assert_eq!(json["action"], "working");
        assert_eq!(json["comment"]["id"], 7);
        assert_eq!(json["analysis"]["classification"], "working");
        assert_eq!(json["retry_count"], 1);
    }

    #[test]
    fn minutes_since_uses_millisecond_precision() {
        let now = comment().created_at + chrono::Duration::seconds(90);
        assert_eq!(comment().minutes_since(now), 1.5);
    }

    #[test]
    fn classification_display_matches_wire_name() {
        for class in [
            CommentClassification::Working,
            CommentClassification::TaskLimit,
            CommentClassification::NoAction,
            CommentClassification::Unknown,
        ] {
            let wire = serde_json::to_value(class).expect("serialize");
            assert_eq!(wire, serde_json::Value::String(class.to_string()));
        }
        assert_eq!(CommentClassification::TaskLimit.to_string(), "task_limit");
    }

    #[test]
    fn issue_ref_displays_as_slug() {
        assert_eq!(IssueRef::new("acme", "widgets", 42).to_string(), "acme/widgets#42");
    }
}
