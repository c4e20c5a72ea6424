//! Analyzer abstraction for single-comment classification.
//!
//! The [`CommentAnalyzer`] trait decouples decision policy from how comment
//! text is classified. [`PatternAnalyzer`](crate::core::classifier::PatternAnalyzer)
//! is the built-in implementation; tests use scripted analyzers.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::core::types::{Comment, CommentAnalysis};

/// Classifies one comment.
///
/// Implementations must be deterministic for a given comment and `now`, and
/// must compute `age_minutes` relative to `now`.
pub trait CommentAnalyzer {
    fn analyze(&self, comment: &Comment, now: DateTime<Utc>) -> Result<CommentAnalysis>;
}

/// Age of `comment` at `now`, clamped so future timestamps read as zero.
pub fn age_minutes(comment: &Comment, now: DateTime<Utc>) -> f64 {
    comment.minutes_since(now).max(0.0)
}
