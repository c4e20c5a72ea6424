//! Decision policy over the bot's latest comments.
//!
//! Given the full comment list of an issue, select the newest bot comment and
//! apply staleness and confidence rules. Staleness is checked before
//! confidence: an old comment never triggers an action, however certain.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::core::analyzer::CommentAnalyzer;
use crate::core::identity::BotIdentity;
use crate::core::types::{Comment, CommentClassification, DecisionResult};

/// Comments older than this are not actionable.
pub const STALE_AFTER_MINUTES: f64 = 120.0;

/// Only comments younger than this are considered for the low-confidence fallback.
pub const RECENT_WITHIN_MINUTES: f64 = 30.0;

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionBasis {
    /// No bot-authored comments on the issue.
    NoBotComments,
    /// Latest bot comment exceeded [`STALE_AFTER_MINUTES`].
    Stale,
    /// Latest bot comment met the confidence threshold.
    Confident,
    /// Latest comment was uncertain; the second recent comment was confident.
    SecondRecent,
    /// Latest comment was uncertain and no recent comment rescued it.
    Uncertain,
}

/// A decision together with the rule that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub decision: DecisionResult,
    pub basis: DecisionBasis,
}

impl Resolution {
    fn new(decision: DecisionResult, basis: DecisionBasis) -> Self {
        Self { decision, basis }
    }
}

/// Bot-authored comments, newest first.
///
/// The sort is stable, so comments sharing a timestamp keep their input order.
pub fn bot_comments_newest_first<'a>(comments: &'a [Comment], bot: &BotIdentity) -> Vec<&'a Comment> {
    let mut selected: Vec<&Comment> = comments
        .iter()
        .filter(|comment| bot.is_bot(comment.author.as_deref()))
        .collect();
    selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    selected
}

/// Decide the next action from an issue's comments at evaluation time `now`.
///
/// Errors only when the analyzer fails; empty, stale and uncertain inputs are
/// ordinary outcomes.
pub fn decide<A: CommentAnalyzer>(
    comments: &[Comment],
    bot: &BotIdentity,
    analyzer: &A,
    min_confidence: f64,
    now: DateTime<Utc>,
) -> Result<Resolution> {
    let candidates = bot_comments_newest_first(comments, bot);
    let Some(&latest) = candidates.first() else {
        return Ok(Resolution::new(
            DecisionResult::bare(CommentClassification::NoAction),
            DecisionBasis::NoBotComments,
        ));
    };

    let analysis = analyzer
        .analyze(latest, now)
        .with_context(|| format!("analyze comment {}", latest.id))?;

    if analysis.age_minutes > STALE_AFTER_MINUTES {
        return Ok(Resolution::new(
            DecisionResult::with_evidence(
                CommentClassification::NoAction,
                latest.clone(),
                analysis,
            ),
            DecisionBasis::Stale,
        ));
    }

    if analysis.confidence >= min_confidence {
        return Ok(Resolution::new(
            DecisionResult::with_evidence(analysis.classification, latest.clone(), analysis),
            DecisionBasis::Confident,
        ));
    }

    // Index into the recent subset, not the full list.
    let recent: Vec<&Comment> = candidates
        .iter()
        .copied()
        .filter(|comment| comment.minutes_since(now) < RECENT_WITHIN_MINUTES)
        .collect();

    if let Some(&second) = recent.get(1) {
        let second_analysis = analyzer
            .analyze(second, now)
            .with_context(|| format!("analyze comment {}", second.id))?;
        if second_analysis.confidence >= min_confidence {
            return Ok(Resolution::new(
                DecisionResult::with_evidence(
                    second_analysis.classification,
                    second.clone(),
                    second_analysis,
                ),
                DecisionBasis::SecondRecent,
            ));
        }
    }

    Ok(Resolution::new(
        DecisionResult::with_evidence(CommentClassification::Unknown, latest.clone(), analysis),
        DecisionBasis::Uncertain,
    ))
}
