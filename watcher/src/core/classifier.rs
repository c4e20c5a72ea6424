//! Deterministic pattern-based classification of Jules comments.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::core::analyzer::{CommentAnalyzer, age_minutes};
use crate::core::types::{Comment, CommentAnalysis, CommentClassification};

/// A named phrase that votes for one classification with a fixed weight.
struct Pattern {
    name: &'static str,
    classification: CommentClassification,
    weight: f64,
    re: Regex,
}

fn pattern(
    name: &'static str,
    classification: CommentClassification,
    weight: f64,
    re: &str,
) -> Pattern {
    Pattern {
        name,
        classification,
        weight,
        re: Regex::new(re).unwrap(),
    }
}

static PATTERNS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    use CommentClassification::{NoAction, TaskLimit, Working};
    vec![
        pattern("on_it", Working, 0.6, r"(?i)\bon it\b"),
        pattern(
            "working_on",
            Working,
            0.7,
            r"(?i)\b(i['’]?m|i am|jules is)\s+(now\s+)?working on\b",
        ),
        pattern(
            "started_task",
            Working,
            0.6,
            r"(?i)\b(started|starting|begun|beginning) (work|working|on (this|the) task)\b",
        ),
        pattern(
            "will_start",
            Working,
            0.5,
            r"(?i)\bi['’]?ll (get started|start working|take a look)\b",
        ),
        pattern("plan_ready", Working, 0.5, r"(?i)\bhere(['’]?s| is) (my|the) plan\b"),
        pattern("task_limit", TaskLimit, 0.8, r"(?i)\btask limit\b"),
        pattern(
            "too_many_tasks",
            TaskLimit,
            0.8,
            r"(?i)\btoo many (concurrent |active |running )?tasks\b",
        ),
        pattern(
            "limit_reached",
            TaskLimit,
            0.6,
            r"(?i)\breached (your|the|my) (daily |concurrent )?limit\b",
        ),
        pattern("try_again_later", TaskLimit, 0.4, r"(?i)\btry again later\b"),
        pattern("quota", TaskLimit, 0.4, r"(?i)\bquota\b"),
        pattern(
            "completed",
            NoAction,
            0.6,
            r"(?i)\b(i['’]?ve|i have) (completed|finished)\b|\btask (is )?(complete|completed|done)\b",
        ),
        pattern(
            "pr_created",
            NoAction,
            0.6,
            r"(?i)\b(created|opened|submitted) (a )?(pull request|pr)\b",
        ),
        pattern(
            "cannot_proceed",
            NoAction,
            0.5,
            r"(?i)\b(i can['’]?t|i cannot|unable to) (help|complete|proceed)\b",
        ),
    ]
});

const CLASSES: [CommentClassification; 3] = [
    CommentClassification::Working,
    CommentClassification::TaskLimit,
    CommentClassification::NoAction,
];

/// Built-in analyzer scoring comment bodies against weighted phrase patterns.
///
/// Each classification's score is the noisy-or of its matched pattern
/// weights. The top score wins; a competing runner-up discounts confidence by
/// half its own score. A tie or no match at all yields `unknown` at zero
/// confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternAnalyzer;

impl PatternAnalyzer {
    /// Classify comment text alone, without any notion of age.
    pub fn classify_body(&self, body: &str) -> (CommentClassification, f64, BTreeSet<String>) {
        let mut matched = BTreeSet::new();
        let mut scores = [0.0f64; CLASSES.len()];

        for (slot, class) in CLASSES.iter().enumerate() {
            let mut miss = 1.0;
            for p in PATTERNS.iter().filter(|p| p.classification == *class) {
                if p.re.is_match(body) {
                    matched.insert(p.name.to_string());
                    miss *= 1.0 - p.weight;
                }
            }
            scores[slot] = 1.0 - miss;
        }

        let mut ranked: Vec<(CommentClassification, f64)> =
            CLASSES.iter().copied().zip(scores).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (best_class, best) = ranked[0];
        let runner_up = ranked[1].1;

        if best <= 0.0 || best == runner_up {
            return (CommentClassification::Unknown, 0.0, matched);
        }
        let confidence = (best * (1.0 - runner_up / 2.0)).clamp(0.0, 1.0);
        (best_class, confidence, matched)
    }
}

impl CommentAnalyzer for PatternAnalyzer {
    fn analyze(&self, comment: &Comment, now: DateTime<Utc>) -> Result<CommentAnalysis> {
        let (classification, confidence, patterns_matched) = self.classify_body(&comment.body);
        Ok(CommentAnalysis {
            classification,
            confidence,
            patterns_matched,
            age_minutes: age_minutes(comment, now),
        })
    }
}
