//! Orchestration for `watcher check`: fetch, decide, retry.

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument, warn};

use crate::core::analyzer::CommentAnalyzer;
use crate::core::backoff::BackoffPolicy;
use crate::core::identity::BotIdentity;
use crate::core::resolver::{DecisionBasis, decide};
use crate::core::types::{CommentClassification, DecisionResult, IssueRef};
use crate::io::clock::Clock;
use crate::io::comments::CommentSource;
use crate::retry::retry;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.6;

/// Parameters for one comment check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRequest {
    pub issue: IssueRef,
    /// Total attempts allowed for the fetch-and-decide call.
    pub max_retries: u32,
    pub min_confidence: f64,
    pub installation_id: Option<u64>,
}

impl CheckRequest {
    pub fn new(issue: IssueRef) -> Self {
        Self {
            issue,
            max_retries: DEFAULT_MAX_RETRIES,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            installation_id: None,
        }
    }
}

/// Decides what a workflow should do next based on Jules' comments on an issue.
pub struct CommentChecker<S, A, C> {
    source: S,
    analyzer: A,
    clock: C,
    bot: BotIdentity,
    backoff: BackoffPolicy,
}

impl<S, A, C> CommentChecker<S, A, C>
where
    S: CommentSource,
    A: CommentAnalyzer,
    C: Clock,
{
    pub fn new(source: S, analyzer: A, clock: C, bot: BotIdentity, backoff: BackoffPolicy) -> Self {
        Self {
            source,
            analyzer,
            clock,
            bot,
            backoff,
        }
    }

    /// Fetch the issue's comments once and decide from the latest bot comment.
    ///
    /// Fails only when the comment listing or the analyzer fails.
    #[instrument(skip_all, fields(issue = %issue, min_confidence = min_confidence))]
    pub async fn analyze_latest_comment(
        &self,
        issue: &IssueRef,
        min_confidence: f64,
        installation_id: Option<u64>,
    ) -> Result<DecisionResult> {
        let comments = self
            .source
            .list_comments(issue, installation_id)
            .await
            .with_context(|| format!("list comments for {issue}"))?;
        let now = self.clock.now();
        let resolution = decide(&comments, &self.bot, &self.analyzer, min_confidence, now)?;

        if let Some(analysis) = resolution.decision.analysis() {
            info!(
                classification = %analysis.classification,
                confidence = analysis.confidence,
                patterns = ?analysis.patterns_matched,
                age_minutes = analysis.age_minutes,
                "comment analysis"
            );
        }
        match resolution.basis {
            DecisionBasis::NoBotComments => info!("no Jules comments found"),
            DecisionBasis::Stale => info!("latest Jules comment is stale"),
            DecisionBasis::Confident => debug!("latest Jules comment is confident"),
            DecisionBasis::SecondRecent => {
                info!("latest comment uncertain, using second recent comment");
            }
            DecisionBasis::Uncertain => info!("comment confidence below threshold"),
        }
        Ok(resolution.decision)
    }

    /// Run [`Self::analyze_latest_comment`] with bounded retries.
    ///
    /// Never fails: when every attempt errors the result is `no_action` with
    /// `retry_count = max_retries`. On success `retry_count` is the index of
    /// the attempt that succeeded.
    #[instrument(skip_all, fields(issue = %request.issue, max_retries = request.max_retries))]
    pub async fn check_comments(&self, request: &CheckRequest) -> DecisionResult {
        let issue = &request.issue;
        let max_retries = request.max_retries;
        let min_confidence = request.min_confidence;
        let installation_id = request.installation_id;

        let outcome = retry(
            max_retries,
            &self.backoff,
            |err, attempt| {
                warn!(
                    attempt = attempt + 1,
                    max_retries,
                    error = %format_args!("{err:#}"),
                    "comment check attempt failed"
                );
            },
            move |attempt| {
                info!(attempt = attempt + 1, max_retries, "checking Jules comments");
                self.analyze_latest_comment(issue, min_confidence, installation_id)
            },
        )
        .await;

        match outcome {
            Ok(done) => done.value.with_retry_count(done.attempt),
            Err(exhausted) => {
                error!(error = %exhausted, "giving up on comment check");
                DecisionResult::bare(CommentClassification::NoAction).with_retry_count(max_retries)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::PatternAnalyzer;
    use crate::test_support::{
        FixedClock, ScriptedAnalyzer, ScriptedCommentSource, bot_comment, human_comment,
        scripted, t0,
    };
    use std::time::Duration;
    use tokio::time::Instant;

    fn checker(
        source: ScriptedCommentSource,
        analyzer: ScriptedAnalyzer,
    ) -> CommentChecker<ScriptedCommentSource, ScriptedAnalyzer, FixedClock> {
        CommentChecker::new(
            source,
            analyzer,
            FixedClock(t0()),
            BotIdentity::default(),
            BackoffPolicy::default(),
        )
    }

    fn request() -> CheckRequest {
        CheckRequest::new(IssueRef::new("acme", "widgets", 17))
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_third_attempt_reports_attempt_index() {
        let source = ScriptedCommentSource::new(vec![
            Err("connection reset".to_string()),
            Err("502 bad gateway".to_string()),
            Ok(vec![bot_comment(1, 10)]),
        ]);
        let analyzer =
            ScriptedAnalyzer::new(vec![scripted(1, CommentClassification::Working, 0.8, 10.0)]);
        let checker = checker(source, analyzer);
        let start = Instant::now();

        let result = checker.check_comments(&request()).await;

        assert_eq!(result.action, CommentClassification::Working);
        assert_eq!(result.retry_count, Some(2));
        assert_eq!(result.comment().map(|c| c.id), Some(1));
        assert_eq!(checker.source.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_degrade_to_no_action() {
        let source = ScriptedCommentSource::new(vec![
            Err("timeout".to_string()),
            Err("timeout".to_string()),
            Err("timeout".to_string()),
        ]);
        let checker = checker(source, ScriptedAnalyzer::new(vec![]));

        let result = checker.check_comments(&request()).await;

        assert_eq!(
            result,
            DecisionResult::bare(CommentClassification::NoAction).with_retry_count(3)
        );
        assert_eq!(checker.source.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn analyzer_failures_are_retried() {
        let source = ScriptedCommentSource::new(vec![
            Ok(vec![bot_comment(5, 1)]),
            Ok(vec![bot_comment(5, 1)]),
        ]);
        let checker = checker(source, ScriptedAnalyzer::new(vec![]));
        let req = CheckRequest {
            max_retries: 2,
            ..request()
        };

        let result = checker.check_comments(&req).await;

        assert_eq!(
            result,
            DecisionResult::bare(CommentClassification::NoAction).with_retry_count(2)
        );
        assert_eq!(checker.analyzer.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn analyzer_recovers_on_third_attempt() {
        let source = ScriptedCommentSource::new(vec![
            Ok(vec![bot_comment(5, 1)]),
            Ok(vec![bot_comment(5, 1)]),
            Ok(vec![bot_comment(5, 1)]),
        ]);
        let analyzer =
            ScriptedAnalyzer::new(vec![scripted(5, CommentClassification::TaskLimit, 0.9, 1.0)])
                .failing_first(2);
        let checker = checker(source, analyzer);
        let start = Instant::now();

        let result = checker.check_comments(&request()).await;

        assert_eq!(result.action, CommentClassification::TaskLimit);
        assert_eq!(result.retry_count, Some(2));
        assert_eq!(result.comment().map(|c| c.id), Some(5));
        assert_eq!(checker.analyzer.calls(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn ambiguous_outcomes_are_not_retried() {
        let source = ScriptedCommentSource::new(vec![Ok(vec![bot_comment(1, 3)])]);
        let analyzer =
            ScriptedAnalyzer::new(vec![scripted(1, CommentClassification::Working, 0.2, 3.0)]);
        let checker = checker(source, analyzer);

        let result = checker.check_comments(&request()).await;

        assert_eq!(result.action, CommentClassification::Unknown);
        assert_eq!(result.retry_count, Some(0));
        assert_eq!(checker.source.calls(), 1);
    }

    #[tokio::test]
    async fn no_bot_comments_is_terminal() {
        let source = ScriptedCommentSource::new(vec![Ok(vec![human_comment(1, 1)])]);
        let checker = checker(source, ScriptedAnalyzer::new(vec![]));

        let result = checker.check_comments(&request()).await;

        assert_eq!(
            result,
            DecisionResult::bare(CommentClassification::NoAction).with_retry_count(0)
        );
        assert_eq!(checker.source.calls(), 1);
    }

    #[tokio::test]
    async fn zero_retries_degrades_without_fetching() {
        let source = ScriptedCommentSource::new(vec![Ok(vec![bot_comment(1, 1)])]);
        let checker = checker(source, ScriptedAnalyzer::new(vec![]));
        let req = CheckRequest {
            max_retries: 0,
            ..request()
        };

        let result = checker.check_comments(&req).await;

        assert_eq!(
            result,
            DecisionResult::bare(CommentClassification::NoAction).with_retry_count(0)
        );
        assert_eq!(checker.source.calls(), 0);
    }

    #[tokio::test]
    async fn analyze_latest_comment_propagates_source_errors() {
        let source = ScriptedCommentSource::new(vec![Err("rate limited".to_string())]);
        let checker = checker(source, ScriptedAnalyzer::new(vec![]));

        let err = checker
            .analyze_latest_comment(&request().issue, DEFAULT_MIN_CONFIDENCE, None)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("list comments for acme/widgets#17"));
        assert!(format!("{err:#}").contains("rate limited"));
    }

    #[tokio::test]
    async fn pattern_analyzer_end_to_end() {
        let mut ack = bot_comment(1, 4);
        ack.body = "Jules is working on this issue. On it!".to_string();
        let source = ScriptedCommentSource::new(vec![Ok(vec![human_comment(2, 30), ack])]);
        let checker = CommentChecker::new(
            source,
            PatternAnalyzer,
            FixedClock(t0()),
            BotIdentity::default(),
            BackoffPolicy::default(),
        );

        let result = checker.check_comments(&request()).await;

        assert_eq!(result.action, CommentClassification::Working);
        assert_eq!(result.analysis().map(|a| a.age_minutes), Some(4.0));
        assert_eq!(result.retry_count, Some(0));
    }
}
