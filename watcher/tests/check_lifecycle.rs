//! Lifecycle tests for `CommentChecker::check_comments`.
//!
//! These drive the public checker with scripted collaborators through full
//! retry runs: flaky upstream recovering, an analyzer recovering, stale
//! comments, and total failure. Time is paused, so backoff is observable
//! without waiting.

use std::time::Duration;

use tokio::time::Instant;
use watcher::check::{CheckRequest, CommentChecker};
use watcher::core::backoff::BackoffPolicy;
use watcher::core::identity::BotIdentity;
use watcher::core::types::{CommentClassification, DecisionResult, IssueRef};
use watcher::test_support::{
    FixedClock, ScriptedAnalyzer, ScriptedCommentSource, bot_comment, human_comment, scripted, t0,
};

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
    CheckRequest::new(IssueRef::new("acme", "widgets", 42))
}

/// Upstream fails twice, then returns a confident acknowledgement.
///
/// Backoff sleeps 1s then 2s; the result names the third attempt.
#[tokio::test(start_paused = true)]
async fn flaky_upstream_then_confident_comment() {
    let source = ScriptedCommentSource::new(vec![
        Err("connection reset by peer".to_string()),
        Err("HTTP 502".to_string()),
        Ok(vec![human_comment(1, 40), bot_comment(2, 6)]),
    ]);
    let analyzer =
        ScriptedAnalyzer::new(vec![scripted(2, CommentClassification::Working, 0.9, 6.0)]);
    let checker = checker(source, analyzer);
    let start = Instant::now();

    let result = checker.check_comments(&request()).await;

    assert_eq!(result.action, CommentClassification::Working);
    assert_eq!(result.retry_count, Some(2));
    assert_eq!(result.comment().map(|c| c.id), Some(2));
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

/// The analyzer errors on the first two attempts and succeeds on the third.
#[tokio::test(start_paused = true)]
async fn analyzer_failures_then_recovery() {
    let comments = vec![bot_comment(7, 3)];
    let source = ScriptedCommentSource::new(vec![
        Ok(comments.clone()),
        Ok(comments.clone()),
        Ok(comments),
    ]);
    let analyzer =
        ScriptedAnalyzer::new(vec![scripted(7, CommentClassification::TaskLimit, 0.85, 3.0)])
            .failing_first(2);
    let checker = checker(source, analyzer);

    let result = checker.check_comments(&request()).await;

    assert_eq!(result.action, CommentClassification::TaskLimit);
    assert_eq!(result.retry_count, Some(2));
}

/// A stale comment is terminal even when confident: no retries, no sleeps.
#[tokio::test(start_paused = true)]
async fn stale_comment_degrades_without_retrying() {
    let source = ScriptedCommentSource::new(vec![Ok(vec![bot_comment(3, 150)])]);
    let analyzer =
        ScriptedAnalyzer::new(vec![scripted(3, CommentClassification::Working, 0.99, 150.0)]);
    let checker = checker(source, analyzer);
    let start = Instant::now();

    let result = checker.check_comments(&request()).await;

    assert_eq!(result.action, CommentClassification::NoAction);
    assert_eq!(result.retry_count, Some(0));
    assert_eq!(result.comment().map(|c| c.id), Some(3));
    assert_eq!(
        result.analysis().map(|a| a.classification),
        Some(CommentClassification::Working)
    );
    assert_eq!(start.elapsed(), Duration::ZERO);
}

/// Every attempt fails: the result is a bare `no_action` and serializes as such.
#[tokio::test(start_paused = true)]
async fn exhausted_run_serializes_bare_no_action() {
    let source = ScriptedCommentSource::new(vec![]);
    let checker = checker(source, ScriptedAnalyzer::new(vec![]));
    let start = Instant::now();

    let result = checker.check_comments(&request()).await;

    assert_eq!(
        result,
        DecisionResult::bare(CommentClassification::NoAction).with_retry_count(3)
    );
    assert_eq!(
        serde_json::to_value(&result).expect("serialize"),
        serde_json::json!({ "action": "no_action", "retry_count": 3 })
    );
    // 1s + 2s between three attempts, nothing after the last.
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}
