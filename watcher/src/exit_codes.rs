//! Stable exit codes for watcher CLI commands.

/// Command succeeded; for `check`, the decision is an actionable classification.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config, or other errors.
pub const INVALID: i32 = 1;
/// `watcher check` decided there is nothing to do.
pub const NO_ACTION: i32 = 2;
/// `watcher check` could not classify the latest comment with confidence.
pub const UNKNOWN: i32 = 3;
