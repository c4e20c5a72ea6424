//! Decision engine for Jules issue comments.
//!
//! Given an issue, the engine reads the comments left by the Jules bot and
//! tells a calling workflow whether to proceed, wait, or treat the signal as
//! ambiguous. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (classification, bot identity,
//!   staleness and confidence policy, backoff schedule). No I/O.
//! - **[`io`]**: Side-effecting operations (config file, clock, `gh` process).
//!   Isolated behind traits to enable scripted fakes in tests.
//!
//! Orchestration modules ([`check`], [`retry`]) combine the two.

pub mod check;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod retry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
