//! Deterministic, pure decision logic.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! comments and an explicit evaluation time, and return deterministic outputs
//! suitable for tests.

pub mod analyzer;
pub mod backoff;
pub mod classifier;
pub mod identity;
pub mod resolver;
pub mod types;
