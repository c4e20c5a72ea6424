//! I/O helpers: configuration, clock, and the tracker transport.

pub mod clock;
pub mod comments;
pub mod config;
pub mod process;
