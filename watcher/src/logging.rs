//! Development-time tracing.
//!
//! Diagnostics go to stderr, filtered by `RUST_LOG`. Decision JSON is the
//! only thing written to stdout, so workflows can parse it unconditionally.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the stderr subscriber.
///
/// `RUST_LOG` wins when set. Otherwise everything logs at `warn`, and each
/// `-v` raises the crate's own events one level (`info`, then `debug`).
///
/// # Example
/// ```bash
/// watcher -v check --owner acme --repo widgets --issue 17
/// ```
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn default_directives(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "warn,watcher=info",
        _ => "warn,watcher=debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_scopes_to_crate_target() {
        assert_eq!(default_directives(0), "warn");
        assert_eq!(default_directives(1), "warn,watcher=info");
        assert_eq!(default_directives(4), "warn,watcher=debug");
    }

    #[test]
    fn directives_parse() {
        for verbose in 0..3 {
            assert!(EnvFilter::try_new(default_directives(verbose)).is_ok());
        }
    }
}
