//! Process-wide tracing setup shared by services, workers, and tests.

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for the process.
///
/// JSON lines to stderr, filtered via `RUST_LOG` (default `info`). Safe to
/// call multiple times; only the first call installs a subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
