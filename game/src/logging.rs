//! Terminal logging for the binaries.
//!
//! The crates log through the `log` facade; the subscriber installed here
//! bridges those records and filters them with `RUST_LOG`, falling back to
//! `default_filter`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a compact stderr subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();
}
