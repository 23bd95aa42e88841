//! Diagnostic tracing for the launcher and the reference worker.
//!
//! Logs go to stderr so stdout stays reserved for command output (the
//! verdict token, or a serialized topology). Workers launched without a
//! log directory inherit the launcher's stderr, so their lines interleave
//! with the launcher's; every worker event carries its `slot_index`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=peerboot=info peerboot launch ./learner learner.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
