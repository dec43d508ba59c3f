//! Logging initialization shared by the CLI.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Respects `DBSMOKE_LOG` when set, otherwise falls back to the given
/// default level (`-v` bumps the CLI default to debug). Output goes to
/// stderr so the final outcome JSON on stdout stays machine-readable.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env("DBSMOKE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // try_init so tests that initialize twice do not panic.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
