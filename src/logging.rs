//! Log output setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for the command-line probe.
///
/// Logs go to stderr so the report on stdout stays clean.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "dbprobe=debug"); takes precedence over `verbose`
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "dbprobe=debug" } else { "dbprobe=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
