//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Environment variable controlling the log filter.
pub const LOG_ENV: &str = "KILN_LOG";

/// Initializes the global tracing subscriber.
///
/// The filter comes from `KILN_LOG` and defaults to `info`. Calling this
/// more than once is harmless; later calls are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
