use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter (`debug`, `info`, `warn`, ...).
pub const LOG_ENV: &str = "DEVICE_CHOOSER_LOG";

static LAYER_LOGGING: Once = Once::new();

/// Initialize structured logging for the command-line tool.
/// Set DEVICE_CHOOSER_LOG=debug (or trace, info, warn, error) for verbosity control.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize logging from inside a host application.
///
/// Runs at most once per process. Events go to stderr and default to `warn`, so
/// selection fallbacks are visible while the layer stays silent otherwise. If the
/// application already installed a global subscriber, that one is kept.
pub fn init_layer_logging() {
    LAYER_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
