use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the logging system with both console and file output.
///
/// If the log directory cannot be created or opened, file logging is skipped with a
/// warning and only the console layer is installed.
pub fn init_logging(config: &LoggingConfig) {
    // Daily-rotated file appender; `build` creates the directory
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_name)
        .build(&config.directory);

    let (file_layer, guard, file_error) = match file_appender {
        Ok(appender) => {
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(appender);
            // JSON layer for file logging
            let layer = fmt::layer().json().with_writer(non_blocking_writer);
            (Some(layer), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    // Console output goes to stderr so it does not interleave with progress lines
    let console_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    // Respect RUST_LOG if set; otherwise use the configured default
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // try_init so a second call (e.g. from tests) is a no-op
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    if let Some(e) = file_error {
        warn!(
            directory = %config.directory.display(),
            "File logging disabled: {}", e
        );
    }

    // We need to keep the guard in scope to ensure logs are flushed on exit
    std::mem::forget(guard);
}
