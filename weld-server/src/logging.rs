//! Tracing setup: console plus a daily rolling file in the log directory.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix; the appender adds the date.
const LOG_FILE: &str = "weld-server.log";

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Keep the returned guard alive until exit,
/// buffered file output is flushed when it drops.
pub fn init(log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let (file_writer, guard) = non_blocking(rolling::daily(log_dir, LOG_FILE));

    let console_layer = fmt::layer().with_target(true);
    let file_layer = fmt::layer().with_ansi(false).with_writer(file_writer);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    Ok(guard)
}
