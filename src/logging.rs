use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::error::{AppError, Result};

const LOG_FILE_PREFIX: &str = "feed-relay";

/// Daily files kept before the oldest is removed.
const KEPT_LOG_FILES: usize = 3;

/// Log to stderr and to a daily rotated file under `config.log_dir`.
/// RUST_LOG overrides the default `info` level for both.
pub fn init(config: &Config) -> Result<()> {
    let file_appender = file_appender(Path::new(&config.log_dir))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false) // No ANSI colors in log files
                .with_writer(file_appender),
        )
        .try_init()
        .map_err(|e| AppError::Other(e.into()))
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender> {
    std::fs::create_dir_all(dir)?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(KEPT_LOG_FILES)
        .build(dir)
        .map_err(|e| AppError::Other(e.into()))
}
