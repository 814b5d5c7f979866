//! Tracing setup for the CLI
//!
//! The terminal runs in raw mode while a collection plays, so events go to a
//! daily log file under `.logs/` and never to stdout.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_DIR: &str = ".logs";
const LOG_FILE_PREFIX: &str = "spotify-window";

/// Engine at debug, catalog client at info, HTTP and everything else at warn
const DEFAULT_FILTER: &str = "spotify_window=debug,rspotify=info,reqwest=warn,warn";

/// `RUST_LOG` when it parses, otherwise [`DEFAULT_FILTER`]
fn env_filter() -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    }
}

/// Open `<dir>/spotify-window.YYYY-MM-DD.log`, creating `dir` when needed
fn file_writer(dir: &Path) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber.
///
/// Call once, before anything logs. The level is taken from `RUST_LOG`.
pub fn init_logging() -> anyhow::Result<()> {
    let (writer, guard) = file_writer(Path::new(LOG_DIR))?;
    // Flushing happens when the guard drops; it has to outlive every task
    Box::leak(Box::new(guard));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(dir = LOG_DIR, "Logging initialized");
    Ok(())
}

/// Log the result of a remote call
#[macro_export]
macro_rules! log_api_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "API request successful"),
            Err(e) => tracing::error!(operation = $operation, error = %e, "API request failed"),
        }
    };
}

/// Log the start of a remote call with additional context
#[macro_export]
macro_rules! log_api_request {
    ($operation:expr, $($field:tt)*) => {
        tracing::debug!(operation = $operation, $($field)*, "API request started");
    };
}
