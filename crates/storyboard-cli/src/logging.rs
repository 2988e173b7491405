//! Subscriber setup: stderr plus a daily rolling file in the logs directory.

use anyhow::{Context, Result};
use storyboard_infrastructure::StoryboardPaths;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "storyboard=info";

/// Installs the global subscriber.
///
/// `--log-level` wins over `RUST_LOG`, which wins over the default. The
/// returned guard flushes the file writer and must live until exit.
pub fn init(level: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(directive(level))
            .with_context(|| format!("invalid log level '{}'", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    let appender = StoryboardPaths::logs_dir().ok().and_then(|dir| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("storyboard.log")
            .build(dir)
            .ok()
    });
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        // No writable logs directory; stderr only.
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(guard)
}

/// A bare level applies to the storyboard crates only.
fn directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("storyboard={}", level)
    }
}
