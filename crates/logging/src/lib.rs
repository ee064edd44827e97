//! Tracing subscriber setup for the volume bot
//!
//! One call wires the global subscriber: an `EnvFilter` built from the
//! configured directive (overridable via `RUST_LOG`), a console layer in
//! human or JSON format, and optionally a daily-rolled file layer. The
//! returned guard must be held for the process lifetime so buffered file
//! output is flushed on exit.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {source}")]
    InvalidFilter {
        directive: String,
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to install global subscriber: {0}")]
    Install(String),
}

/// Microsecond timestamps; confirmation latencies live well below one
/// second.
struct MicrosecondTimestamp;

impl FormatTime for MicrosecondTimestamp {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(
            w,
            "{}.{:06}",
            now.format("%Y-%m-%d %H:%M:%S"),
            now.timestamp_subsec_micros()
        )
    }
}

/// Logging options, mirrored from the `logging` config section
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Filter directive, e.g. "info" or "volume_bot=debug"
    pub level: String,
    /// Emit JSON lines instead of the human format
    pub json: bool,
    /// Directory for daily-rolled log files
    pub file_dir: Option<String>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_dir: None,
        }
    }
}

/// Install the global subscriber. Returns the file writer guard when a
/// log directory is configured; keep it alive until shutdown.
pub fn init(options: &LoggingOptions) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = build_filter(&options.level)?;

    let console_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_timer(MicrosecondTimestamp)
            .with_writer(io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_timer(MicrosecondTimestamp)
            .with_writer(io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match &options.file_dir {
        Some(dir) => {
            let appender = rolling::daily(Path::new(dir), "volume-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(MicrosecondTimestamp)
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(guard)
}

/// `RUST_LOG` wins over the configured directive when set
fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(env_directive) = std::env::var(EnvFilter::DEFAULT_ENV) {
        if !env_directive.is_empty() {
            return EnvFilter::try_new(&env_directive).map_err(|source| {
                LoggingError::InvalidFilter {
                    directive: env_directive,
                    source,
                }
            });
        }
    }

    EnvFilter::try_new(level).map_err(|source| LoggingError::InvalidFilter {
        directive: level.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse_or_error_cleanly() {
        assert!(build_filter("info").is_ok());
        assert!(build_filter("volume_bot=debug,hyper=warn").is_ok());

        let result = build_filter("not=a=directive");
        assert!(matches!(result, Err(LoggingError::InvalidFilter { .. })));
    }

    #[test]
    fn timestamps_carry_microseconds() {
        let mut rendered = String::new();
        let mut writer = tracing_subscriber::fmt::format::Writer::new(&mut rendered);
        MicrosecondTimestamp.format_time(&mut writer).unwrap();

        // "YYYY-MM-DD HH:MM:SS.uuuuuu"
        let (_, fraction) = rendered.rsplit_once('.').unwrap();
        assert_eq!(fraction.len(), 6);
    }
}
