//! Logging setup for wgwarden using tracing.
//!
//! The daily log file always gets the full `EnvFilter` output. The console
//! gets everything while the bot runs, but only warnings for one-shot
//! commands whose stdout is the result.

use anyhow::Result;
use clap::ValueEnum;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE: &str = "wgwarden.log";
const DEFAULT_FILTER: &str = "info,wgwarden=debug";

/// Line format of the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log shippers.
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub format: LogFormat,
    /// Overrides the platform data directory.
    pub dir: Option<PathBuf>,
    /// Limit the console to warnings and errors.
    pub quiet_console: bool,
}

/// Initialize logging with file appender and console output.
/// Returns the writer guard, which must live until exit, and the log directory.
pub fn init(options: &LogOptions) -> Result<(WorkerGuard, PathBuf)> {
    let log_dir = match &options.dir {
        Some(dir) => dir.clone(),
        None => default_log_dir()?,
    };
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (text_file, json_file) = match options.format {
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_timer(UtcTime::rfc_3339())
                    .with_current_span(false),
            ),
        ),
    };

    let console_level = if options.quiet_console {
        LevelFilter::WARN
    } else {
        LevelFilter::TRACE
    };
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_filter(console_level);

    tracing_subscriber::registry()
        .with(filter)
        .with(text_file)
        .with(json_file)
        .with(console_layer)
        .init();

    tracing::debug!("Logging to {} ({:?})", log_file_hint(&log_dir), options.format);

    Ok((guard, log_dir))
}

fn log_file_hint(dir: &Path) -> String {
    dir.join(format!("{}.<date>", LOG_FILE)).display().to_string()
}

fn default_log_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "wgwarden", "wgwarden")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    Ok(dirs.data_dir().join("logs"))
}
