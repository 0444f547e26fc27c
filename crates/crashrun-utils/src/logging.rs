//! # Logging Utilities
//!
//! Logging infrastructure for crashrun using `tracing`.
//!
//! Console output goes to **stderr**. The launcher shares its stdout with the
//! program it runs and with the crash backtrace, so log lines must never end up
//! there.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=crashrun_core=trace`)
//! - `CRASHRUN_LOG_FORMAT`: Set output format (`json` or `pretty`, default: `pretty`)
//! - `CRASHRUN_LOG_FILE`: Optional path to log file (if not set, logs only to the console)
//!
//! ## Example
//!
//! ```rust,no_run
//! use crashrun_utils::{init_logging, LogLevel};
//!
//! let _guard = init_logging(LogLevel::Warn).expect("Failed to initialize logging");
//! tracing::warn!("something looks off");
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::env;
use std::io::{self, IsTerminal};

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const LOG_FORMAT_ENV: &str = "CRASHRUN_LOG_FORMAT";
/// Environment variable naming an optional log file.
pub const LOG_FILE_ENV: &str = "CRASHRUN_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    Pretty,
    /// JSON format, one object per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the background file writer alive.
///
/// Dropping the guard flushes pending file output. Hold it for the lifetime of
/// the program.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment
///
/// `default_level` applies when `RUST_LOG` is unset or unparsable. The format
/// comes from `CRASHRUN_LOG_FORMAT` and the optional file sink from
/// `CRASHRUN_LOG_FILE`.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(default_level: LogLevel) -> Result<LoggingGuard, LoggingError>
{
    let format = env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|s| LogFormat::from_str(&s).ok())
        .unwrap_or(LogFormat::Pretty);

    let directives = env::var("RUST_LOG")
        .ok()
        .filter(|rust_log| EnvFilter::try_new(rust_log).is_ok())
        .unwrap_or_else(|| Level::from(default_level).to_string());

    let log_file = env::var(LOG_FILE_ENV).ok().map(PathBuf::from);
    init_logging_internal(format, &directives, log_file.as_deref())
}

/// Colored output only when the stream is an interactive terminal.
fn ansi_for(stream: &impl IsTerminal) -> bool
{
    stream.is_terminal()
}

fn file_writer(path: &Path) -> (NonBlocking, WorkerGuard)
{
    let file_appender = tracing_appender::rolling::never(
        path.parent().unwrap_or_else(|| Path::new(".")),
        path.file_name().unwrap_or_default(),
    );
    tracing_appender::non_blocking(file_appender)
}

fn init_logging_internal(format: LogFormat, directives: &str, log_file: Option<&Path>)
    -> Result<LoggingGuard, LoggingError>
{
    // Each layer needs its own filter instance.
    let filter = || EnvFilter::new(directives);

    let (file_writer, file_guard) = log_file.map(file_writer).unzip();

    let installed = match format {
        LogFormat::Pretty => {
            let console_layer = fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(ansi_for(&io::stderr()))
                .with_writer(io::stderr)
                .with_filter(filter());

            let file_layer = file_writer.map(|writer| {
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false) // No ANSI in files
                    .with_filter(filter())
            });

            Registry::default().with(console_layer).with(file_layer).try_init()
        }
        LogFormat::Json => {
            let console_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(io::stderr)
                .with_filter(filter());

            let file_layer = file_writer.map(|writer| {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_filter(filter())
            });

            Registry::default().with(console_layer).with(file_layer).try_init()
        }
    };

    installed.map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok(LoggingGuard { _file: file_guard })
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Unknown log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Unknown log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
