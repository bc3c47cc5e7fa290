/// Structured logging for the air quality monitoring service
///
/// Provides context-rich logging with data-source and location tags on top
/// of `tracing`. Supports console output and an optional append-only log
/// file for daemon operations.

use crate::ingest::job::JobError;
use crate::model::AirQualityError;
use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    IqAir,
    Database,
    Scheduler,
    Http,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::IqAir => write!(f, "IQAIR"),
            DataSource::Database => write!(f, "DB"),
            DataSource::Scheduler => write!(f, "CRON"),
            DataSource::Http => write!(f, "HTTP"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the caller sent coordinates the provider won't serve
    Expected,
    /// Unexpected failure - provider outage, network or database trouble
    Unexpected,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
        }
    }
}

/// Classify a failure by its kind
pub fn classify_failure(err: &AirQualityError) -> FailureType {
    match err {
        AirQualityError::InvalidCoordinates(_) => FailureType::Expected,
        AirQualityError::ProviderUnavailable(_) | AirQualityError::Persistence { .. } => {
            FailureType::Unexpected
        }
    }
}

/// Which component a failure came from
pub fn failure_source(err: &AirQualityError) -> DataSource {
    match err {
        AirQualityError::Persistence { .. } => DataSource::Database,
        _ => DataSource::IqAir,
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Initialize the global subscriber.
///
/// Console output always; when `log_file` is set every event is also
/// appended there without ANSI colouring. Calling this twice is harmless:
/// the first subscriber stays installed.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> std::io::Result<()> {
    let console = if console_timestamps {
        tracing_subscriber::fmt::layer().with_target(false).boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .without_time()
            .boxed()
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(LevelFilter::from(min_level))
        .try_init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, location: Option<&str>, message: &str) {
    tracing::info!(source = %source, location, "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, location: Option<&str>, message: &str) {
    tracing::warn!(source = %source, location, "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, location: Option<&str>, message: &str) {
    tracing::error!(source = %source, location, "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, location: Option<&str>, message: &str) {
    tracing::debug!(source = %source, location, "{}", message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failed operation with automatic classification.
///
/// Expected failures (coordinates a caller picked and the provider refused)
/// go to debug. `message` is the text that was surfaced to the caller.
pub fn log_failure(location: Option<&str>, operation: &str, err: &AirQualityError, message: &str) {
    let failure_type = classify_failure(err);
    let source = failure_source(err);
    let line = format!("{} failed [{}]: {}", operation, failure_type, message);

    match failure_type {
        FailureType::Expected => debug(source, location, &line),
        FailureType::Unexpected => error(source, location, &line),
    }
}

/// Log a failed ingestion tick.
///
/// Always at error level, whatever the failure class: the tick's
/// coordinate is fixed, so a rejection is not the caller's doing.
pub fn log_job_failure(location: &str, provider: &str, err: &JobError) {
    let cause = err.cause();
    let line = format!(
        "Ingestion tick via {} failed [{}]: {}",
        provider,
        classify_failure(cause),
        err
    );
    error(failure_source(cause), Some(location), &line);
}

// ---------------------------------------------------------------------------
// Tick Summary Logging
// ---------------------------------------------------------------------------

/// Log cumulative ingestion counts after a tick
pub fn log_tick_summary(location: &str, succeeded: u64, failed: u64, last_ok: bool) {
    let message = format!(
        "Ingestion totals: {} stored, {} failed",
        succeeded,
        failed
    );

    if last_ok {
        info(DataSource::Scheduler, Some(location), &message);
    } else {
        warn(DataSource::Scheduler, Some(location), &message);
    }
}
