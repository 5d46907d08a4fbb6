//! Logging Module
//!
//! Structured logging built on `tracing`. Corpus preparation runs are long,
//! file-heavy batch jobs, so besides subscriber setup this module carries a
//! small progress logger for the copy/move phases.

use std::time::Instant;

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Verbose config for debugging discovery and split decisions
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            ansi_colors: true,
        }
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            include_target: false,
            ansi_colors: true,
        }
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, falling back to `Info`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Initialize logging with the given configuration
///
/// `RUST_LOG` takes precedence over `config.level` when it is set.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Progress logger for long-running operations
pub struct ProgressLogger {
    /// Operation name
    operation: String,
    /// Total items to process
    total: usize,
    /// Current progress
    current: usize,
    /// Log interval (log every N items)
    log_interval: usize,
    /// Start time
    start_time: Instant,
}

impl ProgressLogger {
    /// Create a new progress logger
    pub fn new(operation: &str, total: usize) -> Self {
        Self {
            operation: operation.to_string(),
            total,
            current: 0,
            log_interval: (total / 10).max(1),
            start_time: Instant::now(),
        }
    }

    /// Create with custom log interval
    pub fn with_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval.max(1);
        self
    }

    /// Update progress
    pub fn update(&mut self, count: usize) {
        self.current = count;

        if self.total == 0 {
            return;
        }

        if self.current % self.log_interval == 0 || self.current == self.total {
            let percentage = 100.0 * self.current as f64 / self.total as f64;
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let items_per_sec = if elapsed > 0.0 {
                self.current as f64 / elapsed
            } else {
                0.0
            };

            tracing::info!(
                "{}: {}/{} ({:.1}%) - {:.1} files/s",
                self.operation,
                self.current,
                self.total,
                percentage,
                items_per_sec
            );
        }
    }

    /// Increment progress by 1
    pub fn increment(&mut self) {
        self.update(self.current + 1);
    }

    /// Log completion
    pub fn finish(&self) {
        tracing::info!(
            "{}: Completed {} items in {:.2}s",
            self.operation,
            self.current,
            self.start_time.elapsed().as_secs_f64()
        );
    }
}
