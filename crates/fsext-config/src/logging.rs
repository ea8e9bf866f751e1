//! Structured logging utilities for fs-ext components.
//!
//! Provides consistent logging with component prefixes and structured fields.
//!
//! # Usage
//!
//! ```ignore
//! use fsext_config::log_lock_debug;
//!
//! log_lock_debug!("flock", fd = 3, op = 2);
//! ```

/// Component identifiers for log filtering
pub struct Component;

impl Component {
    pub const LOCK: &'static str = "LOCK";
    pub const FCNTL: &'static str = "FCNTL";
    pub const SEEK: &'static str = "SEEK";
    pub const STATVFS: &'static str = "STATVFS";
    pub const STAT: &'static str = "STAT";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

// === LOCK logging macros ===

#[macro_export]
macro_rules! log_lock_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "LOCK", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_lock_trace {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::trace!(component = "LOCK", $($key = $value,)* $msg)
    };
}

// === FCNTL logging macros ===

#[macro_export]
macro_rules! log_fcntl_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "FCNTL", $($key = $value,)* $msg)
    };
}

// === SEEK logging macros ===

#[macro_export]
macro_rules! log_seek_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "SEEK", $($key = $value,)* $msg)
    };
}

// === STATVFS logging macros ===

#[macro_export]
macro_rules! log_statvfs_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "STATVFS", $($key = $value,)* $msg)
    };
}

// === STAT logging macros ===

#[macro_export]
macro_rules! log_stat_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "STAT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_stat_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "STAT", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_stat_trace {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::trace!(component = "STAT", $($key = $value,)* $msg)
    };
}

// === CLI logging macros ===

#[macro_export]
macro_rules! log_cli_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CLI", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_cli_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "CLI", $($key = $value,)* $msg)
    };
}

/// Initialize logging. `FSEXT_LOG` wins, then `RUST_LOG`, then `level`.
/// Call this once at application startup.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_env("FSEXT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    // Logs go to stderr so command output stays machine-readable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
