//! Request logging for invocation traffic.

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

/// Tracing target for logged requests.
pub const REQUEST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::request");

/// Receives every invocation request before it is dispatched.
///
/// Logging is best-effort: implementations must not panic, and nothing they
/// do affects the reply.
pub trait RequestLogger: Send + Sync {
    /// Records one raw invocation request.
    fn log_request(&self, request: &Value);
}

/// Verbosity of [`TracingLogger`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warn,
    /// Errors, warnings, and informational messages.
    #[default]
    Info,
    /// Verbose debug output.
    Debug,
    /// Maximum verbosity.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        })
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Request logging options.
///
/// Logging is off unless explicitly enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct LoggingOptions {
    /// Whether requests are logged at all.
    pub enabled: bool,
    /// Level of the emitted events.
    pub level: LogLevel,
}

impl LoggingOptions {
    /// Logging enabled at `level`.
    pub const fn enabled(level: LogLevel) -> Self {
        Self {
            enabled: true,
            level,
        }
    }

    /// Logging disabled.
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            level: LogLevel::Info,
        }
    }
}

/// Default logger: emits one `tracing` event per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger {
    /// Active options.
    options: LoggingOptions,
}

impl TracingLogger {
    /// Creates a logger with `options`.
    pub const fn new(options: LoggingOptions) -> Self {
        Self { options }
    }
}

impl RequestLogger for TracingLogger {
    fn log_request(&self, request: &Value) {
        if !self.options.enabled {
            return;
        }
        let payload = request.get("payload").unwrap_or(&Value::Null);
        match self.options.level {
            LogLevel::Error => error!(target: REQUEST_TARGET, %payload, "request"),
            LogLevel::Warn => warn!(target: REQUEST_TARGET, %payload, "request"),
            LogLevel::Info => info!(target: REQUEST_TARGET, %payload, "request"),
            LogLevel::Debug => debug!(target: REQUEST_TARGET, %payload, "request"),
            LogLevel::Trace => trace!(target: REQUEST_TARGET, %payload, "request"),
        }
    }
}

/// Logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl RequestLogger for NoopLogger {
    fn log_request(&self, _request: &Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parse_case_insensitive() {
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("Trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn log_level_display_roundtrip() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
    }

    #[test]
    fn logging_is_off_by_default() {
        assert!(!LoggingOptions::default().enabled);
        assert!(LoggingOptions::enabled(LogLevel::Warn).enabled);
    }

    #[test]
    fn tracing_logger_tolerates_any_request() {
        let logger = TracingLogger::new(LoggingOptions::enabled(LogLevel::Trace));
        logger.log_request(&Value::Null);
        logger.log_request(&serde_json::json!({ "payload": { "path": [] } }));
    }
}
