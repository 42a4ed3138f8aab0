//! Logging infrastructure - structured tracing across the bridge
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels from the environment
//! - Zero-cost when disabled
//! - Optional JSON output and rolling log files
//!
//! Targets: `crossing`, `callback`, `reference`, `thread`, `sandbox`, `jvm`.

use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

// Re-export tracing macros for use throughout the bridge
pub use tracing::{debug, error, info, trace, warn, Level};

/// Global logging state (the appender guard must live as long as the process)
static LOGGER_INITIALIZED: OnceCell<Option<tracing_appender::non_blocking::WorkerGuard>> =
    OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path (console output when unset)
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // JBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("JBRIDGE_LOG_LEVEL") {
            config.level = parse_level(&level_str).unwrap_or(Level::INFO);
        }

        // JBRIDGE_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("JBRIDGE_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("JBRIDGE_LOG_JSON").is_ok();
        config.show_spans = std::env::var("JBRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config for debugging crossings
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }
}

/// Parse a level name (case-insensitive)
pub fn parse_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration (first call wins)
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let level = config.level.as_str().to_lowercase();
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("jbridge={level},jbridge_runtime={level}"))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (writer, guard) = match config.log_path.as_deref().map(Path::new) {
            Some(path) => {
                let directory = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let prefix = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "jbridge.log".to_string());
                let appender = tracing_appender::rolling::daily(directory, prefix);
                let (w, g) = tracing_appender::non_blocking(appender);
                (w, Some(g))
            }
            None => {
                let (w, g) = tracing_appender::non_blocking(std::io::stderr());
                (w, Some(g))
            }
        };

        let layer = if config.json_format {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_span_events(span_events)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(writer)
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(cfg!(debug_assertions))
                .boxed()
        };

        // Another subscriber may already be installed (tests, host application)
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init();

        guard
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Bridge-specific logging functions
// ============================================================================

/// Log a crossing into managed code
#[inline]
pub fn log_crossing(interface: &str, method: &str) {
    trace!(target: "crossing", interface, method, "calling into managed code");
}

/// Log a managed exception observed after a crossing
#[inline]
pub fn log_exception(class_name: &str, message: &str) {
    debug!(
        target: "crossing",
        exception = class_name,
        message,
        "managed exception pending after crossing"
    );
}

/// Log creation of a native callback owned by a managed wrapper
#[inline]
pub fn log_callback_created(wrapper: &str, address: usize) {
    debug!(target: "callback", wrapper, address, "native callback attached to wrapper");
}

/// Log release of a native callback
#[inline]
pub fn log_callback_released(address: usize) {
    debug!(target: "callback", address, "native callback released");
}

/// Log a native failure translated into a managed exception
#[inline]
pub fn log_callback_failure(wrapper: &str, error: &str) {
    warn!(target: "callback", wrapper, error, "native callback failed, throwing into managed code");
}

/// Log a crossing attempted from a thread without an execution handle
#[inline]
pub fn log_consistency_failure(context: &str, error: &str) {
    error!(
        target: "thread",
        context,
        error,
        "no execution handle for the calling thread"
    );
}

/// Log a global reference that could not be released
#[inline]
pub fn log_reference_leak(runtime: &str, reason: &str) {
    warn!(target: "reference", runtime, reason, "global reference leaked");
}
