//! Logging infrastructure - structured tracing for the allocator and console
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable log levels per module
//! - Zero-cost when disabled
//! - Console or file output
//!
//! Events are purely informational. No code path logs in place of returning
//! a status to its caller.

use once_cell::sync::OnceCell;
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::allocator::{MemPtr, PoolId};

/// Global logging state (keeps the file writer alive)
static LOGGER_INITIALIZED: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Enable file logging
    pub file_output: bool,
    /// Log file path (if file_output enabled)
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
            file_output: false,
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

        // MCU_UTIL_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level_str) = std::env::var("MCU_UTIL_LOG_LEVEL") {
            config.level = parse_level(&level_str);
        }

        // MCU_UTIL_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("MCU_UTIL_LOG_FILE") {
            config.file_output = true;
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("MCU_UTIL_LOG_JSON").is_ok();
        config.show_spans = std::env::var("MCU_UTIL_LOG_SPANS").is_ok();

        config
    }

    /// Minimal logging for tight loops
    pub fn performance() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Verbose logging into a local file
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            file_output: true,
            log_path: Some("mcu_util.log".to_string()),
            json_format: false,
            show_spans: true,
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration (first call wins)
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "mcu_util={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (writer, guard) = match config.log_path.as_deref().filter(|_| config.file_output) {
            Some(path) => {
                let path = Path::new(path);
                let directory = path.parent().unwrap_or_else(|| Path::new("."));
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "mcu_util.log".to_string());
                let (writer, guard) = tracing_appender::non_blocking(
                    tracing_appender::rolling::never(directory, file_name),
                );
                (BoxMakeWriter::new(writer), Some(guard))
            }
            None => (BoxMakeWriter::new(io::stderr), None),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_line_number(cfg!(debug_assertions));

        let layer = if config.json_format {
            layer.json().boxed()
        } else {
            layer.compact().boxed()
        };

        // A subscriber installed elsewhere (tests, host app) takes precedence
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
// Allocator events
// ============================================================================

/// Log pool creation
pub fn log_pool_init(index: usize, name: &str, capacity: usize) {
    tracing::debug!(
        event = "pool_init",
        pool = index,
        name,
        capacity_bytes = capacity,
        "Pool initialised"
    );
}

/// Log memory allocation
#[inline]
pub fn log_allocation(size: usize, pool: PoolId, ptr: MemPtr) {
    tracing::trace!(
        event = "allocation",
        size_bytes = size,
        pool = pool.index(),
        address = %ptr,
        "Memory allocated"
    );
}

/// Log a failed allocation (no fitting free block)
#[inline]
pub fn log_exhausted(size: usize, pool: PoolId, available: usize) {
    tracing::debug!(
        event = "exhausted",
        size_bytes = size,
        pool = pool.index(),
        available_bytes = available,
        "No free block fits request"
    );
}

/// Log memory deallocation
#[inline]
pub fn log_deallocation(size: usize, pool: PoolId, ptr: MemPtr) {
    tracing::trace!(
        event = "deallocation",
        size_bytes = size,
        pool = pool.index(),
        address = %ptr,
        "Memory deallocated"
    );
}

/// Log a free of an already free block
pub fn log_double_free(ptr: MemPtr) {
    tracing::warn!(
        event = "double_free",
        address = %ptr,
        "Block already free, ignored"
    );
}

/// Log a free of an address no pool owns as a block
pub fn log_foreign_free(ptr: MemPtr) {
    tracing::warn!(
        event = "foreign_free",
        address = %ptr,
        "Address is not a pool block, ignored"
    );
}

/// Log console command dispatch
pub fn log_command(name: &str, args: usize) {
    tracing::debug!(event = "command", name, args, "Console command dispatched");
}

/// Performance tracking utilities
pub mod perf {
    use std::time::Instant;
    use tracing::debug;

    /// Track operation duration (returns guard that logs on drop)
    #[must_use]
    pub fn track(operation: &str) -> PerformanceGuard {
        PerformanceGuard {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard {
        operation: String,
        start: Instant,
    }

    impl Drop for PerformanceGuard {
        fn drop(&mut self) {
            let elapsed = self.start.elapsed();
            debug!(
                operation = %self.operation,
                duration_us = elapsed.as_micros() as u64,
                "operation completed"
            );
        }
    }
}
