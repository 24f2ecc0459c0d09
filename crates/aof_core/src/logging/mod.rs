//! Logging infrastructure.
//!
//! Library code emits `tracing` events; binaries install a subscriber once
//! with [`init_tracing`].
//!
//! # Example
//!
//! ```no_run
//! use aof_core::logging::{init_tracing, LogConfig};
//!
//! init_tracing(&LogConfig::debug());
//! tracing::info!("ready");
//! ```

mod types;

pub use types::{LogConfig, LogLevel};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the configured level
/// - Outputs to stderr
///
/// Should be called once at application startup.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter_str()));

    let compact = config.compact.then(|| {
        fmt::layer()
            .compact()
            .with_target(config.show_target)
            .with_writer(std::io::stderr)
    });
    let full = (!config.compact).then(|| {
        fmt::layer()
            .with_target(config.show_target)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(full)
        .init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_strings_parse() {
        for level in [LogLevel::Trace, LogLevel::Info, LogLevel::Error] {
            assert!(EnvFilter::try_new(level.as_filter_str()).is_ok());
        }
    }

    #[test]
    fn test_tracing_can_be_initialized_twice() {
        init_test_tracing();
        init_test_tracing();
        tracing::warn!("visible in test output");
    }
}
