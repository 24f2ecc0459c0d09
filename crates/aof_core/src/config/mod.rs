//! Configuration management.
//!
//! This module provides:
//! - TOML-based configuration with `[search]`, `[features]` and `[logging]` sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load
//!
//! # Example
//!
//! ```no_run
//! use aof_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/offset.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Window: {}s", config.settings().search.window_seconds);
//!
//! config.settings_mut().search.passing_score = 10.0;
//! config.update_section(ConfigSection::Search).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, FeatureSettings, LoggingSettings, SearchSettings, Settings, SliceFailurePolicy,
};
