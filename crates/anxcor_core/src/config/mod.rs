//! Configuration management.
//!
//! - TOML settings with `[logging]`, `[cache]`, `[correlation]` and
//!   `[filters]` tables
//! - Atomic file writes (write to temp, then rename)
//! - Per-stage execution modes derived from the `[cache]` lists
//!
//! # Example
//!
//! ```no_run
//! use anxcor_core::config::ConfigManager;
//!
//! let mut config = ConfigManager::new("anxcor.toml");
//! config.load_or_create().unwrap();
//!
//! let mode = config.settings().execution_mode("correlate").unwrap();
//! println!("correlate runs as {:?}", mode);
//! ```

mod manager;
mod settings;

pub use manager::{parse, ConfigError, ConfigManager, ConfigResult};
pub use settings::{CacheSettings, FilterSettings, LoggingSettings, Settings};
