//! Settings struct with TOML-based sections.
//!
//! Each section maps to a TOML table. Missing keys fall back to defaults,
//! so a partial file is always valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::correlation::CorrelationParams;
use crate::filters::{BandpassParams, LowpassParams, SpectralBandpassParams, TaperParams};
use crate::logging::LogLevel;
use crate::task::{ExecutionMode, TaskConfig};

use super::manager::{ConfigError, ConfigResult};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Cache root and per-stage read/write selection.
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub correlation: CorrelationParams,

    /// Default parameters for the filter stages.
    #[serde(default)]
    pub filters: FilterSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,
}

/// Which stages read from or write to the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Directory all stage caches live under.
    #[serde(default = "default_cache_root")]
    pub root: PathBuf,

    /// Stages that try the cache before computing.
    #[serde(default)]
    pub read: Vec<String>,

    /// Stages that persist their results.
    #[serde(default)]
    pub write: Vec<String>,

    /// Stages that pass input through untouched.
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_cache_root() -> PathBuf {
    PathBuf::from("anxcor_cache")
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: default_cache_root(),
            read: Vec::new(),
            write: Vec::new(),
            disabled: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(default)]
    pub lowpass: LowpassParams,
    #[serde(default)]
    pub bandpass: BandpassParams,
    #[serde(default)]
    pub spectral_bandpass: SpectralBandpassParams,
    #[serde(default)]
    pub taper: TaperParams,
}

impl Settings {
    /// Check that no stage is both read from and written to.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(stage) = self.cache.read.iter().find(|s| self.cache.write.contains(s)) {
            return Err(ConfigError::Conflict(stage.clone()));
        }
        Ok(())
    }

    /// Execution mode the settings select for `stage`.
    pub fn execution_mode(&self, stage: &str) -> ConfigResult<ExecutionMode> {
        let cache = &self.cache;
        let listed = |list: &[String]| list.iter().any(|s| s == stage);

        if listed(&cache.read) && listed(&cache.write) {
            return Err(ConfigError::Conflict(stage.to_string()));
        }
        let mode = if listed(&cache.disabled) {
            ExecutionMode::Disabled
        } else if listed(&cache.read) {
            ExecutionMode::ReadCache(cache.root.clone())
        } else if listed(&cache.write) {
            ExecutionMode::WriteCache(cache.root.clone())
        } else {
            ExecutionMode::Compute
        };
        Ok(mode)
    }

    /// Task configuration for `stage`.
    pub fn task_config(&self, stage: &str) -> ConfigResult<TaskConfig> {
        Ok(TaskConfig::new(self.execution_mode(stage)?))
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache.root
    }
}
