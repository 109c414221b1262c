//! Configuration for the dataflow runtime
//!
//! Settings are read from a TOML file. Every field has a default, so an empty
//! or partial file is valid.
//!
//! # Config Location
//!
//! `load_or_default()` looks in the platform config directory:
//! - **Linux**: `~/.config/dev.hxyulin.dataflow-rt/dataflow.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.dataflow-rt/dataflow.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.dataflow-rt\dataflow.toml`
//!
//! # Example
//!
//! ```toml
//! [runtime]
//! default_queue_capacity = 10
//! restart_delay_ms = 0
//!
//! [task]
//! stack_size = 262144
//! priority = 10
//! core = 0
//!
//! [logging]
//! filter = "info,dataflow_rt=debug"
//! directory = "/var/log/dataflow"
//!
//! [state]
//! path = "/var/lib/dataflow/retained.json"
//! ```

use crate::dataflow::port::DEFAULT_QUEUE_CAPACITY;
use crate::error::{DataflowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.dataflow-rt";

/// Config filename
pub const CONFIG_FILE: &str = "dataflow.toml";

/// Default task stack size in bytes
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Default task priority
pub const DEFAULT_PRIORITY: u8 = 10;

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub runtime: SchedulerConfig,

    /// Task parameters applied to every component unless overridden
    #[serde(default)]
    pub task: TaskConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub state: StateConfig,
}

/// Scheduler behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Capacity of input ports created without an explicit size. Pass it to
    /// the components' `with_capacity` constructors or to
    /// `PortSet::with_default_capacity`.
    pub default_queue_capacity: usize,

    /// Pause before calling `process()` again after it returned
    pub restart_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            restart_delay_ms: 0,
        }
    }
}

impl SchedulerConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Platform parameters for one component task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Stack budget in bytes
    pub stack_size: usize,

    /// Scheduling priority hint
    pub priority: u8,

    /// Core affinity hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<usize>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            priority: DEFAULT_PRIORITY,
            core: None,
        }
    }
}

impl TaskConfig {
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = bytes;
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn pinned_to(mut self, core: usize) -> Self {
        self.core = Some(core);
        self
    }
}

/// Logging settings for the binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,

    /// Directory for a daily rolling log file; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            directory: None,
        }
    }
}

/// Where retained state is kept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataflowError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            DataflowError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DataflowError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| DataflowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            DataflowError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values no platform can run with
    pub fn validate(&self) -> Result<()> {
        if self.runtime.default_queue_capacity == 0 {
            return Err(DataflowError::Config(
                "runtime.default_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.task.stack_size < 16 * 1024 {
            return Err(DataflowError::Config(format!(
                "task.stack_size of {} bytes is too small",
                self.task.stack_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.runtime.default_queue_capacity, 10);
        assert_eq!(config.runtime.restart_delay(), Duration::ZERO);
        assert_eq!(config.task.stack_size, DEFAULT_STACK_SIZE);
        assert_eq!(config.task.priority, 10);
        assert_eq!(config.task.core, None);
        assert_eq!(config.logging.filter, "info");
        assert!(config.state.path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [task]
            core = 1

            [runtime]
            restart_delay_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.task.core, Some(1));
        assert_eq!(config.task.priority, DEFAULT_PRIORITY);
        assert_eq!(config.runtime.restart_delay(), Duration::from_millis(250));
        assert_eq!(config.runtime.default_queue_capacity, 10);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: RuntimeConfig = toml::from_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = RuntimeConfig::default();
        config.task = TaskConfig::default().with_priority(5).pinned_to(1);
        config.logging.directory = Some(dir.path().join("logs"));
        config.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_zero_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[runtime]\ndefault_queue_capacity = 0\n").unwrap();

        assert!(matches!(
            RuntimeConfig::load(&path),
            Err(DataflowError::Config(_))
        ));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[task\nstack_size = 1").unwrap();

        let err = RuntimeConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        assert!(RuntimeConfig::load(dir.path().join("absent.toml")).is_err());
    }
}
