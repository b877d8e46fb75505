//! Configuration module for cityguard

use crate::discovery::TableFormat;
use crate::top_ports::exposure_ports;
use crate::GuardError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-user configuration file looked up in the home directory
pub const DEFAULT_CONFIG_FILE: &str = ".cityguard.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub scanner: ScannerConfig,
    pub discovery: DiscoveryConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
}

/// Port exposure probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Candidate ports probed when the operator gives none
    pub ports: Vec<u16>,

    /// Per-port connect deadline in milliseconds
    pub timeout_ms: u64,

    /// Upper bound on probes in flight at once
    pub max_concurrency: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            ports: exposure_ports(),
            timeout_ms: 50,
            max_concurrency: 256,
        }
    }
}

impl ScannerConfig {
    /// Set the ports to probe
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Set the per-port timeout in milliseconds
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Neighbor table command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Table layout; `None` picks the layout of the running OS
    pub format: Option<TableFormat>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            command: "arp".to_string(),
            args: vec!["-a".to_string()],
            format: None,
        }
    }
}

impl DiscoveryConfig {
    pub fn table_format(&self) -> TableFormat {
        self.format.unwrap_or_else(TableFormat::native)
    }
}

/// Classifier artifact settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Model.onnx"),
            intra_threads: num_cpus::get().clamp(1, 4),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Parse the configured level, falling back to `info` on unknown names
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl GuardConfig {
    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            GuardError::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: GuardConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Default per-user config location (`~/.cityguard.toml`)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE)
    }

    /// Load an explicit file, or the per-user file when it exists, or defaults
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_toml_file(path);
        }

        let user_config = Self::default_path();
        if user_config.exists() {
            let config = Self::from_toml_file(&user_config)?;
            log::info!("Loaded config from {}", user_config.display());
            return Ok(config);
        }

        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.scanner.ports.is_empty() {
            return Err(GuardError::ConfigError("scanner.ports cannot be empty".to_string()));
        }

        if self.scanner.ports.contains(&0) {
            return Err(GuardError::ConfigError("scanner.ports cannot contain port 0".to_string()));
        }

        if self.scanner.timeout_ms == 0 {
            return Err(GuardError::ConfigError("scanner.timeout_ms must be greater than 0".to_string()));
        }

        if self.scanner.max_concurrency == 0 {
            return Err(GuardError::ConfigError(
                "scanner.max_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.discovery.command.trim().is_empty() {
            return Err(GuardError::ConfigError("discovery.command cannot be empty".to_string()));
        }

        if self.model.path.as_os_str().is_empty() {
            return Err(GuardError::ConfigError("model.path cannot be empty".to_string()));
        }

        Ok(())
    }
}
