//! Configuration loader
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::core::types::Offset;
use crate::memory::ScanSettings;
use crate::process::AccessLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "external-memory.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What to attach to and resolve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Executable name, e.g. `game.exe`
    #[serde(default)]
    pub process: String,
    /// Module to resolve; the signature is scanned inside it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Pointer chain applied to the module base or signature match
    #[serde(default)]
    pub offsets: Vec<Offset>,
    #[serde(default = "default_access")]
    pub access: AccessLevel,
}

/// Memory access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_memory_check")]
    pub memory_check: bool,
    #[serde(default = "default_text_read_len")]
    pub text_read_len: usize,
    #[serde(default = "default_max_read_size")]
    pub max_read_size: usize,
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Route swallowed failures to the diagnostic sink
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Scanner settings derived from the `[scanner]` and `[memory]` sections
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            chunk_size: self.scanner.chunk_size,
            parallel: self.scanner.parallel,
            parallel_threshold: self.scanner.parallel_threshold,
            memory_check: self.memory.memory_check,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is missing
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(path)) => {
                tracing::debug!(%path, "no configuration file, using defaults");
                Ok(Config::default())
            }
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new(DEFAULT_CONFIG_FILE).load_or_default()
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            process: String::new(),
            module: None,
            signature: None,
            offsets: Vec::new(),
            access: default_access(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        let defaults = default_config();
        MemoryConfig {
            memory_check: defaults.memory.memory_check,
            text_read_len: defaults.memory.text_read_len,
            max_read_size: defaults.memory.max_read_size,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        let defaults = default_config();
        ScannerConfig {
            chunk_size: defaults.scanner.chunk_size,
            parallel: defaults.scanner.parallel,
            parallel_threshold: defaults.scanner.parallel_threshold,
            max_threads: defaults.scanner.max_threads,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let defaults = default_config();
        LoggingConfig {
            level: defaults.logging.level,
            debug: defaults.logging.debug,
        }
    }
}

// Individual field defaults
fn default_access() -> AccessLevel {
    default_config().target.access
}

fn default_memory_check() -> bool {
    default_config().memory.memory_check
}

fn default_text_read_len() -> usize {
    default_config().memory.text_read_len
}

fn default_max_read_size() -> usize {
    default_config().memory.max_read_size
}

fn default_chunk_size() -> usize {
    default_config().scanner.chunk_size
}

fn default_parallel() -> bool {
    default_config().scanner.parallel
}

fn default_parallel_threshold() -> usize {
    default_config().scanner.parallel_threshold
}

fn default_max_threads() -> usize {
    default_config().scanner.max_threads
}

fn default_log_level() -> String {
    default_config().logging.level
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.target.process.is_empty());
        assert_eq!(config.target.access, AccessLevel::All);
        assert_eq!(config.memory.text_read_len, 200);
        assert!(config.scanner.max_threads > 0);
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let result = loader.load();
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_or_default() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let config = loader.load_or_default().unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_or_default_keeps_parse_errors() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[target\nprocess = ").unwrap();

        let result = ConfigLoader::new(&config_path).load_or_default();
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::default();
        config.target.process = "game.exe".to_string();
        config.target.offsets = vec![0x10, -8];
        let loader = ConfigLoader::new(&config_path);

        loader.save(&config).unwrap();
        assert!(config_path.exists());

        let loaded = loader.load().unwrap();
        assert_eq!(loaded.target.process, "game.exe");
        assert_eq!(loaded.target.offsets, vec![0x10, -8]);
        assert_eq!(loaded.target.module, None);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [target]
            process = "game.exe"
            module = "engine.dll"
            signature = "48 8B ? ? 89"
            offsets = [0x1C, 0x8]
            access = "read"

            [memory]
            memory_check = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.target.module.as_deref(), Some("engine.dll"));
        assert_eq!(config.target.offsets, vec![0x1C, 0x8]);
        assert_eq!(config.target.access, AccessLevel::Read);
        assert!(config.memory.memory_check);
        assert_eq!(config.memory.text_read_len, 200);
        assert_eq!(config.scanner.chunk_size, 65536);
    }

    #[test]
    fn test_scan_settings() {
        let mut config = Config::default();
        config.memory.memory_check = true;
        config.scanner.chunk_size = 4096;

        let settings = config.scan_settings();
        assert_eq!(settings.chunk_size, 4096);
        assert!(settings.memory_check);
        assert_eq!(settings.parallel_threshold, 1048576);
    }
}
