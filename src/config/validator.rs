//! Configuration validator
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{Config, ConfigError, LoggingConfig, MemoryConfig, ScannerConfig, TargetConfig};
use crate::memory::Signature;

/// Largest scan chunk accepted (16MB)
const MAX_CHUNK_SIZE: usize = 16777216;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_target(&config.target)?;
        Self::validate_memory(&config.memory)?;
        Self::validate_scanner(&config.scanner)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    /// Validates target selection. The process name itself may be supplied
    /// on the command line instead.
    fn validate_target(target: &TargetConfig) -> Result<(), ConfigError> {
        if target.module.as_deref() == Some("") {
            return Err(ConfigError::Invalid(
                "Target module cannot be empty".to_string(),
            ));
        }

        if let Some(signature) = &target.signature {
            signature.parse::<Signature>().map_err(|e| {
                ConfigError::Invalid(format!("Target signature is malformed: {}", e))
            })?;

            if target.module.is_none() {
                return Err(ConfigError::Invalid(
                    "A signature needs a module to scan".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Validates memory configuration
    fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
        if memory.max_read_size == 0 {
            return Err(ConfigError::Invalid(
                "Maximum read size must be greater than 0".to_string(),
            ));
        }

        if memory.text_read_len == 0 || memory.text_read_len > memory.max_read_size {
            return Err(ConfigError::Invalid(
                "Text read length must be between 1 and the maximum read size".to_string(),
            ));
        }

        if memory.max_read_size > 104857600 {
            tracing::warn!(
                max_read_size = memory.max_read_size,
                "maximum read size exceeds 100MB"
            );
        }

        Ok(())
    }

    /// Validates scanner configuration
    fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
        if scanner.max_threads == 0 {
            return Err(ConfigError::Invalid(
                "Scanner threads must be at least 1".to_string(),
            ));
        }

        if scanner.max_threads > 128 {
            return Err(ConfigError::Invalid(
                "Scanner threads cannot exceed 128".to_string(),
            ));
        }

        // Power of 2 keeps chunks page aligned
        if scanner.chunk_size == 0 || !scanner.chunk_size.is_power_of_two() {
            return Err(ConfigError::Invalid(
                "Chunk size must be a power of 2".to_string(),
            ));
        }

        if scanner.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid(
                "Chunk size cannot exceed 16MB".to_string(),
            ));
        }

        if scanner.parallel_threshold == 0 {
            return Err(ConfigError::Invalid(
                "Parallel threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_signature() {
        let mut config = Config::default();
        config.target.module = Some("engine.dll".to_string());
        config.target.signature = Some("48 GG".to_string());
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("signature"));

        config.target.signature = Some("48 ? 8B".to_string());
        assert!(validate_config(&config).is_ok());

        config.target.module = None;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_module() {
        let mut config = Config::default();
        config.target.module = Some(String::new());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_memory_limits() {
        let mut config = Config::default();
        config.memory.max_read_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.memory.text_read_len = 0;
        assert!(validate_config(&config).is_err());

        config.memory.text_read_len = config.memory.max_read_size + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_thread_count() {
        let mut config = Config::default();
        config.scanner.max_threads = 0;
        assert!(validate_config(&config).is_err());

        config.scanner.max_threads = 129;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut config = Config::default();
        config.scanner.chunk_size = 0;
        assert!(validate_config(&config).is_err());

        config.scanner.chunk_size = 1000; // Not power of 2
        assert!(validate_config(&config).is_err());

        config.scanner.chunk_size = MAX_CHUNK_SIZE * 2;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("log level"));
    }

    #[test]
    fn test_edge_cases() {
        let mut config = Config::default();

        config.scanner.max_threads = 1;
        config.scanner.chunk_size = 1;
        config.scanner.parallel_threshold = 1;
        config.memory.max_read_size = 1;
        config.memory.text_read_len = 1;
        assert!(validate_config(&config).is_ok());

        config.scanner.max_threads = 128;
        config.scanner.chunk_size = MAX_CHUNK_SIZE;
        config.memory.max_read_size = 104857600;
        assert!(validate_config(&config).is_ok());
    }
}
