//! Default configuration values

use crate::memory::{DEFAULT_MAX_READ_SIZE, DEFAULT_TEXT_READ_LEN};
use crate::process::AccessLevel;
use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub target: TargetDefaults,
    pub memory: MemoryDefaults,
    pub scanner: ScannerDefaults,
    pub logging: LoggingDefaults,
}

/// Default target selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDefaults {
    pub access: AccessLevel,
}

/// Default memory access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDefaults {
    pub memory_check: bool,
    pub text_read_len: usize,
    pub max_read_size: usize,
}

/// Default scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub chunk_size: usize,
    pub parallel: bool,
    pub parallel_threshold: usize,
    pub max_threads: usize,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
    pub debug: bool,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        target: TargetDefaults {
            access: AccessLevel::All,
        },
        memory: MemoryDefaults {
            memory_check: false,
            text_read_len: DEFAULT_TEXT_READ_LEN,
            max_read_size: DEFAULT_MAX_READ_SIZE,
        },
        scanner: ScannerDefaults {
            chunk_size: 65536, // 64KB
            parallel: true,
            parallel_threshold: 1048576, // 1MB
            max_threads: num_cpus::get().min(8),
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
            debug: false,
        },
    }
}
