//! Error types for target-process operations
//!
//! These errors stay inside the crate's `try_*` APIs. The sentinel-returning
//! APIs convert them to invalid addresses, zero values or `None`.

use std::fmt;
use thiserror::Error;

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid memory address: {0}")]
    InvalidAddress(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Access denied to process {pid}: {reason}")]
    AccessDenied { pid: u32, reason: String },

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Failed to read memory at {address}: {reason}")]
    ReadFailed { address: String, reason: String },

    #[error("Failed to write memory at {address}: {reason}")]
    WriteFailed { address: String, reason: String },

    #[error("Failed to query memory at {address}: {reason}")]
    QueryFailed { address: String, reason: String },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Pattern not found in memory")]
    PatternNotFound,

    #[error("Invalid pattern format: {0}")]
    InvalidPattern(String),

    #[error("Pointer chain broken at level {level}: {reason}")]
    PointerChainBroken { level: usize, reason: String },

    #[error("Memory protection rejected access at {address}: protection 0x{protect:X}")]
    ProtectionRejected { address: String, protect: u32 },

    #[error("Windows API: {0}")]
    WindowsApi(String),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Creates an access denied error for a process
    pub fn access_denied(pid: u32, reason: impl Into<String>) -> Self {
        MemoryError::AccessDenied {
            pid,
            reason: reason.into(),
        }
    }

    /// Creates a read failed error
    pub fn read_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::ReadFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a write failed error
    pub fn write_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::WriteFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a query failed error
    pub fn query_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::QueryFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a pointer chain broken error
    pub fn pointer_chain_broken(level: usize, reason: impl Into<String>) -> Self {
        MemoryError::PointerChainBroken {
            level,
            reason: reason.into(),
        }
    }

    /// Creates a protection rejection error
    pub fn protection_rejected(address: impl fmt::Display, protect: u32) -> Self {
        MemoryError::ProtectionRejected {
            address: address.to_string(),
            protect,
        }
    }

    /// Whether this came from the protection guard rather than the OS
    pub fn is_guard_rejection(&self) -> bool {
        matches!(self, MemoryError::ProtectionRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::InvalidAddress("0xDEADBEEF".to_string());
        assert_eq!(err.to_string(), "Invalid memory address: 0xDEADBEEF");

        let err = MemoryError::access_denied(1234, "OpenProcess refused");
        assert_eq!(
            err.to_string(),
            "Access denied to process 1234: OpenProcess refused"
        );

        let err = MemoryError::protection_rejected("0x1000", 0x101);
        assert_eq!(
            err.to_string(),
            "Memory protection rejected access at 0x1000: protection 0x101"
        );
    }

    #[test]
    fn test_helper_methods() {
        match MemoryError::read_failed("0xABCD", "invalid page") {
            MemoryError::ReadFailed { address, reason } => {
                assert_eq!(address, "0xABCD");
                assert_eq!(reason, "invalid page");
            }
            _ => panic!("Wrong error type"),
        }

        match MemoryError::pointer_chain_broken(2, "unmapped") {
            MemoryError::PointerChainBroken { level, reason } => {
                assert_eq!(level, 2);
                assert_eq!(reason, "unmapped");
            }
            _ => panic!("Wrong error type"),
        }

        assert!(MemoryError::protection_rejected("0x0", 1).is_guard_rejection());
        assert!(!MemoryError::PatternNotFound.is_guard_rejection());
    }
}
