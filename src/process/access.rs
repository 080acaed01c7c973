//! Process access rights requested when attaching

use serde::{Deserialize, Serialize};

/// Access rights for process handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessAccess {
    value: u32,
}

impl ProcessAccess {
    /// All possible access rights
    pub const ALL_ACCESS: Self = Self { value: 0x1FFFFF };
    /// Query information access
    pub const QUERY_INFORMATION: Self = Self { value: 0x0400 };
    /// Read memory access
    pub const VM_READ: Self = Self { value: 0x0010 };
    /// Write memory access
    pub const VM_WRITE: Self = Self { value: 0x0020 };
    /// Required alongside VM_WRITE
    pub const VM_OPERATION: Self = Self { value: 0x0008 };

    /// Combine access rights
    pub fn combine(rights: &[Self]) -> Self {
        let value = rights.iter().fold(0, |acc, right| acc | right.value);
        Self { value }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn contains(&self, other: Self) -> bool {
        self.value & other.value == other.value
    }
}

impl Default for ProcessAccess {
    fn default() -> Self {
        ProcessAccess::ALL_ACCESS
    }
}

/// Named access levels accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    All,
    ReadWrite,
    Read,
}

impl From<AccessLevel> for ProcessAccess {
    fn from(level: AccessLevel) -> Self {
        match level {
            AccessLevel::All => ProcessAccess::ALL_ACCESS,
            AccessLevel::ReadWrite => ProcessAccess::combine(&[
                ProcessAccess::QUERY_INFORMATION,
                ProcessAccess::VM_READ,
                ProcessAccess::VM_WRITE,
                ProcessAccess::VM_OPERATION,
            ]),
            AccessLevel::Read => {
                ProcessAccess::combine(&[ProcessAccess::QUERY_INFORMATION, ProcessAccess::VM_READ])
            }
        }
    }
}
