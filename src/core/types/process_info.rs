//! Process and module information types

use super::{Address, ProcessId};
use serde::{Deserialize, Serialize};

/// Bitness of the target process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessArchitecture {
    X86,
    X64,
    Unknown,
}

impl ProcessArchitecture {
    /// Returns the pointer size for this architecture
    pub fn pointer_size(&self) -> usize {
        match self {
            ProcessArchitecture::X86 => 4,
            ProcessArchitecture::X64 => 8,
            ProcessArchitecture::Unknown => std::mem::size_of::<usize>(),
        }
    }
}

/// A loaded image inside the target process, captured at query time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub base_address: Address,
    pub size: usize,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, base_address: Address, size: usize) -> Self {
        ModuleDescriptor {
            name: name.into(),
            base_address,
            size,
        }
    }

    /// Gets the end address of the module image
    pub fn end_address(&self) -> Address {
        self.base_address.add(self.size)
    }

    /// Checks if an address is within this module
    pub fn contains_address(&self, address: Address) -> bool {
        match (address.get(), self.base_address.get(), self.end_address().get()) {
            (Some(addr), Some(base), Some(end)) => addr >= base && addr < end,
            _ => false,
        }
    }
}

/// Basic facts about a running process found by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: ProcessId,
    pub name: String,
}
