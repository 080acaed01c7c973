//! Page protection snapshots used by the access guard

use super::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Page protection bits as reported by `VirtualQueryEx`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Protection(u32);

impl Protection {
    pub const NOACCESS: u32 = 0x01;
    pub const READONLY: u32 = 0x02;
    pub const READWRITE: u32 = 0x04;
    pub const WRITECOPY: u32 = 0x08;
    pub const EXECUTE: u32 = 0x10;
    pub const EXECUTE_READ: u32 = 0x20;
    pub const EXECUTE_READWRITE: u32 = 0x40;
    pub const EXECUTE_WRITECOPY: u32 = 0x80;
    pub const GUARD: u32 = 0x100;
    pub const NOCACHE: u32 = 0x200;

    pub const fn new(value: u32) -> Self {
        Protection(value)
    }

    pub fn no_access() -> Self {
        Protection(Self::NOACCESS)
    }

    pub fn read_only() -> Self {
        Protection(Self::READONLY)
    }

    pub fn read_write() -> Self {
        Protection(Self::READWRITE)
    }

    pub fn execute_read() -> Self {
        Protection(Self::EXECUTE_READ)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Guarded, non-cached or no-access pages are never touched when a
    /// memory check is requested.
    pub fn is_restricted(&self) -> bool {
        self.0 & (Self::GUARD | Self::NOCACHE | Self::NOACCESS) != 0
    }

    /// Whether the OS lets a read through, ignoring the memory check
    pub fn is_readable(&self) -> bool {
        self.0 & (Self::NOACCESS | Self::GUARD) == 0 && self.0 & 0xFF != Self::EXECUTE
    }

    /// Check if protection allows writing
    pub fn is_writable(&self) -> bool {
        self.0
            & (Self::READWRITE
                | Self::WRITECOPY
                | Self::EXECUTE_READWRITE
                | Self::EXECUTE_WRITECOPY)
            != 0
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.0 & 0xFF {
            Self::NOACCESS => "---",
            Self::READONLY => "r--",
            Self::READWRITE => "rw-",
            Self::WRITECOPY => "rc-",
            Self::EXECUTE => "--x",
            Self::EXECUTE_READ => "r-x",
            Self::EXECUTE_READWRITE => "rwx",
            Self::EXECUTE_WRITECOPY => "rcx",
            _ => "???",
        };
        f.write_str(base)?;
        if self.0 & Self::GUARD != 0 {
            f.write_str("+guard")?;
        }
        if self.0 & Self::NOCACHE != 0 {
            f.write_str("+nocache")?;
        }
        Ok(())
    }
}

/// Allocation state of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionState {
    Commit,
    Reserve,
    Free,
}

impl RegionState {
    pub const MEM_COMMIT: u32 = 0x1000;
    pub const MEM_RESERVE: u32 = 0x2000;

    pub fn from_raw(state: u32) -> Self {
        match state {
            Self::MEM_COMMIT => RegionState::Commit,
            Self::MEM_RESERVE => RegionState::Reserve,
            _ => RegionState::Free,
        }
    }
}

/// Transient view of the region containing a queried address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub base_address: Address,
    pub size: usize,
    pub protection: Protection,
    pub state: RegionState,
}

impl RegionInfo {
    /// Committed with a protection the OS will read
    pub fn is_readable(&self) -> bool {
        self.state == RegionState::Commit && self.protection.is_readable()
    }

    /// Readable under the memory check: committed and not restricted
    pub fn allows_read(&self) -> bool {
        self.state == RegionState::Commit && !self.protection.is_restricted()
    }

    /// Writable under the memory check
    pub fn allows_write(&self) -> bool {
        self.allows_read() && self.protection.is_writable()
    }

    pub fn end_address(&self) -> Address {
        self.base_address.add(self.size)
    }
}
