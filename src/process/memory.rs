//! The OS primitives every higher-level component is built on

use crate::core::types::{
    Address, MemoryResult, ModuleDescriptor, ProcessArchitecture, ProcessId, RegionInfo,
};

/// Access to one target process's address space.
///
/// Implemented by [`ProcessConnector`](crate::process::ProcessConnector) on
/// Windows and by [`MockProcess`](crate::memory::mock::MockProcess) for tests.
/// Implementations report failures as errors; the sentinel policy lives in the
/// components layered above.
pub trait ProcessMemory {
    /// Identifier of the target, 0 when not attached
    fn pid(&self) -> ProcessId;

    /// Whether the underlying handle can be used
    fn is_valid(&self) -> bool;

    fn architecture(&self) -> ProcessArchitecture {
        ProcessArchitecture::Unknown
    }

    /// Fresh snapshot of loaded modules, in load order
    fn modules(&self) -> MemoryResult<Vec<ModuleDescriptor>>;

    /// Region containing `address`
    fn query_region(&self, address: Address) -> MemoryResult<RegionInfo>;

    /// Fill `buffer` from `address`. Partial reads are errors.
    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<()>;

    /// Write all of `data` at `address`
    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<()>;
}

impl<P: ProcessMemory + ?Sized> ProcessMemory for &P {
    fn pid(&self) -> ProcessId {
        (**self).pid()
    }

    fn is_valid(&self) -> bool {
        (**self).is_valid()
    }

    fn architecture(&self) -> ProcessArchitecture {
        (**self).architecture()
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleDescriptor>> {
        (**self).modules()
    }

    fn query_region(&self, address: Address) -> MemoryResult<RegionInfo> {
        (**self).query_region(address)
    }

    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<()> {
        (**self).read_memory(address, buffer)
    }

    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        (**self).write_memory(address, data)
    }
}
