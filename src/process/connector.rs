//! Attach to a running process by executable name

use super::{ProcessAccess, ProcessMemory};
use crate::core::types::{
    Address, MemoryError, MemoryResult, ModuleDescriptor, ProcessArchitecture, ProcessId,
    RegionInfo,
};
use crate::windows::bindings::{kernel32, toolhelp};
use crate::windows::types::Handle;
use std::fmt;
use tracing::{debug, warn};

/// Owns the handle to one target process.
///
/// A connector whose attach failed holds a null handle and pid 0; every
/// primitive then reports [`MemoryError::InvalidHandle`]. The handle is
/// released exactly once when the connector is dropped.
pub struct ProcessConnector {
    handle: Handle,
    pid: ProcessId,
    access: ProcessAccess,
    architecture: ProcessArchitecture,
}

impl ProcessConnector {
    /// Attach to `name` (e.g. "game.exe") with all access rights.
    /// Check [`ProcessMemory::is_valid`] before use.
    pub fn attach(name: &str) -> Self {
        Self::attach_with(name, ProcessAccess::ALL_ACCESS)
    }

    /// Attach with specific access rights; failures leave the connector detached
    pub fn attach_with(name: &str, access: ProcessAccess) -> Self {
        match Self::try_attach(name, access) {
            Ok(connector) => connector,
            Err(err) => {
                warn!(process = name, error = %err, "failed to attach to process");
                Self::detached(access)
            }
        }
    }

    /// Attach, reporting why it failed
    pub fn try_attach(name: &str, access: ProcessAccess) -> MemoryResult<Self> {
        let pid = find_process_id(name)?;
        let raw = kernel32::open_process(pid, access.value())?;
        let handle = Handle::new(raw);

        let architecture = match unsafe { kernel32::is_wow64_process(handle.raw()) } {
            Ok(true) => ProcessArchitecture::X86,
            Ok(false) => native_architecture(),
            Err(err) => {
                debug!(pid, error = %err, "could not determine target bitness");
                ProcessArchitecture::Unknown
            }
        };

        debug!(process = name, pid, ?architecture, "attached to process");
        Ok(ProcessConnector {
            handle,
            pid,
            access,
            architecture,
        })
    }

    pub(crate) fn detached(access: ProcessAccess) -> Self {
        ProcessConnector {
            handle: Handle::null(),
            pid: 0,
            access,
            architecture: ProcessArchitecture::Unknown,
        }
    }

    /// The access rights that were requested
    pub fn access(&self) -> ProcessAccess {
        self.access
    }

    fn ensure_valid(&self) -> MemoryResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(MemoryError::InvalidHandle(
                "Process handle is null".to_string(),
            ))
        }
    }
}

impl ProcessMemory for ProcessConnector {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn is_valid(&self) -> bool {
        !self.handle.is_null() && self.pid != 0
    }

    fn architecture(&self) -> ProcessArchitecture {
        self.architecture
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleDescriptor>> {
        self.ensure_valid()?;
        toolhelp::module_entries(self.pid)
    }

    fn query_region(&self, address: Address) -> MemoryResult<RegionInfo> {
        self.ensure_valid()?;
        let raw = address
            .get()
            .ok_or_else(|| MemoryError::InvalidAddress(address.to_string()))?;
        unsafe { kernel32::virtual_query_ex(self.handle.raw(), raw) }
    }

    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<()> {
        self.ensure_valid()?;
        let raw = address
            .get()
            .ok_or_else(|| MemoryError::InvalidAddress(address.to_string()))?;
        unsafe { kernel32::read_process_memory(self.handle.raw(), raw, buffer) }
    }

    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        self.ensure_valid()?;
        let raw = address
            .get()
            .ok_or_else(|| MemoryError::InvalidAddress(address.to_string()))?;
        unsafe { kernel32::write_process_memory(self.handle.raw(), raw, data) }
    }
}

impl fmt::Debug for ProcessConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConnector")
            .field("pid", &self.pid)
            .field("valid", &self.is_valid())
            .field("access", &format!("0x{:X}", self.access.value()))
            .field("architecture", &self.architecture)
            .finish()
    }
}

/// First process whose executable name equals `name` exactly
pub fn find_process_id(name: &str) -> MemoryResult<ProcessId> {
    toolhelp::process_entries()?
        .into_iter()
        .find(|entry| entry.pid != 0 && entry.name == name)
        .map(|entry| entry.pid)
        .ok_or_else(|| MemoryError::ProcessNotFound(name.to_string()))
}

fn native_architecture() -> ProcessArchitecture {
    if cfg!(target_pointer_width = "64") {
        ProcessArchitecture::X64
    } else {
        ProcessArchitecture::X86
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current_exe_name() -> String {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .expect("test binary has a file name")
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_attach_missing_process_is_invalid() {
        let connector = ProcessConnector::attach("no-such-process-123456.exe");
        assert!(!connector.is_valid());
        assert_eq!(connector.pid(), 0);

        let mut buffer = [0u8; 4];
        assert!(matches!(
            connector.read_memory(Address::new(0x1000), &mut buffer),
            Err(MemoryError::InvalidHandle(_))
        ));
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_try_attach_reports_not_found() {
        let result =
            ProcessConnector::try_attach("no-such-process-123456.exe", ProcessAccess::ALL_ACCESS);
        assert!(matches!(result, Err(MemoryError::ProcessNotFound(_))));
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_attach_self() {
        let connector = ProcessConnector::attach(&current_exe_name());
        assert!(connector.is_valid());
        assert_ne!(connector.pid(), 0);
        assert!(!connector.modules().unwrap().is_empty());
    }

    #[test]
    fn test_detached_debug_format() {
        let connector = ProcessConnector::detached(ProcessAccess::VM_READ);
        let debug = format!("{:?}", connector);
        assert!(debug.contains("pid: 0"));
        assert!(debug.contains("valid: false"));
        assert!(debug.contains("0x10"));
    }
}
