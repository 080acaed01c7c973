//! ToolHelp32 snapshots of running processes and loaded modules

use crate::core::types::{Address, MemoryError, MemoryResult, ModuleDescriptor, ProcessEntry};
use crate::windows::utils::{last_error_description, wide_to_string};
use std::mem;
use winapi::shared::minwindef::FALSE;
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::tlhelp32::{
    CreateToolhelp32Snapshot, Module32FirstW, Module32NextW, Process32FirstW, Process32NextW,
    MODULEENTRY32W, PROCESSENTRY32W, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};
use winapi::um::winnt::HANDLE;

/// Owned snapshot handle, closed on drop
struct Snapshot {
    handle: HANDLE,
}

impl Snapshot {
    fn new(flags: u32, pid: u32) -> MemoryResult<Self> {
        let handle = unsafe { CreateToolhelp32Snapshot(flags, pid) };
        if handle.is_null() || handle == INVALID_HANDLE_VALUE {
            return Err(MemoryError::WindowsApi(format!(
                "Failed to create snapshot (flags 0x{:X}, pid {}): {}",
                flags,
                pid,
                last_error_description()
            )));
        }
        Ok(Snapshot { handle })
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

/// Snapshot of all running processes
pub fn process_entries() -> MemoryResult<Vec<ProcessEntry>> {
    let snapshot = Snapshot::new(TH32CS_SNAPPROCESS, 0)?;
    let mut entries = Vec::new();

    unsafe {
        let mut entry: PROCESSENTRY32W = mem::zeroed();
        entry.dwSize = mem::size_of::<PROCESSENTRY32W>() as u32;

        let mut more = Process32FirstW(snapshot.handle, &mut entry);
        while more != FALSE {
            entries.push(ProcessEntry {
                pid: entry.th32ProcessID,
                name: wide_to_string(&entry.szExeFile),
            });
            more = Process32NextW(snapshot.handle, &mut entry);
        }
    }

    Ok(entries)
}

/// Snapshot of the modules loaded in `pid`, in load order
pub fn module_entries(pid: u32) -> MemoryResult<Vec<ModuleDescriptor>> {
    let snapshot = Snapshot::new(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid)?;
    let mut modules = Vec::new();

    unsafe {
        let mut entry: MODULEENTRY32W = mem::zeroed();
        entry.dwSize = mem::size_of::<MODULEENTRY32W>() as u32;

        let mut more = Module32FirstW(snapshot.handle, &mut entry);
        while more != FALSE {
            modules.push(ModuleDescriptor::new(
                wide_to_string(&entry.szModule),
                Address::new(entry.modBaseAddr as usize),
                entry.modBaseSize as usize,
            ));
            more = Module32NextW(snapshot.handle, &mut entry);
        }
    }

    Ok(modules)
}
