//! Kernel32.dll bindings for process and memory operations

use crate::core::types::{
    Address, MemoryError, MemoryResult, Protection, RegionInfo, RegionState,
};
use crate::windows::utils::{last_error_description, ErrorCode};
use std::mem;
use winapi::shared::minwindef::{BOOL, FALSE, LPCVOID, LPVOID};
use winapi::um::handleapi::CloseHandle;
use winapi::um::memoryapi::{ReadProcessMemory, VirtualQueryEx, WriteProcessMemory};
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::winnt::{HANDLE, MEMORY_BASIC_INFORMATION};
use winapi::um::wow64apiset::IsWow64Process;

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> MemoryResult<HANDLE> {
    let handle = unsafe { OpenProcess(desired_access, FALSE, pid) };
    if !handle.is_null() {
        return Ok(handle);
    }

    match ErrorCode::last_error() {
        ErrorCode::AccessDenied => Err(MemoryError::access_denied(pid, last_error_description())),
        _ => Err(MemoryError::ProcessNotFound(format!(
            "PID {}: {}",
            pid,
            last_error_description()
        ))),
    }
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle that is not closed elsewhere
pub unsafe fn close_handle(handle: HANDLE) -> MemoryResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(MemoryError::WindowsApi(format!(
            "Failed to close handle: {}",
            last_error_description()
        )))
    } else {
        Ok(())
    }
}

/// Safe wrapper for ReadProcessMemory. Partial reads are failures.
///
/// # Safety
/// The handle must be a valid process handle with PROCESS_VM_READ
pub unsafe fn read_process_memory(
    handle: HANDLE,
    address: usize,
    buffer: &mut [u8],
) -> MemoryResult<()> {
    let mut bytes_read = 0;

    let result = ReadProcessMemory(
        handle,
        address as LPCVOID,
        buffer.as_mut_ptr() as LPVOID,
        buffer.len(),
        &mut bytes_read,
    );

    match transfer_failure(result != FALSE, bytes_read, buffer.len()) {
        Some(reason) => Err(MemoryError::read_failed(format!("0x{:X}", address), reason)),
        None => Ok(()),
    }
}

/// Safe wrapper for WriteProcessMemory
///
/// # Safety
/// The handle must be a valid process handle with PROCESS_VM_WRITE and
/// PROCESS_VM_OPERATION
pub unsafe fn write_process_memory(handle: HANDLE, address: usize, data: &[u8]) -> MemoryResult<()> {
    let mut bytes_written = 0;

    let result = WriteProcessMemory(
        handle,
        address as LPVOID,
        data.as_ptr() as LPCVOID,
        data.len(),
        &mut bytes_written,
    );

    match transfer_failure(result != FALSE, bytes_written, data.len()) {
        Some(reason) => Err(MemoryError::write_failed(format!("0x{:X}", address), reason)),
        None => Ok(()),
    }
}

/// Why a Read/WriteProcessMemory call did not copy the whole buffer. A call
/// that succeeded short leaves the last error untouched, so it gets its own reason.
fn transfer_failure(succeeded: bool, transferred: usize, expected: usize) -> Option<String> {
    if !succeeded {
        Some(last_error_description())
    } else if transferred != expected {
        Some(format!("partial copy ({} of {} bytes)", transferred, expected))
    } else {
        None
    }
}

/// Safe wrapper for VirtualQueryEx
///
/// # Safety
/// The handle must be a valid process handle with PROCESS_QUERY_INFORMATION
pub unsafe fn virtual_query_ex(handle: HANDLE, address: usize) -> MemoryResult<RegionInfo> {
    let mut mbi: MEMORY_BASIC_INFORMATION = mem::zeroed();

    let result = VirtualQueryEx(
        handle,
        address as LPCVOID,
        &mut mbi,
        mem::size_of::<MEMORY_BASIC_INFORMATION>(),
    );

    if result == 0 {
        return Err(MemoryError::query_failed(
            format!("0x{:X}", address),
            last_error_description(),
        ));
    }

    Ok(RegionInfo {
        base_address: Address::new(mbi.BaseAddress as usize),
        size: mbi.RegionSize,
        protection: Protection::new(mbi.Protect),
        state: RegionState::from_raw(mbi.State),
    })
}

/// Whether the process runs under WoW64 (32-bit on 64-bit Windows)
///
/// # Safety
/// The handle must be a valid process handle
pub unsafe fn is_wow64_process(handle: HANDLE) -> MemoryResult<bool> {
    let mut wow64: BOOL = FALSE;
    if IsWow64Process(handle, &mut wow64) == FALSE {
        return Err(MemoryError::WindowsApi(format!(
            "Failed to query WoW64 status: {}",
            last_error_description()
        )));
    }
    Ok(wow64 != FALSE)
}
