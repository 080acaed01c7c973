//! Owned process HANDLE, closed exactly once

use crate::windows::bindings::kernel32;
use std::ptr;
use winapi::um::winnt::HANDLE;

/// RAII wrapper around a Windows HANDLE
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    /// Takes ownership of `handle`
    pub fn new(handle: HANDLE) -> Self {
        Handle { handle }
    }

    /// Create a null handle
    pub fn null() -> Self {
        Handle {
            handle: ptr::null_mut(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }

    /// Get the raw handle. Only valid while `self` is alive.
    pub fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            let handle = std::mem::replace(&mut self.handle, ptr::null_mut());
            if let Err(err) = unsafe { kernel32::close_handle(handle) } {
                tracing::warn!(error = %err, "failed to release process handle");
            }
        }
    }
}

// HANDLEs are process-local kernel object references
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}
