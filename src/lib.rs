//! external-memory: read, write and scan the memory of another process
//!
//! Attach to a process by executable name, resolve module bases and pointer
//! chains, read and write typed values behind an optional protection guard,
//! and locate wildcard byte signatures. Failures surface as sentinels
//! (invalid [`Address`], zero values, `None`) with details routed to a
//! [`DiagnosticSink`]; every component also has `try_*` forms returning
//! [`MemoryResult`].

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod memory;
pub mod process;
#[cfg(windows)]
pub mod windows;

// Re-export main types from core module
pub use core::types::{
    Address, MemoryError, MemoryResult, ModuleDescriptor, Offset, ProcessArchitecture, ProcessId,
    Protection, RegionInfo, RegionState,
};

pub use diagnostics::{Diagnostic, DiagnosticSink, Diagnostics, FailureKind, NullSink, TracingSink};
pub use memory::{
    AddressResolver, ExternalProcess, MemoryAccessor, Plain, ReadMode, ReadOutput, Signature,
    SignatureScanner,
};
pub use process::{AccessLevel, ProcessAccess, ProcessMemory};

#[cfg(windows)]
pub use process::ProcessConnector;

// Re-export core directly for full access
pub use core::{AUTHORS, VERSION};
