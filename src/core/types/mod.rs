//! Core type definitions for external-memory
//!
//! Address wrappers, module and region snapshots, and error types.

mod address;
mod error;
mod process_info;
mod region;

pub use address::Address;
pub use error::{MemoryError, MemoryResult};
pub use process_info::{ModuleDescriptor, ProcessArchitecture, ProcessEntry};
pub use region::{Protection, RegionInfo, RegionState};

// Common type aliases
pub type ProcessId = u32;
pub type Offset = isize;
