//! Core module containing the fundamental types used throughout
//! external-memory: addresses, module and region snapshots, and errors.

pub mod types;

pub use types::{
    Address, MemoryError, MemoryResult, ModuleDescriptor, Offset, ProcessArchitecture, ProcessId,
    Protection, RegionInfo,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
