//! Process attachment
//!
//! [`ProcessMemory`] is the set of OS primitives the rest of the crate
//! depends on. [`ProcessConnector`] implements it for a live Windows process.

pub mod access;
#[cfg(windows)]
pub mod connector;
pub mod memory;

pub use access::{AccessLevel, ProcessAccess};
#[cfg(windows)]
pub use connector::{find_process_id, ProcessConnector};
pub use memory::ProcessMemory;
