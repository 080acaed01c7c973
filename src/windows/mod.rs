//! Windows API layer
//!
//! All unsafe FFI calls are contained within this module. Everything above
//! it talks to the target through [`crate::process::ProcessMemory`].

pub mod bindings;
pub mod types;
pub mod utils;

pub use bindings::{kernel32, toolhelp};
pub use types::Handle;
pub use utils::{last_error_description, ErrorCode};
