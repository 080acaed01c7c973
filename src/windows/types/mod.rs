//! Windows-specific wrappers

pub mod handle;

pub use handle::Handle;
