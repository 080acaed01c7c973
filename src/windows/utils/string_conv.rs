//! UTF-16 conversion for ToolHelp32 names

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

/// Convert a NUL-terminated (or full-length) UTF-16 buffer to a String
pub fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    OsString::from_wide(&wide[..len])
        .to_string_lossy()
        .into_owned()
}
