//! Windows last-error handling

use std::fmt;
use winapi::um::errhandlingapi::GetLastError;

/// Windows error codes the connector distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    AccessDenied,
    InvalidHandle,
    InvalidParameter,
    PartialCopy,
    InvalidAddress,
    Unknown(u32),
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        match code {
            0 => ErrorCode::Success,
            5 => ErrorCode::AccessDenied,
            6 => ErrorCode::InvalidHandle,
            87 => ErrorCode::InvalidParameter,
            299 => ErrorCode::PartialCopy,
            487 => ErrorCode::InvalidAddress,
            _ => ErrorCode::Unknown(code),
        }
    }
}

impl ErrorCode {
    /// Get the calling thread's last Windows error
    pub fn last_error() -> Self {
        unsafe { ErrorCode::from(GetLastError()) }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Success => write!(f, "Success"),
            ErrorCode::AccessDenied => write!(f, "Access denied"),
            ErrorCode::InvalidHandle => write!(f, "Invalid handle"),
            ErrorCode::InvalidParameter => write!(f, "Invalid parameter"),
            ErrorCode::PartialCopy => write!(f, "Partial copy"),
            ErrorCode::InvalidAddress => write!(f, "Invalid address"),
            ErrorCode::Unknown(code) => write!(f, "Unknown error: {}", code),
        }
    }
}

/// The system message for the last Windows error, e.g.
/// "Only part of a ReadProcessMemory or WriteProcessMemory request was completed."
pub fn last_error_description() -> String {
    let error = ::windows::core::Error::from_win32();
    let message = error.message().to_string();
    let message = message.trim();
    if message.is_empty() {
        ErrorCode::last_error().to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        assert_eq!(ErrorCode::from(0), ErrorCode::Success);
        assert_eq!(ErrorCode::from(5), ErrorCode::AccessDenied);
        assert_eq!(ErrorCode::from(299), ErrorCode::PartialCopy);
        assert_eq!(ErrorCode::from(999), ErrorCode::Unknown(999));
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(format!("{}", ErrorCode::AccessDenied), "Access denied");
        assert_eq!(format!("{}", ErrorCode::Unknown(123)), "Unknown error: 123");
    }
}
