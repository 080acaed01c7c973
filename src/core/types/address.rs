//! Target-process address with an explicit validity flag

use super::error::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A virtual address inside the target process.
///
/// Failed resolutions produce [`Address::invalid`], which is distinct from a
/// valid address whose value happens to be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    value: usize,
    valid: bool,
}

impl Address {
    /// Creates a valid address from a raw value
    pub const fn new(value: usize) -> Self {
        Address { value, valid: true }
    }

    /// The unresolved address
    pub const fn invalid() -> Self {
        Address {
            value: 0,
            valid: false,
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Checks if the address is a valid null address (0x0)
    pub const fn is_null(&self) -> bool {
        self.valid && self.value == 0
    }

    /// Returns the raw value, or `None` when unresolved
    pub const fn get(&self) -> Option<usize> {
        if self.valid {
            Some(self.value)
        } else {
            None
        }
    }

    /// Returns the raw value; unresolved addresses yield 0
    pub const fn as_usize(&self) -> usize {
        self.value
    }

    /// Adds a signed offset. Invalid addresses stay invalid.
    pub const fn offset(&self, offset: isize) -> Self {
        if !self.valid {
            return *self;
        }
        Address::new(self.value.wrapping_add_signed(offset))
    }

    /// Adds an unsigned byte count, invalidating the result on overflow
    pub const fn add(&self, bytes: usize) -> Self {
        if !self.valid {
            return *self;
        }
        match self.value.checked_add(bytes) {
            Some(value) => Address::new(value),
            None => Address::invalid(),
        }
    }

    /// Aligns the address down to the specified boundary
    pub const fn align_down(&self, alignment: usize) -> Self {
        if !self.valid || alignment == 0 {
            return *self;
        }
        Address::new(self.value & !(alignment - 1))
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::invalid()
    }
}

impl FromStr for Address {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let value = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            usize::from_str_radix(hex, 16)
        } else if s.chars().any(|c| c.is_ascii_alphabetic()) {
            usize::from_str_radix(s, 16)
        } else {
            s.parse::<usize>()
        };

        value
            .map(Address::new)
            .map_err(|_| MemoryError::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            write!(f, "0x{:016X}", self.value)
        } else {
            f.write_str("<invalid>")
        }
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.value, f)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.value, f)
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Address::new(value)
    }
}

impl From<Option<usize>> for Address {
    fn from(value: Option<usize>) -> Self {
        value.map_or(Address::invalid(), Address::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parsing() {
        assert_eq!(Address::from_str("0x1000").unwrap(), Address::new(0x1000));
        assert_eq!(Address::from_str("0X1000").unwrap(), Address::new(0x1000));
        assert_eq!(
            Address::from_str("DEADBEEF").unwrap(),
            Address::new(0xDEADBEEF)
        );
        assert_eq!(Address::from_str("4096").unwrap(), Address::new(4096));
        assert!(Address::from_str("0xZZ").is_err());
    }

    #[test]
    fn test_zero_is_not_invalid() {
        let zero = Address::new(0);
        assert!(zero.is_valid());
        assert!(zero.is_null());
        assert_ne!(zero, Address::invalid());
        assert_eq!(Address::invalid().get(), None);
        assert_eq!(zero.get(), Some(0));
    }

    #[test]
    fn test_offset_arithmetic() {
        let addr = Address::new(0x1000);
        assert_eq!(addr.offset(0x10), Address::new(0x1010));
        assert_eq!(addr.offset(-0x10), Address::new(0x0FF0));
        assert_eq!(addr.add(0x20), Address::new(0x1020));
        assert!(!Address::new(usize::MAX).add(1).is_valid());
        assert!(!Address::invalid().offset(4).is_valid());
    }

    #[test]
    fn test_address_display() {
        let addr = Address::new(0xDEADBEEF);
        assert_eq!(format!("{}", addr), "0x00000000DEADBEEF");
        assert_eq!(format!("{:x}", addr), "deadbeef");
        assert_eq!(format!("{}", Address::invalid()), "<invalid>");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Address::from(Some(0x40)), Address::new(0x40));
        assert_eq!(Address::from(None::<usize>), Address::invalid());
    }
}
