//! Typed reads and writes with an optional protection guard
//!
//! The guard (`memory_check`) queries every region an access touches and skips
//! guarded, non-cached, inaccessible or uncommitted memory. It is advisory:
//! the target can change protections between the query and the access.

use crate::core::types::{Address, MemoryError, MemoryResult, ProcessArchitecture};
use crate::diagnostics::Diagnostics;
use crate::process::ProcessMemory;
use std::mem;
use tracing::trace;

/// Types that can be copied byte-for-byte out of another process.
///
/// # Safety
/// Implementors must have no padding bytes and must be valid for every bit
/// pattern, including all zeroes. Byte order and layout are the caller's
/// responsibility.
pub unsafe trait Plain: Copy + 'static {}

macro_rules! impl_plain {
    ($($ty:ty),* $(,)?) => {
        $(unsafe impl Plain for $ty {})*
    };
}

impl_plain!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: Plain, const N: usize> Plain for [T; N] {}

fn zeroed<T: Plain>() -> T {
    // SAFETY: Plain types are valid for the all-zero bit pattern.
    unsafe { mem::zeroed() }
}

fn from_bytes<T: Plain>(bytes: &[u8]) -> T {
    debug_assert_eq!(bytes.len(), mem::size_of::<T>());
    // SAFETY: length checked above, Plain accepts any bit pattern and
    // read_unaligned has no alignment requirement.
    unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) }
}

fn as_bytes<T: Plain>(value: &T) -> &[u8] {
    // SAFETY: Plain types have no padding, so every byte is initialized.
    unsafe { std::slice::from_raw_parts(value as *const T as *const u8, mem::size_of::<T>()) }
}

/// Default bound for text reads
pub const DEFAULT_TEXT_READ_LEN: usize = 200;

/// Default ceiling for a single raw read
pub const DEFAULT_MAX_READ_SIZE: usize = 10 * 1024 * 1024;

/// How a read should interpret target memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Exactly `len` raw bytes
    Bytes(usize),
    /// Up to `max_len` bytes, cut at the first NUL and decoded as a narrow string
    Text { max_len: usize },
}

/// Result of a [`ReadMode`] read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutput {
    Bytes(Vec<u8>),
    Text(String),
}

/// Reads and writes values in the target process
pub struct MemoryAccessor<'a, P: ProcessMemory> {
    process: &'a P,
    diagnostics: &'a Diagnostics,
    text_read_len: usize,
    max_read_size: usize,
}

impl<'a, P: ProcessMemory> MemoryAccessor<'a, P> {
    pub fn new(process: &'a P, diagnostics: &'a Diagnostics) -> Self {
        MemoryAccessor {
            process,
            diagnostics,
            text_read_len: DEFAULT_TEXT_READ_LEN,
            max_read_size: DEFAULT_MAX_READ_SIZE,
        }
    }

    pub fn with_text_read_len(mut self, len: usize) -> Self {
        self.text_read_len = len;
        self
    }

    pub fn with_max_read_size(mut self, len: usize) -> Self {
        self.max_read_size = len;
        self
    }

    /// Fails when the guard would refuse any region touched by
    /// `[address, address + len)`. Query failures count as inaccessible memory.
    fn check_access(&self, address: Address, len: usize, writing: bool) -> MemoryResult<()> {
        let start = address
            .get()
            .ok_or_else(|| MemoryError::InvalidAddress(address.to_string()))?;
        let end = start
            .checked_add(len.max(1))
            .ok_or_else(|| MemoryError::InvalidAddress(format!("{} + 0x{:X}", address, len)))?;

        let mut cursor = start;
        while cursor < end {
            let here = Address::new(cursor);
            let region = self.process.query_region(here)?;
            let allowed = if writing {
                region.allows_write()
            } else {
                region.allows_read()
            };
            if !allowed {
                return Err(MemoryError::protection_rejected(
                    here,
                    region.protection.value(),
                ));
            }
            match region.end_address().get() {
                Some(next) if next > cursor => cursor = next,
                Some(_) => return Err(MemoryError::query_failed(here, "region does not advance")),
                None => break,
            }
        }
        Ok(())
    }

    /// Read exactly `len` bytes
    pub fn try_read_bytes(
        &self,
        address: Address,
        len: usize,
        memory_check: bool,
    ) -> MemoryResult<Vec<u8>> {
        if !address.is_valid() {
            return Err(MemoryError::InvalidAddress(address.to_string()));
        }
        if len > self.max_read_size {
            return Err(MemoryError::read_failed(
                address,
                format!("{} bytes exceeds the {} byte read limit", len, self.max_read_size),
            ));
        }
        if memory_check {
            self.check_access(address, len, false)?;
        }
        let mut buffer = vec![0u8; len];
        self.process.read_memory(address, &mut buffer)?;
        trace!(%address, len, "read bytes");
        Ok(buffer)
    }

    /// Read exactly `len` bytes, `None` on any failure
    pub fn read_bytes(
        &self,
        address: impl Into<Address>,
        len: usize,
        memory_check: bool,
    ) -> Option<Vec<u8>> {
        let address = address.into();
        match self.try_read_bytes(address, len, memory_check) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                self.diagnostics.report("read", address, &err);
                None
            }
        }
    }

    pub fn try_read<T: Plain>(&self, address: Address, memory_check: bool) -> MemoryResult<T> {
        let bytes = self.try_read_bytes(address, mem::size_of::<T>(), memory_check)?;
        Ok(from_bytes(&bytes))
    }

    /// Read a `T`; the zero value when the guard refuses or the read fails
    pub fn read<T: Plain>(&self, address: impl Into<Address>, memory_check: bool) -> T {
        let address = address.into();
        match self.try_read(address, memory_check) {
            Ok(value) => value,
            Err(err) => {
                self.diagnostics.report("read", address, &err);
                zeroed()
            }
        }
    }

    /// Read a narrow string of at most `max_len` bytes.
    ///
    /// When the full buffer crosses into unreadable or guarded memory the
    /// read is retried up to the end of the containing region.
    pub fn try_read_text(
        &self,
        address: Address,
        max_len: usize,
        memory_check: bool,
    ) -> MemoryResult<String> {
        let bytes = match self.try_read_bytes(address, max_len, memory_check) {
            Ok(bytes) => bytes,
            Err(err) => {
                let available = match self.process.query_region(address) {
                    Ok(region) if region.allows_read() => region
                        .end_address()
                        .get()
                        .zip(address.get())
                        .map_or(0, |(end, start)| end.saturating_sub(start)),
                    _ => return Err(err),
                };
                if available == 0 || available >= max_len {
                    return Err(err);
                }
                self.try_read_bytes(address, available, memory_check)?
            }
        };

        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read a narrow string bounded by the configured text length; empty on failure
    pub fn read_text(&self, address: impl Into<Address>, memory_check: bool) -> String {
        let address = address.into();
        match self.try_read_text(address, self.text_read_len, memory_check) {
            Ok(text) => text,
            Err(err) => {
                self.diagnostics.report("read_text", address, &err);
                String::new()
            }
        }
    }

    /// Read according to an explicit mode. Failures yield zeroed bytes or an
    /// empty string.
    pub fn read_mode(
        &self,
        address: impl Into<Address>,
        mode: ReadMode,
        memory_check: bool,
    ) -> ReadOutput {
        let address = address.into();
        match mode {
            ReadMode::Bytes(len) => ReadOutput::Bytes(
                self.read_bytes(address, len, memory_check)
                    .unwrap_or_else(|| vec![0; len]),
            ),
            ReadMode::Text { max_len } => {
                let text = self
                    .try_read_text(address, max_len, memory_check)
                    .unwrap_or_else(|err| {
                        self.diagnostics.report("read_text", address, &err);
                        String::new()
                    });
                ReadOutput::Text(text)
            }
        }
    }

    /// Read a pointer-sized value using the target's pointer width
    pub fn try_read_pointer(&self, address: Address) -> MemoryResult<Address> {
        let value = match self.process.architecture() {
            ProcessArchitecture::X86 => self.try_read::<u32>(address, false)? as usize,
            ProcessArchitecture::X64 => self.try_read::<u64>(address, false)? as usize,
            ProcessArchitecture::Unknown => self.try_read::<usize>(address, false)?,
        };
        Ok(Address::new(value))
    }

    pub fn try_write_bytes(
        &self,
        address: Address,
        data: &[u8],
        memory_check: bool,
    ) -> MemoryResult<()> {
        if !address.is_valid() {
            return Err(MemoryError::InvalidAddress(address.to_string()));
        }
        if memory_check {
            self.check_access(address, data.len(), true)?;
        }
        self.process.write_memory(address, data)?;
        trace!(%address, len = data.len(), "wrote bytes");
        Ok(())
    }

    /// Write raw bytes; `false` when rejected or the OS call failed
    pub fn write_bytes(&self, address: impl Into<Address>, data: &[u8], memory_check: bool) -> bool {
        let address = address.into();
        match self.try_write_bytes(address, data, memory_check) {
            Ok(()) => true,
            Err(err) => {
                self.diagnostics.report("write", address, &err);
                false
            }
        }
    }

    pub fn try_write<T: Plain>(
        &self,
        address: Address,
        value: T,
        memory_check: bool,
    ) -> MemoryResult<T> {
        self.try_write_bytes(address, as_bytes(&value), memory_check)?;
        Ok(value)
    }

    /// Write a `T`. Returns the value written, or `None` when the guard
    /// rejected the page or the write failed.
    pub fn write<T: Plain>(
        &self,
        address: impl Into<Address>,
        value: T,
        memory_check: bool,
    ) -> Option<T> {
        let address = address.into();
        match self.try_write(address, value, memory_check) {
            Ok(value) => Some(value),
            Err(err) => {
                self.diagnostics.report("write", address, &err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Protection;
    use crate::memory::mock::{MockProcess, RecordingSink};
    use std::sync::Arc;

    fn target() -> MockProcess {
        let mut data = vec![0u8; 0x100];
        data[..4].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        data[0x10..0x16].copy_from_slice(b"hello\0");
        MockProcess::builder()
            .region(0x1000, data, Protection::read_write())
            .region(0x2000, vec![0xAA; 0x10], Protection::no_access())
            .region(0x3000, vec![0x55; 0x10], Protection::read_only())
            .region(
                0x4000,
                vec![0x11; 0x10],
                Protection::new(Protection::READWRITE | Protection::GUARD),
            )
            .region(0x5000, b"tail".to_vec(), Protection::read_only())
            .build()
    }

    #[test]
    fn test_typed_read() {
        let mock = target();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics);
        assert_eq!(accessor.read::<u32>(0x1000usize, false), 0xDEADBEEF);
        assert_eq!(accessor.read::<u16>(0x1002usize, true), 0xDEAD);
        assert_eq!(accessor.read::<[u8; 2]>(0x1000usize, false), [0xEF, 0xBE]);
    }

    #[test]
    fn test_guarded_read_skips_os_call() {
        let mock = target();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics);

        assert_eq!(accessor.read::<u32>(0x2000usize, true), 0);
        assert_eq!(accessor.read::<u32>(0x4000usize, true), 0);
        assert_eq!(accessor.read::<u64>(0x9000usize, true), 0);
        assert_eq!(mock.read_calls(), 0);
        assert_eq!(mock.query_calls(), 3);
    }

    #[test]
    fn test_unchecked_read_failure_returns_zero() {
        let mock = target();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics);
        assert_eq!(accessor.read::<f32>(0x2000usize, false), 0.0);
        assert_eq!(accessor.read::<i64>(Address::invalid(), false), 0);
        assert_eq!(mock.read_calls(), 1);
    }

    #[test]
    fn test_guarded_write_rejects_read_only() {
        let mock = target();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics);

        assert_eq!(accessor.write(0x3000usize, 0x1234u16, true), None);
        assert_eq!(mock.write_calls(), 0);
        assert_eq!(mock.bytes_at(0x3000, 2), Some(vec![0x55, 0x55]));
    }

    #[test]
    fn test_guard_covers_every_page_of_an_access() {
        let mock = MockProcess::builder()
            .region(0x1000, vec![0u8; 0x1000], Protection::read_write())
            .region(0x2000, vec![0x55; 0x1000], Protection::read_only())
            .region(
                0x3000,
                vec![0x11; 0x1000],
                Protection::new(Protection::READWRITE | Protection::GUARD),
            )
            .build();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics);

        // Starts writable, ends read-only
        assert_eq!(accessor.write(0x1FFCusize, u64::MAX, true), None);
        assert_eq!(mock.write_calls(), 0);
        assert_eq!(mock.query_calls(), 2);
        assert_eq!(mock.bytes_at(0x2000, 4), Some(vec![0x55; 4]));

        // Starts readable, ends on a guard page
        assert_eq!(accessor.read::<u64>(0x2FFCusize, true), 0);
        assert_eq!(mock.read_calls(), 0);

        assert_eq!(accessor.write(0x1FF8usize, u64::MAX, true), Some(u64::MAX));
        assert_eq!(accessor.read::<u32>(0x1FFEusize, true), 0x5555_FFFF);
    }

    #[test]
    fn test_write_read_round_trip() {
        let mock = target();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics);

        assert_eq!(accessor.write(0x1020usize, -42i64, false), Some(-42));
        assert_eq!(accessor.read::<i64>(0x1020usize, false), -42);
        assert_eq!(accessor.write(0x1031usize, 1.5f64, true), Some(1.5));
        assert_eq!(accessor.read::<f64>(0x1031usize, false), 1.5);
    }

    #[test]
    fn test_text_reads() {
        let mock = target();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics);

        assert_eq!(accessor.read_text(0x1010usize, false), "hello");
        // Shorter than the text bound and followed by unmapped memory
        assert_eq!(accessor.read_text(0x5000usize, false), "tail");
        assert_eq!(accessor.read_text(0x2000usize, true), "");
        // The checked read is clamped before the unmapped page that follows
        assert_eq!(accessor.read_text(0x5000usize, true), "tail");
        assert_eq!(
            accessor.read_mode(0x1010usize, ReadMode::Text { max_len: 3 }, false),
            ReadOutput::Text("hel".to_string())
        );
        assert_eq!(
            accessor.read_mode(0x2000usize, ReadMode::Bytes(2), false),
            ReadOutput::Bytes(vec![0, 0])
        );
    }

    #[test]
    fn test_pointer_width_follows_architecture() {
        let mut data = vec![0u8; 8];
        data.copy_from_slice(&0x1122_3344_5566_7788u64.to_le_bytes());
        let mock = MockProcess::builder()
            .architecture(ProcessArchitecture::X86)
            .region(0x1000, data, Protection::read_only())
            .build();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics);
        assert_eq!(
            accessor.try_read_pointer(Address::new(0x1000)).unwrap(),
            Address::new(0x5566_7788)
        );
    }

    #[test]
    fn test_read_size_limit() {
        let mock = target();
        let diagnostics = Diagnostics::default();
        let accessor = MemoryAccessor::new(&mock, &diagnostics).with_max_read_size(8);

        assert!(accessor.read_bytes(0x1000usize, 8, false).is_some());
        assert!(accessor.read_bytes(0x1000usize, 9, false).is_none());
        assert_eq!(mock.read_calls(), 1);
    }

    #[test]
    fn test_failures_reach_diagnostics() {
        let mock = target();
        let sink = Arc::new(RecordingSink::default());
        let diagnostics = Diagnostics::new(true, sink.clone());
        let accessor = MemoryAccessor::new(&mock, &diagnostics);

        let _ = accessor.read::<u32>(0x2000usize, true);
        let _ = accessor.write(0x9000usize, 1u8, false);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, crate::diagnostics::FailureKind::GuardRejection);
        assert_eq!(events[1].kind, crate::diagnostics::FailureKind::OsCall);
        assert_eq!(events[1].operation, "write");
    }
}
