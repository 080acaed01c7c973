//! Wildcard byte-signature scanning

use super::accessor::MemoryAccessor;
use crate::core::types::{Address, MemoryError, MemoryResult, ModuleDescriptor};
use crate::diagnostics::{Diagnostics, FailureKind};
use crate::process::ProcessMemory;
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// A byte pattern where `None` matches any byte.
///
/// Parsed from text such as `"48 8B ? ? 89"`; both `?` and `??` are accepted
/// as wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    tokens: Vec<Option<u8>>,
}

impl Signature {
    pub fn new(tokens: Vec<Option<u8>>) -> MemoryResult<Self> {
        if tokens.is_empty() {
            return Err(MemoryError::InvalidPattern("Empty pattern".to_string()));
        }
        Ok(Signature { tokens })
    }

    /// A signature with no wildcards
    pub fn exact(bytes: &[u8]) -> MemoryResult<Self> {
        Signature::new(bytes.iter().copied().map(Some).collect())
    }

    pub fn tokens(&self) -> &[Option<u8>] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromStr for Signature {
    type Err = MemoryError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let tokens = pattern
            .split_whitespace()
            .map(|part| match part {
                "?" | "??" => Ok(None),
                _ if part.len() <= 2 => {
                    let padded = format!("{:0>2}", part);
                    let byte = hex::decode(&padded).map_err(|e| {
                        MemoryError::InvalidPattern(format!("Invalid hex byte '{}': {}", part, e))
                    })?;
                    Ok(Some(byte[0]))
                }
                _ => Err(MemoryError::InvalidPattern(format!(
                    "Invalid hex byte '{}': must be 1 or 2 digits",
                    part
                ))),
            })
            .collect::<MemoryResult<Vec<_>>>()?;

        Signature::new(tokens)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .tokens
            .iter()
            .map(|token| match token {
                Some(byte) => hex::encode_upper([*byte]),
                None => "?".to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&text)
    }
}

/// Whether `window` starts with bytes matching every token of `signature`
pub fn memory_compare(window: &[u8], signature: &Signature) -> bool {
    window.len() >= signature.len()
        && signature
            .tokens
            .iter()
            .zip(window)
            .all(|(token, byte)| token.map_or(true, |expected| expected == *byte))
}

/// Offset of the first match inside `buffer`
pub fn find_in_buffer(buffer: &[u8], signature: &Signature, parallel: bool) -> Option<usize> {
    let len = signature.len();
    if len == 0 || buffer.len() < len {
        return None;
    }
    let windows = buffer.len() - len + 1;
    let matches_at = |offset: usize| memory_compare(&buffer[offset..offset + len], signature);

    if parallel {
        (0..windows).into_par_iter().find_first(|&offset| matches_at(offset))
    } else {
        (0..windows).find(|&offset| matches_at(offset))
    }
}

/// Scanner tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    /// Bytes read from the target per step
    pub chunk_size: usize,
    /// Search large chunks on the rayon pool
    pub parallel: bool,
    /// Minimum chunk length before the parallel search is used
    pub parallel_threshold: usize,
    /// Only search regions that pass the protection guard
    pub memory_check: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            chunk_size: 0x10000,
            parallel: true,
            parallel_threshold: 0x10_0000,
            memory_check: false,
        }
    }
}

/// Finds signatures in the target's memory
pub struct SignatureScanner<'a, P: ProcessMemory> {
    process: &'a P,
    accessor: MemoryAccessor<'a, P>,
    diagnostics: &'a Diagnostics,
    settings: ScanSettings,
}

impl<'a, P: ProcessMemory> SignatureScanner<'a, P> {
    pub fn new(process: &'a P, diagnostics: &'a Diagnostics) -> Self {
        SignatureScanner {
            process,
            // Chunk reads are already bounded by `chunk_size`
            accessor: MemoryAccessor::new(process, diagnostics).with_max_read_size(usize::MAX),
            diagnostics,
            settings: ScanSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    /// First address in `[start, start + size)` where `signature` matches.
    ///
    /// The range is read in chunks that overlap by `len - 1` bytes, so a
    /// match straddling two chunks is still found. When a chunk cannot be
    /// read whole, its readable regions are searched on their own and the
    /// rest is skipped.
    pub fn try_find_pattern(
        &self,
        start: Address,
        signature: &Signature,
        size: usize,
    ) -> MemoryResult<Address> {
        let base = start
            .get()
            .ok_or_else(|| MemoryError::InvalidAddress(start.to_string()))?;
        base.checked_add(size)
            .ok_or_else(|| MemoryError::InvalidAddress(format!("{} + 0x{:X}", start, size)))?;

        let len = signature.len();
        let step = self.settings.chunk_size.max(len);
        let overlap = len - 1;

        let mut offset = 0usize;
        while offset < size && size - offset >= len {
            let chunk_len = (step + overlap).min(size - offset);
            let chunk_start = Address::new(base + offset);

            let found = match self
                .accessor
                .try_read_bytes(chunk_start, chunk_len, self.settings.memory_check)
            {
                Ok(buffer) => self.search(chunk_start, &buffer, signature),
                Err(err) => {
                    trace!(%chunk_start, chunk_len, error = %err, "chunk not readable whole");
                    self.diagnostics.report("scan", chunk_start, &err);
                    self.search_readable(base + offset, chunk_len, signature)
                }
            };
            if let Some(address) = found {
                debug!(%address, %signature, "signature found");
                return Ok(address);
            }

            offset += step;
        }

        Err(MemoryError::PatternNotFound)
    }

    fn search(&self, at: Address, buffer: &[u8], signature: &Signature) -> Option<Address> {
        let parallel = self.settings.parallel && buffer.len() >= self.settings.parallel_threshold;
        find_in_buffer(buffer, signature, parallel).map(|found| at.add(found))
    }

    /// Search each readable run of `[start, start + len)` in address order
    fn search_readable(&self, start: usize, len: usize, signature: &Signature) -> Option<Address> {
        self.readable_runs(start, len)
            .into_iter()
            .filter(|&(_, run_len)| run_len >= signature.len())
            .find_map(|(run_start, run_len)| {
                let at = Address::new(run_start);
                match self.accessor.try_read_bytes(at, run_len, false) {
                    Ok(buffer) => self.search(at, &buffer, signature),
                    Err(err) => {
                        self.diagnostics.report("scan", at, &err);
                        None
                    }
                }
            })
    }

    /// Spans of `[start, start + len)` covered by readable regions, with
    /// neighbouring regions merged so matches across them are kept
    fn readable_runs(&self, start: usize, len: usize) -> Vec<(usize, usize)> {
        let end = start.saturating_add(len);
        let mut runs: Vec<(usize, usize)> = Vec::new();
        let mut cursor = start;

        while cursor < end {
            let region = match self.process.query_region(Address::new(cursor)) {
                Ok(region) => region,
                Err(err) => {
                    self.diagnostics.report("scan", Address::new(cursor), &err);
                    break;
                }
            };
            let region_end = region.end_address().get().map_or(end, |e| e.min(end));
            if region_end <= cursor {
                break;
            }

            let readable = if self.settings.memory_check {
                region.allows_read()
            } else {
                region.is_readable()
            };
            if readable {
                match runs.last_mut() {
                    Some((run_start, run_len)) if *run_start + *run_len == cursor => {
                        *run_len += region_end - cursor;
                    }
                    _ => runs.push((cursor, region_end - cursor)),
                }
            }
            cursor = region_end;
        }

        runs
    }

    /// Parse `pattern` and scan; see [`try_find_pattern`](Self::try_find_pattern)
    pub fn try_find_signature(
        &self,
        start: Address,
        pattern: &str,
        size: usize,
    ) -> MemoryResult<Address> {
        let signature: Signature = pattern.parse()?;
        self.try_find_pattern(start, &signature, size)
    }

    /// Sentinel form of [`try_find_pattern`](Self::try_find_pattern)
    pub fn find_pattern(
        &self,
        start: impl Into<Address>,
        signature: &Signature,
        size: usize,
    ) -> Address {
        let start = start.into();
        self.sentinel(start, self.try_find_pattern(start, signature, size))
    }

    /// Address of the first match of `pattern` in `[start, start + size)`,
    /// invalid when there is none or the pattern does not parse
    pub fn find_signature(&self, start: impl Into<Address>, pattern: &str, size: usize) -> Address {
        let start = start.into();
        self.sentinel(start, self.try_find_signature(start, pattern, size))
    }

    /// Scan a whole module image
    pub fn find_signature_in_module(&self, module: &ModuleDescriptor, pattern: &str) -> Address {
        self.find_signature(module.base_address, pattern, module.size)
    }

    fn sentinel(&self, start: Address, result: MemoryResult<Address>) -> Address {
        result.unwrap_or_else(|err| {
            self.diagnostics
                .report_as(FailureKind::Resolution, "find_signature", start, &err);
            Address::invalid()
        })
    }
}
