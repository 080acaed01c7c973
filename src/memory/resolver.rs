//! Module base lookup and pointer-chain resolution

use super::accessor::MemoryAccessor;
use crate::core::types::{Address, MemoryError, MemoryResult, ModuleDescriptor, Offset};
use crate::diagnostics::{Diagnostics, FailureKind};
use crate::process::ProcessMemory;
use tracing::debug;

/// Resolves module names and offset chains to addresses
pub struct AddressResolver<'a, P: ProcessMemory> {
    process: &'a P,
    diagnostics: &'a Diagnostics,
}

impl<'a, P: ProcessMemory> AddressResolver<'a, P> {
    pub fn new(process: &'a P, diagnostics: &'a Diagnostics) -> Self {
        AddressResolver {
            process,
            diagnostics,
        }
    }

    /// First loaded module named exactly `name` (case-sensitive, with
    /// extension). Enumerates afresh on every call.
    pub fn find_module(&self, name: &str) -> MemoryResult<ModuleDescriptor> {
        self.process
            .modules()?
            .into_iter()
            .find(|module| module.name == name)
            .ok_or_else(|| MemoryError::ModuleNotFound(name.to_string()))
    }

    pub fn try_get_module(&self, name: &str) -> MemoryResult<Address> {
        self.find_module(name).map(|module| module.base_address)
    }

    /// Base address of module `name`, invalid when it is not loaded
    pub fn get_module(&self, name: &str) -> Address {
        match self.try_get_module(name) {
            Ok(base) => {
                debug!(module = name, %base, "module found");
                base
            }
            Err(err) => {
                self.diagnostics
                    .report_as(FailureKind::Resolution, "get_module", Address::invalid(), &err);
                Address::invalid()
            }
        }
    }

    /// Walk `base` through `offsets`: every offset but the last is added and
    /// dereferenced, the last is only added.
    pub fn try_get_address(&self, base: Address, offsets: &[Offset]) -> MemoryResult<Address> {
        if !base.is_valid() {
            return Err(MemoryError::InvalidAddress(base.to_string()));
        }
        let Some((last, steps)) = offsets.split_last() else {
            return Ok(base);
        };

        let accessor = MemoryAccessor::new(self.process, self.diagnostics);
        let mut current = base;
        for (level, &offset) in steps.iter().enumerate() {
            let slot = current.offset(offset);
            current = accessor.try_read_pointer(slot).map_err(|err| {
                MemoryError::pointer_chain_broken(level, format!("{} ({})", slot, err))
            })?;
        }

        Ok(current.offset(*last))
    }

    /// Sentinel form of [`try_get_address`](Self::try_get_address)
    pub fn get_address(&self, base: impl Into<Address>, offsets: &[Offset]) -> Address {
        let base = base.into();
        match self.try_get_address(base, offsets) {
            Ok(address) => address,
            Err(err) => {
                self.diagnostics
                    .report_as(FailureKind::Resolution, "get_address", base, &err);
                Address::invalid()
            }
        }
    }
}
