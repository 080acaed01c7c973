//! Memory operations on an attached target
//!
//! This module provides:
//! - Typed reads and writes with an optional protection guard
//! - Module lookup and pointer-chain resolution
//! - Wildcard signature scanning
//!
//! [`ExternalProcess`] bundles a [`ProcessMemory`] backend with the
//! diagnostics and settings shared by all three components.

pub mod accessor;
#[doc(hidden)]
pub mod mock;
pub mod resolver;
pub mod scanner;

pub use accessor::{
    MemoryAccessor, Plain, ReadMode, ReadOutput, DEFAULT_MAX_READ_SIZE, DEFAULT_TEXT_READ_LEN,
};
pub use resolver::AddressResolver;
pub use scanner::{find_in_buffer, memory_compare, ScanSettings, Signature, SignatureScanner};

use crate::config::Config;
use crate::core::types::{Address, ModuleDescriptor, Offset, ProcessId};
use crate::diagnostics::{DiagnosticSink, Diagnostics};
use crate::process::ProcessMemory;
use std::sync::Arc;

#[cfg(windows)]
use crate::diagnostics::FailureKind;
#[cfg(windows)]
use crate::process::{ProcessAccess, ProcessConnector};

/// An attached target plus the settings every operation shares
pub struct ExternalProcess<P: ProcessMemory> {
    process: P,
    diagnostics: Diagnostics,
    text_read_len: usize,
    max_read_size: usize,
    scan_settings: ScanSettings,
}

#[cfg(windows)]
impl ExternalProcess<ProcessConnector> {
    /// Attach to `name` with all access rights. A failed attach yields a
    /// detached process whose operations all return sentinels.
    pub fn attach(name: &str) -> Self {
        Self::attach_with(name, ProcessAccess::ALL_ACCESS, Diagnostics::default())
    }

    /// Attach with specific rights, reporting a failure through `diagnostics`
    pub fn attach_with(name: &str, access: ProcessAccess, diagnostics: Diagnostics) -> Self {
        let connector = match ProcessConnector::try_attach(name, access) {
            Ok(connector) => connector,
            Err(err) => {
                diagnostics.report_as(FailureKind::Connection, "attach", Address::invalid(), &err);
                ProcessConnector::detached(access)
            }
        };
        ExternalProcess::new(connector).with_diagnostics(diagnostics)
    }
}

impl<P: ProcessMemory> ExternalProcess<P> {
    pub fn new(process: P) -> Self {
        ExternalProcess {
            process,
            diagnostics: Diagnostics::default(),
            text_read_len: DEFAULT_TEXT_READ_LEN,
            max_read_size: DEFAULT_MAX_READ_SIZE,
            scan_settings: ScanSettings::default(),
        }
    }

    /// Apply the `[memory]`, `[scanner]` and `[logging]` sections
    pub fn with_config(mut self, config: &Config) -> Self {
        self.text_read_len = config.memory.text_read_len;
        self.max_read_size = config.memory.max_read_size;
        self.scan_settings = config.scan_settings();
        self.diagnostics.set_enabled(config.logging.debug);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Replace the diagnostic sink, keeping the debug flag
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics.set_sink(sink);
        self
    }

    pub fn with_scan_settings(mut self, settings: ScanSettings) -> Self {
        self.scan_settings = settings;
        self
    }

    /// Turn diagnostic reporting on or off
    pub fn set_debug(&mut self, enabled: bool) {
        self.diagnostics.set_enabled(enabled);
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    /// Give back the backend, closing nothing
    pub fn into_inner(self) -> P {
        self.process
    }

    pub fn pid(&self) -> ProcessId {
        self.process.pid()
    }

    pub fn is_valid(&self) -> bool {
        self.process.is_valid()
    }

    pub fn accessor(&self) -> MemoryAccessor<'_, P> {
        MemoryAccessor::new(&self.process, &self.diagnostics)
            .with_text_read_len(self.text_read_len)
            .with_max_read_size(self.max_read_size)
    }

    pub fn resolver(&self) -> AddressResolver<'_, P> {
        AddressResolver::new(&self.process, &self.diagnostics)
    }

    pub fn scanner(&self) -> SignatureScanner<'_, P> {
        SignatureScanner::new(&self.process, &self.diagnostics).with_settings(self.scan_settings)
    }

    /// Base address of module `name`, invalid when it is not loaded
    pub fn get_module(&self, name: &str) -> Address {
        self.resolver().get_module(name)
    }

    /// Resolve a pointer chain; see [`AddressResolver::get_address`]
    pub fn get_address(&self, base: impl Into<Address>, offsets: &[Offset]) -> Address {
        self.resolver().get_address(base, offsets)
    }

    pub fn read<T: Plain>(&self, address: impl Into<Address>, memory_check: bool) -> T {
        self.accessor().read(address, memory_check)
    }

    pub fn read_text(&self, address: impl Into<Address>, memory_check: bool) -> String {
        self.accessor().read_text(address, memory_check)
    }

    pub fn read_mode(
        &self,
        address: impl Into<Address>,
        mode: ReadMode,
        memory_check: bool,
    ) -> ReadOutput {
        self.accessor().read_mode(address, mode, memory_check)
    }

    pub fn read_bytes(
        &self,
        address: impl Into<Address>,
        len: usize,
        memory_check: bool,
    ) -> Option<Vec<u8>> {
        self.accessor().read_bytes(address, len, memory_check)
    }

    pub fn write<T: Plain>(
        &self,
        address: impl Into<Address>,
        value: T,
        memory_check: bool,
    ) -> Option<T> {
        self.accessor().write(address, value, memory_check)
    }

    pub fn write_bytes(&self, address: impl Into<Address>, data: &[u8], memory_check: bool) -> bool {
        self.accessor().write_bytes(address, data, memory_check)
    }

    /// First match of `pattern` in `[start, start + size)`
    pub fn find_signature(&self, start: impl Into<Address>, pattern: &str, size: usize) -> Address {
        self.scanner().find_signature(start, pattern, size)
    }

    pub fn find_signature_in_module(&self, module: &ModuleDescriptor, pattern: &str) -> Address {
        self.scanner().find_signature_in_module(module, pattern)
    }
}

impl<P: ProcessMemory + std::fmt::Debug> std::fmt::Debug for ExternalProcess<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalProcess")
            .field("process", &self.process)
            .field("diagnostics", &self.diagnostics)
            .field("scan_settings", &self.scan_settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Protection;
    use crate::diagnostics::FailureKind;
    use mock::{MockProcess, RecordingSink};

    fn target() -> ExternalProcess<MockProcess> {
        let mut image = vec![0u8; 0x40];
        image[0x20..0x24].copy_from_slice(&[0x8B, 0x0D, 0x00, 0x10]);
        let mut data = vec![0u8; 0x20];
        data[..8].copy_from_slice(&0x3000u64.to_le_bytes());
        let mut values = vec![0u8; 0x20];
        values[0x8..0xC].copy_from_slice(&100i32.to_le_bytes());

        ExternalProcess::new(
            MockProcess::builder()
                .module("game.exe", 0x40_0000, image)
                .region(0x2000, data, Protection::read_write())
                .region(0x3000, values, Protection::read_write())
                .build(),
        )
    }

    #[test]
    fn test_end_to_end_resolution() {
        let process = target();
        assert!(process.is_valid());
        assert_eq!(process.pid(), 4242);

        let base = process.get_module("game.exe");
        assert_eq!(base, Address::new(0x40_0000));

        let health = process.get_address(0x2000usize, &[0x0, 0x8]);
        assert_eq!(health, Address::new(0x3008));
        assert_eq!(process.read::<i32>(health, true), 100);
        assert_eq!(process.write(health, 250i32, true), Some(250));
        assert_eq!(process.read::<i32>(health, false), 250);

        let module = process.resolver().find_module("game.exe").unwrap();
        assert_eq!(
            process.find_signature_in_module(&module, "8B 0D ? 10"),
            Address::new(0x40_0020)
        );
    }

    #[test]
    fn test_module_image_is_not_writable_with_check() {
        let process = target();
        assert_eq!(process.write(0x40_0000usize, 0xCCu8, true), None);
        assert_eq!(process.process().write_calls(), 0);
    }

    #[test]
    fn test_config_applies_limits_and_debug() {
        let sink = Arc::new(RecordingSink::default());
        let mut config = Config::default();
        config.memory.max_read_size = 4;
        config.logging.debug = true;

        let mut process = target().with_config(&config).with_sink(sink.clone());
        assert!(process.diagnostics().is_enabled());
        assert_eq!(process.read_bytes(0x3000usize, 8, false), None);
        assert_eq!(sink.events().len(), 1);

        process.set_debug(false);
        assert!(!process.get_module("missing.dll").is_valid());
        assert_eq!(sink.events().len(), 1);
    }

    #[test]
    fn test_detached_process_returns_sentinels() {
        let sink = Arc::new(RecordingSink::default());
        let process = ExternalProcess::new(MockProcess::detached())
            .with_diagnostics(Diagnostics::new(true, sink.clone()));

        assert!(!process.is_valid());
        assert!(!process.get_module("game.exe").is_valid());
        assert_eq!(process.read::<u64>(0x1000usize, false), 0);
        assert_eq!(process.write(0x1000usize, 1u8, false), None);
        assert_eq!(process.read_text(0x1000usize, false), "");
        assert!(!process.find_signature(0x1000usize, "00", 0x10).is_valid());

        let kinds: Vec<_> = sink.events().iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&FailureKind::Connection));
        assert!(kinds.contains(&FailureKind::Resolution));
    }
}
