//! Side channel for failures that the public API turns into sentinels
//!
//! Reads, writes and resolutions never return errors to the caller. When
//! debugging is enabled each swallowed failure is handed to a
//! [`DiagnosticSink`], by default [`TracingSink`].

use crate::core::types::{Address, MemoryError};
use std::fmt;
use std::sync::Arc;

/// Which stage failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No matching process or access denied
    Connection,
    /// Module missing or a pointer chain hit unreadable memory
    Resolution,
    /// The protection guard refused the access
    GuardRejection,
    /// The OS call itself failed
    OsCall,
}

impl FailureKind {
    /// Classify an OS-level error; resolution callers override this.
    pub fn of(error: &MemoryError) -> Self {
        match error {
            MemoryError::ProtectionRejected { .. } => FailureKind::GuardRejection,
            MemoryError::ProcessNotFound(_)
            | MemoryError::AccessDenied { .. }
            | MemoryError::InvalidHandle(_) => FailureKind::Connection,
            MemoryError::ModuleNotFound(_)
            | MemoryError::PointerChainBroken { .. }
            | MemoryError::PatternNotFound
            | MemoryError::InvalidPattern(_)
            | MemoryError::InvalidAddress(_) => FailureKind::Resolution,
            _ => FailureKind::OsCall,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Connection => "connection",
            FailureKind::Resolution => "resolution",
            FailureKind::GuardRejection => "guard",
            FailureKind::OsCall => "os",
        };
        f.write_str(name)
    }
}

/// One swallowed failure
#[derive(Debug)]
pub struct Diagnostic<'a> {
    pub kind: FailureKind,
    pub operation: &'static str,
    pub address: Address,
    pub error: &'a MemoryError,
}

/// Receives swallowed failures
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic<'_>);
}

/// Emits diagnostics as `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, diagnostic: &Diagnostic<'_>) {
        match diagnostic.kind {
            FailureKind::GuardRejection => tracing::debug!(
                operation = diagnostic.operation,
                address = %diagnostic.address,
                reason = %diagnostic.error,
                "access rejected by protection guard"
            ),
            kind => tracing::warn!(
                kind = %kind,
                operation = diagnostic.operation,
                address = %diagnostic.address,
                reason = %diagnostic.error,
                "memory operation failed"
            ),
        }
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn report(&self, _diagnostic: &Diagnostic<'_>) {}
}

/// Debug flag plus the sink it gates
#[derive(Clone)]
pub struct Diagnostics {
    enabled: bool,
    sink: Arc<dyn DiagnosticSink>,
}

impl Diagnostics {
    pub fn new(enabled: bool, sink: Arc<dyn DiagnosticSink>) -> Self {
        Diagnostics { enabled, sink }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    pub(crate) fn report(&self, operation: &'static str, address: Address, error: &MemoryError) {
        self.report_as(FailureKind::of(error), operation, address, error);
    }

    pub(crate) fn report_as(
        &self,
        kind: FailureKind,
        operation: &'static str,
        address: Address,
        error: &MemoryError,
    ) {
        if !self.enabled {
            return;
        }
        self.sink.report(&Diagnostic {
            kind,
            operation,
            address,
            error,
        });
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new(false, Arc::new(TracingSink))
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
