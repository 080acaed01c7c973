//! In-memory target process for tests and benchmarks

use crate::core::types::{
    Address, MemoryError, MemoryResult, ModuleDescriptor, ProcessArchitecture, ProcessId,
    Protection, RegionInfo, RegionState,
};
use crate::diagnostics::{Diagnostic, DiagnosticSink, FailureKind};
use crate::process::ProcessMemory;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const PAGE_SIZE: usize = 0x1000;

#[derive(Debug, Clone)]
struct MockRegion {
    bytes: Vec<u8>,
    protection: Protection,
    state: RegionState,
}

/// A fake target: mapped regions with protections, a module list and
/// counters for every primitive call.
#[derive(Debug)]
pub struct MockProcess {
    pid: ProcessId,
    valid: bool,
    architecture: ProcessArchitecture,
    regions: Mutex<BTreeMap<usize, MockRegion>>,
    modules: Vec<ModuleDescriptor>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    queries: AtomicUsize,
}

impl MockProcess {
    pub fn builder() -> MockProcessBuilder {
        MockProcessBuilder::default()
    }

    /// A process whose attach failed
    pub fn detached() -> Self {
        MockProcess {
            valid: false,
            pid: 0,
            ..MockProcessBuilder::default().build()
        }
    }

    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Inspect target memory without going through the counted primitives
    pub fn bytes_at(&self, address: usize, len: usize) -> Option<Vec<u8>> {
        let regions = self.regions.lock().ok()?;
        let (base, region) = regions.range(..=address).next_back()?;
        let start = address - base;
        region.bytes.get(start..start.checked_add(len)?).map(<[u8]>::to_vec)
    }

    pub fn set_protection(&self, base: usize, protection: Protection) {
        if let Ok(mut regions) = self.regions.lock() {
            if let Some(region) = regions.get_mut(&base) {
                region.protection = protection;
            }
        }
    }

    fn ensure_valid(&self) -> MemoryResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(MemoryError::InvalidHandle(
                "Process handle is null".to_string(),
            ))
        }
    }

    /// Walk contiguous regions covering `[address, address + len)`, handing
    /// each piece to `visit` as (region, offset in region, offset in request, length).
    fn for_each_span(
        &self,
        address: Address,
        len: usize,
        writing: bool,
        mut visit: impl FnMut(&mut MockRegion, usize, usize, usize),
    ) -> MemoryResult<()> {
        let failed = |reason: &str| {
            if writing {
                MemoryError::write_failed(address, reason)
            } else {
                MemoryError::read_failed(address, reason)
            }
        };

        let start = address.get().ok_or_else(|| failed("invalid address"))?;
        start.checked_add(len).ok_or_else(|| failed("range overflows"))?;

        let mut regions = self
            .regions
            .lock()
            .map_err(|_| failed("mock poisoned"))?;

        // Validate every span before touching anything, as the OS does.
        let mut spans = Vec::new();
        let mut cursor = start;
        let mut done = 0;
        while done < len {
            let (&base, region) = regions
                .range(..=cursor)
                .next_back()
                .ok_or_else(|| failed("unmapped"))?;
            let offset = cursor - base;
            if offset >= region.bytes.len() {
                return Err(failed("unmapped"));
            }
            if region.state != RegionState::Commit {
                return Err(failed("not committed"));
            }
            let protect = region.protection;
            if !protect.is_readable() {
                return Err(failed("page not accessible"));
            }
            if writing && !protect.is_writable() {
                return Err(failed("page not writable"));
            }
            let take = (region.bytes.len() - offset).min(len - done);
            spans.push((base, offset, done, take));
            cursor += take;
            done += take;
        }

        for (base, offset, done, take) in spans {
            if let Some(region) = regions.get_mut(&base) {
                visit(region, offset, done, take);
            }
        }
        Ok(())
    }
}

impl ProcessMemory for MockProcess {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn architecture(&self) -> ProcessArchitecture {
        self.architecture
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleDescriptor>> {
        self.ensure_valid()?;
        Ok(self.modules.clone())
    }

    fn query_region(&self, address: Address) -> MemoryResult<RegionInfo> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.ensure_valid()?;
        let raw = address
            .get()
            .ok_or_else(|| MemoryError::query_failed(address, "invalid address"))?;

        let regions = self
            .regions
            .lock()
            .map_err(|_| MemoryError::query_failed(address, "mock poisoned"))?;
        let found = regions
            .range(..=raw)
            .next_back()
            .filter(|(base, region)| raw - **base < region.bytes.len());

        Ok(match found {
            Some((&base, region)) => RegionInfo {
                base_address: Address::new(base),
                size: region.bytes.len(),
                protection: region.protection,
                state: region.state,
            },
            None => {
                // Free space runs from the page start, or the previous
                // region's end, up to the page end or the next region
                let page = address.align_down(PAGE_SIZE).get().unwrap_or(raw);
                let page_end = page.saturating_add(PAGE_SIZE);
                let start = regions
                    .range(..=raw)
                    .next_back()
                    .map_or(page, |(base, region)| page.max(base + region.bytes.len()));
                let end = regions
                    .range(raw..)
                    .next()
                    .map_or(page_end, |(&base, _)| base.min(page_end));
                RegionInfo {
                    base_address: Address::new(start),
                    size: end - start,
                    protection: Protection::no_access(),
                    state: RegionState::Free,
                }
            }
        })
    }

    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.ensure_valid()?;
        self.for_each_span(address, buffer.len(), false, |region, offset, done, take| {
            buffer[done..done + take].copy_from_slice(&region.bytes[offset..offset + take]);
        })
    }

    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.ensure_valid()?;
        self.for_each_span(address, data.len(), true, |region, offset, done, take| {
            region.bytes[offset..offset + take].copy_from_slice(&data[done..done + take]);
        })
    }
}

/// Builder for [`MockProcess`]
#[derive(Debug)]
pub struct MockProcessBuilder {
    pid: ProcessId,
    architecture: ProcessArchitecture,
    regions: BTreeMap<usize, MockRegion>,
    modules: Vec<ModuleDescriptor>,
}

impl Default for MockProcessBuilder {
    fn default() -> Self {
        MockProcessBuilder {
            pid: 4242,
            architecture: ProcessArchitecture::X64,
            regions: BTreeMap::new(),
            modules: Vec::new(),
        }
    }
}

impl MockProcessBuilder {
    pub fn pid(mut self, pid: ProcessId) -> Self {
        self.pid = pid;
        self
    }

    pub fn architecture(mut self, architecture: ProcessArchitecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Committed region holding `bytes`
    pub fn region(mut self, base: usize, bytes: impl Into<Vec<u8>>, protection: Protection) -> Self {
        self.regions.insert(
            base,
            MockRegion {
                bytes: bytes.into(),
                protection,
                state: RegionState::Commit,
            },
        );
        self
    }

    /// Reserved but uncommitted region
    pub fn reserved(mut self, base: usize, size: usize) -> Self {
        self.regions.insert(
            base,
            MockRegion {
                bytes: vec![0; size],
                protection: Protection::no_access(),
                state: RegionState::Reserve,
            },
        );
        self
    }

    /// Module entry, optionally backed by a read/execute region of `image`
    pub fn module(mut self, name: &str, base: usize, image: impl Into<Vec<u8>>) -> Self {
        let image = image.into();
        self.modules
            .push(ModuleDescriptor::new(name, Address::new(base), image.len()));
        self.region(base, image, Protection::execute_read())
    }

    pub fn build(self) -> MockProcess {
        MockProcess {
            pid: self.pid,
            valid: true,
            architecture: self.architecture,
            regions: Mutex::new(self.regions),
            modules: self.modules,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
        }
    }
}

/// A diagnostic as captured by [`RecordingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDiagnostic {
    pub kind: FailureKind,
    pub operation: &'static str,
    pub address: Address,
    pub message: String,
}

/// Sink that keeps everything it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RecordedDiagnostic>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<RecordedDiagnostic> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, diagnostic: &Diagnostic<'_>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(RecordedDiagnostic {
                kind: diagnostic.kind,
                operation: diagnostic.operation,
                address: diagnostic.address,
                message: diagnostic.error.to_string(),
            });
        }
    }
}
