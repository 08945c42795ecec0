//! Memory statistics.

use crate::allocators::page::Page;
use crate::device::{Device, PageKind};
use crate::util::size::format_bytes;

/// Statistics of the pages of one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Number of pages created.
    pub pages: usize,
    /// Total capacity in bytes.
    pub capacity: u64,
    /// Bytes handed out.
    pub occupied: u64,
    /// Once-pages whose backing memory was released.
    pub released: usize,
}

impl PageStats {
    pub(crate) fn record<D: Device>(&mut self, page: &Page<D>) {
        self.pages += 1;
        self.capacity += page.capacity();
        self.occupied += page.occupied_bytes();
        if page.is_released() {
            self.released += 1;
        }
    }

    /// Fraction of the capacity handed out.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.occupied as f64 / self.capacity as f64
    }

    fn merge(&mut self, other: &PageStats) {
        self.pages += other.pages;
        self.capacity += other.capacity;
        self.occupied += other.occupied;
        self.released += other.released;
    }
}

/// Aggregated memory statistics, per scope or for the whole manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Device-local pages.
    pub device: PageStats,
    /// Upload pages.
    pub upload: PageStats,
    /// Readback pages.
    pub readback: PageStats,
    /// Live buffer records.
    pub buffers: usize,
    /// Live texture records.
    pub textures: usize,
    /// Live sampler records.
    pub samplers: usize,
    /// Released page backings still waiting for `release_retired()`.
    pub retired_pages: usize,
}

impl MemoryStats {
    /// Create empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Statistics of one page kind.
    pub fn pages(&self, kind: PageKind) -> &PageStats {
        match kind {
            PageKind::Device => &self.device,
            PageKind::Upload => &self.upload,
            PageKind::Readback => &self.readback,
        }
    }

    pub(crate) fn pages_mut(&mut self, kind: PageKind) -> &mut PageStats {
        match kind {
            PageKind::Device => &mut self.device,
            PageKind::Upload => &mut self.upload,
            PageKind::Readback => &mut self.readback,
        }
    }

    /// Total capacity of every page.
    pub fn total_capacity(&self) -> u64 {
        self.device.capacity + self.upload.capacity + self.readback.capacity
    }

    /// Add another set of statistics into this one.
    pub fn merge(&mut self, other: &MemoryStats) {
        self.device.merge(&other.device);
        self.upload.merge(&other.upload);
        self.readback.merge(&other.readback);
        self.buffers += other.buffers;
        self.textures += other.textures;
        self.samplers += other.samplers;
        self.retired_pages += other.retired_pages;
    }
}

impl std::fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Memory Statistics:")?;
        for (label, stats) in [("Device", &self.device), ("Upload", &self.upload), ("Readback", &self.readback)] {
            writeln!(
                f,
                "  {:<9} {} pages, {} / {} ({:.1}%), {} released",
                label,
                stats.pages,
                format_bytes(stats.occupied),
                format_bytes(stats.capacity),
                stats.utilization() * 100.0,
                stats.released
            )?;
        }
        writeln!(f, "  Buffers:  {}", self.buffers)?;
        writeln!(f, "  Textures: {}", self.textures)?;
        writeln!(f, "  Samplers: {}", self.samplers)?;
        writeln!(f, "  Retired:  {} pages", self.retired_pages)?;
        Ok(())
    }
}
