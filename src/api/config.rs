//! Manager configuration.

use crate::device::PageKind;
use crate::util::size::mb;

/// Configuration for the resource manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Size of each device-local page (default: 64 MB)
    pub device_page_size: u64,

    /// Size of each upload page (default: 16 MB)
    pub upload_page_size: u64,

    /// Size of each readback page (default: 4 MB)
    pub readback_page_size: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            device_page_size: mb(64),
            upload_page_size: mb(16),
            readback_page_size: mb(4),
        }
    }
}

impl ManagerConfig {
    /// Create a minimal config for tools, tests or constrained environments.
    pub fn minimal() -> Self {
        Self {
            device_page_size: mb(4),
            upload_page_size: mb(1),
            readback_page_size: mb(1),
        }
    }

    /// Create a config for streaming-heavy workloads (large staging pages).
    pub fn streaming() -> Self {
        Self {
            device_page_size: mb(256),
            upload_page_size: mb(64),
            readback_page_size: mb(16),
        }
    }

    /// Builder pattern: set device page size.
    pub fn with_device_page_size(mut self, size: u64) -> Self {
        self.device_page_size = size;
        self
    }

    /// Builder pattern: set upload page size.
    pub fn with_upload_page_size(mut self, size: u64) -> Self {
        self.upload_page_size = size;
        self
    }

    /// Builder pattern: set readback page size.
    pub fn with_readback_page_size(mut self, size: u64) -> Self {
        self.readback_page_size = size;
        self
    }

    /// Builder pattern: use one size for every page kind.
    pub fn with_page_size(self, size: u64) -> Self {
        self.with_device_page_size(size)
            .with_upload_page_size(size)
            .with_readback_page_size(size)
    }

    /// Configured page size for a page kind.
    pub fn page_size(&self, kind: PageKind) -> u64 {
        match kind {
            PageKind::Device => self.device_page_size,
            PageKind::Upload => self.upload_page_size,
            PageKind::Readback => self.readback_page_size,
        }
    }
}
