//! Page - a bump allocator over one device heap.
//!
//! Pages never free individual ranges; `occupied_bytes` only grows until the
//! page's pool is torn down. Once-pages additionally count the resources still
//! waiting for their single transfer and give their backing memory up when
//! that count reaches zero.

use crate::device::{Device, DeviceError, PageKind, PlacedResource, PlacementDesc, ResourceState};

/// Device objects backing a page.
///
/// Fields drop in declaration order: the mapping is released before the
/// page-wide staging resource, which is released before its heap.
pub(crate) struct PageBacking<D: Device> {
    pub mapping: Option<D::Mapping>,
    pub staging: Option<D::Resource>,
    pub heap: D::Heap,
}

/// A bump-allocated memory page.
pub(crate) struct Page<D: Device> {
    kind: PageKind,
    capacity: u64,
    occupied_bytes: u64,
    /// Resting state of resources placed here (device pages) or of the page's
    /// staging buffer (upload/readback pages).
    default_state: ResourceState,
    once: bool,
    /// Once-resources placed here that have not completed their transfer.
    refcount: u32,
    /// Accumulated names of every resource placed in the page.
    name: String,
    backing: Option<PageBacking<D>>,
}

impl<D: Device> Page<D> {
    /// Create a page and its backing heap.
    ///
    /// Upload and readback pages also get a page-wide buffer that stays mapped
    /// for the lifetime of the page.
    pub fn create(
        device: &mut D,
        kind: PageKind,
        capacity: u64,
        default_state: ResourceState,
        once: bool,
    ) -> Result<Self, DeviceError> {
        let heap = device.create_heap(kind, capacity)?;

        let (staging, mapping) = if kind.is_cpu_visible() {
            let staging = device.create_placed_resource(
                &heap,
                &PlacementDesc {
                    offset: 0,
                    size: capacity,
                    resource: PlacedResource::Buffer,
                    initial_state: default_state,
                },
            )?;
            let mapping = device.map(&staging)?;
            (Some(staging), Some(mapping))
        } else {
            (None, None)
        };

        Ok(Self {
            kind,
            capacity,
            occupied_bytes: 0,
            default_state,
            once,
            refcount: 0,
            name: String::new(),
            backing: Some(PageBacking {
                mapping,
                staging,
                heap,
            }),
        })
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn occupied_bytes(&self) -> u64 {
        self.occupied_bytes
    }

    pub fn remaining(&self) -> u64 {
        self.capacity - self.occupied_bytes
    }

    pub fn default_state(&self) -> ResourceState {
        self.default_state
    }

    pub fn is_once(&self) -> bool {
        self.once
    }

    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the backing memory was given up.
    pub fn is_released(&self) -> bool {
        self.backing.is_none()
    }

    pub fn heap(&self) -> Option<&D::Heap> {
        self.backing.as_ref().map(|b| &b.heap)
    }

    pub fn mapping_mut(&mut self) -> Option<&mut D::Mapping> {
        self.backing.as_mut().and_then(|b| b.mapping.as_mut())
    }

    /// Whether `size` more bytes fit.
    pub fn fits(&self, size: u64) -> bool {
        !self.is_released() && self.remaining() >= size
    }

    /// Bump-allocate `size` bytes, returning the offset.
    pub fn try_place(&mut self, size: u64) -> Option<u64> {
        if !self.fits(size) {
            return None;
        }
        let offset = self.occupied_bytes;
        self.occupied_bytes += size;
        Some(offset)
    }

    /// Count one more once-resource waiting for its transfer.
    pub fn retain(&mut self) {
        self.refcount += 1;
    }

    /// A once-resource completed its transfer.
    ///
    /// Returns the backing objects when this was the last one, with the CPU
    /// mapping already dropped.
    pub fn release_ref(&mut self) -> Option<PageBacking<D>> {
        self.refcount = self.refcount.saturating_sub(1);
        if !self.once || self.refcount > 0 {
            return None;
        }
        let mut backing = self.backing.take()?;
        backing.mapping = None;
        Some(backing)
    }

    /// Append a resource name to the page's diagnostic name.
    pub fn append_name(&mut self, name: &str) {
        if !self.name.is_empty() {
            self.name.push_str(", ");
        }
        self.name.push_str(name);
    }

    /// Read-only snapshot for inspection.
    pub fn info(&self, index: u32) -> PageInfo {
        PageInfo {
            kind: self.kind,
            index,
            capacity: self.capacity,
            occupied_bytes: self.occupied_bytes,
            once: self.once,
            refcount: self.refcount,
            released: self.is_released(),
            default_state: self.default_state,
            name: self.name.clone(),
        }
    }
}

/// Snapshot of a page, as returned by
/// [`ResourceManager::pages`](crate::ResourceManager::pages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// Page kind.
    pub kind: PageKind,
    /// Index inside its pool.
    pub index: u32,
    /// Fixed capacity in bytes.
    pub capacity: u64,
    /// Bytes handed out so far.
    pub occupied_bytes: u64,
    /// Whether this is a write-once/read-once staging page.
    pub once: bool,
    /// Once-resources still waiting for their transfer.
    pub refcount: u32,
    /// Whether the backing memory was released.
    pub released: bool,
    /// Resting state the page was matched on.
    pub default_state: ResourceState,
    /// Names of every resource placed in the page.
    pub name: String,
}
