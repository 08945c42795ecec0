//! Pools - pages and records of one resource kind in one scope.

use crate::allocators::page::{Page, PageBacking};
use crate::device::{Device, DeviceError, PageKind, PlacedResource, PlacementDesc, ResourceState};
use crate::error::{ResourceError, Result};
use crate::resources::sampler::Sampler;
use crate::resources::texture::Texture;
use crate::resources::{buffer::Buffer, Placement, StagedRecord, StagingSlot};

/// A placement request.
pub(crate) struct PlaceRequest<'a> {
    pub kind: PageKind,
    /// Aligned size in bytes.
    pub size: u64,
    /// Page size to use when a new page is needed.
    pub page_size: u64,
    /// Resting state; device pages only hold resources sharing it.
    pub default_state: ResourceState,
    /// Staging pages only hold resources sharing the once flag.
    pub once: bool,
    pub resource: PlacedResource<'a>,
    pub name: &'a str,
}

/// Result of looking up a staging slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StagingStatus {
    /// The record has no staging slot of this kind.
    Missing,
    /// The once-slot completed its transfer or its page was released.
    Released,
    /// Usable.
    Live(StagingSlot),
}

/// Growable page lists plus the records placed in them.
///
/// Records are declared first so their device resources drop before the heaps.
pub(crate) struct Pool<D: Device, T> {
    pub records: Vec<T>,
    pub device_pages: Vec<Page<D>>,
    pub upload_pages: Vec<Page<D>>,
    pub readback_pages: Vec<Page<D>>,
}

impl<D: Device, T> Pool<D, T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            device_pages: Vec::new(),
            upload_pages: Vec::new(),
            readback_pages: Vec::new(),
        }
    }

    pub fn pages(&self, kind: PageKind) -> &[Page<D>] {
        match kind {
            PageKind::Device => &self.device_pages,
            PageKind::Upload => &self.upload_pages,
            PageKind::Readback => &self.readback_pages,
        }
    }

    fn pages_mut(&mut self, kind: PageKind) -> &mut Vec<Page<D>> {
        match kind {
            PageKind::Device => &mut self.device_pages,
            PageKind::Upload => &mut self.upload_pages,
            PageKind::Readback => &mut self.readback_pages,
        }
    }

    /// First-fit placement; creates a page when nothing fits.
    ///
    /// New pages get `max(page_size, size)` bytes, so the request always lands
    /// in the page it created. Once-placements retain their page.
    pub fn place(&mut self, device: &mut D, req: &PlaceRequest<'_>) -> Result<(Placement, D::Resource)> {
        let pages = self.pages_mut(req.kind);

        let existing = pages.iter().position(|page| {
            page.fits(req.size)
                && match req.kind {
                    PageKind::Device => page.default_state() == req.default_state,
                    PageKind::Upload | PageKind::Readback => page.is_once() == req.once,
                }
        });

        let index = match existing {
            Some(index) => index,
            None => {
                let capacity = req.size.max(req.page_size);
                let page_state = match req.kind {
                    PageKind::Device => req.default_state,
                    staging => staging.resting_state(),
                };
                let page = Page::create(device, req.kind, capacity, page_state, req.once).map_err(|e| match e {
                    DeviceError::OutOfMemory { .. } => ResourceError::OutOfDeviceMemory {
                        kind: req.kind,
                        size: capacity,
                    },
                    other => ResourceError::Device(other),
                })?;
                log::debug!(
                    "created {:?} page #{} ({} bytes{})",
                    req.kind,
                    pages.len(),
                    capacity,
                    if req.once { ", once" } else { "" }
                );
                pages.push(page);
                pages.len() - 1
            }
        };

        let page = &mut pages[index];
        let offset = page.try_place(req.size).ok_or(ResourceError::Device(DeviceError::Backend(
            "page rejected a placement it reported room for".to_string(),
        )))?;

        let heap = page
            .heap()
            .ok_or(ResourceError::Device(DeviceError::Backend("placement in a released page".to_string())))?;
        let initial_state = match req.kind {
            PageKind::Device => req.default_state,
            staging => staging.resting_state(),
        };
        let resource = device.create_placed_resource(
            heap,
            &PlacementDesc {
                offset,
                size: req.size,
                resource: req.resource,
                initial_state,
            },
        )?;

        if req.once {
            page.retain();
        }
        page.append_name(req.name);
        if let Some(heap) = page.heap() {
            device.set_heap_name(heap, page.name());
        }

        log::trace!(
            "placed '{}' in {:?} page #{} at {} ({} bytes)",
            req.name,
            req.kind,
            index,
            offset,
            req.size
        );

        Ok((
            Placement {
                page: index as u32,
                offset,
                size: req.size,
            },
            resource,
        ))
    }

    /// Drop one reference of a once-page, e.g. to undo a failed allocation.
    pub fn release_page_ref(&mut self, kind: PageKind, page: u32) -> Option<PageBacking<D>> {
        self.pages_mut(kind).get_mut(page as usize)?.release_ref()
    }
}

impl<D: Device, T: StagedRecord<D::Resource>> Pool<D, T> {
    /// Look up the staging slot of a record.
    pub fn staging_status(&self, index: usize, kind: PageKind) -> StagingStatus {
        let Some(record) = self.records.get(index) else {
            return StagingStatus::Missing;
        };
        match record.residency().staging(kind) {
            None => StagingStatus::Missing,
            Some(slot) => {
                let released = self
                    .pages(kind)
                    .get(slot.placement.page as usize)
                    .map_or(true, |page| page.is_released());
                if slot.consumed || released {
                    StagingStatus::Released
                } else {
                    StagingStatus::Live(*slot)
                }
            }
        }
    }

    /// A record together with the CPU mapping of its staging page.
    pub fn record_and_mapping(&mut self, index: usize, kind: PageKind) -> Option<(&mut T, &mut D::Mapping, StagingSlot)> {
        let record = self.records.get_mut(index)?;
        let slot = *record.residency().staging(kind)?;
        let pages = match kind {
            PageKind::Device => return None,
            PageKind::Upload => &mut self.upload_pages,
            PageKind::Readback => &mut self.readback_pages,
        };
        let mapping = pages.get_mut(slot.placement.page as usize)?.mapping_mut()?;
        Some((record, mapping, slot))
    }

    /// Mark a once-slot as consumed after its transfer.
    ///
    /// Returns the record's staging resource and, when this was the page's
    /// last pending resource, the page backing. Both must outlive any GPU work
    /// still referencing them.
    pub fn consume_once(&mut self, index: usize, kind: PageKind) -> (Option<D::Resource>, Option<PageBacking<D>>) {
        let Some(record) = self.records.get_mut(index) else {
            return (None, None);
        };
        let page = match record.residency_mut().staging_mut(kind) {
            Some(slot) if slot.once && !slot.consumed => {
                slot.consumed = true;
                slot.placement.page
            }
            _ => return (None, None),
        };
        let resource = record.take_staging_resource(kind);
        let backing = self.release_page_ref(kind, page);
        (resource, backing)
    }
}

/// Every pool of one scope.
///
/// Dropping it releases every record, then every page, then retired staging.
pub(crate) struct ScopePools<D: Device> {
    pub buffers: Pool<D, Buffer<D::Resource>>,
    pub textures: Pool<D, Texture<D::Resource>>,
    pub samplers: Vec<Sampler>,
    /// Released once-staging still referenced by recorded GPU copies;
    /// resources are declared before the pages backing them.
    pub retired_resources: Vec<D::Resource>,
    pub retired_pages: Vec<PageBacking<D>>,
    /// Bumped every time the scope is freed.
    pub generation: u32,
}

impl<D: Device> ScopePools<D> {
    pub fn new(generation: u32) -> Self {
        Self {
            buffers: Pool::new(),
            textures: Pool::new(),
            samplers: Vec::new(),
            retired_resources: Vec::new(),
            retired_pages: Vec::new(),
            generation,
        }
    }

    /// Drop retired staging; returns the number of pages released.
    pub fn release_retired(&mut self) -> usize {
        let pages = self.retired_pages.len();
        self.retired_resources.clear();
        self.retired_pages.clear();
        pages
    }
}
