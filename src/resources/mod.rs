//! Resource records and descriptors.
//!
//! A record places a logical resource inside pages: always a Device page,
//! plus an Upload page when CPU writes are requested and a Readback page when
//! CPU reads are requested.

pub mod buffer;
pub mod sampler;
pub mod texture;

use bitflags::bitflags;

use crate::device::{PageKind, ResourceState};
use crate::transfer::CopyShape;

bitflags! {
    /// Access and usage flags of a buffer or texture.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        /// CPU writes through a reusable upload allocation.
        const CPU_WRITE = 1 << 0;
        /// CPU writes through an upload allocation released after one upload.
        const CPU_WRITE_ONCE = 1 << 1;
        /// CPU reads through a reusable readback allocation.
        const CPU_READ = 1 << 2;
        /// CPU reads through a readback allocation released after one read.
        const CPU_READ_ONCE = 1 << 3;
        /// Usable as a color attachment (textures only).
        const RENDER_TARGET = 1 << 4;
        /// Usable as a depth/stencil attachment (textures only).
        const DEPTH_STENCIL = 1 << 5;
        /// Writable from shaders.
        const UNORDERED_ACCESS = 1 << 6;
    }
}

impl ResourceFlags {
    /// Whether an upload allocation is needed.
    pub fn needs_upload(self) -> bool {
        self.intersects(Self::CPU_WRITE | Self::CPU_WRITE_ONCE)
    }

    /// Whether a readback allocation is needed.
    pub fn needs_readback(self) -> bool {
        self.intersects(Self::CPU_READ | Self::CPU_READ_ONCE)
    }

    /// Check for contradictory combinations.
    pub(crate) fn validate(self, is_texture: bool) -> Result<(), &'static str> {
        if self.contains(Self::CPU_WRITE | Self::CPU_WRITE_ONCE) {
            return Err("CPU_WRITE and CPU_WRITE_ONCE are mutually exclusive");
        }
        if self.contains(Self::CPU_READ | Self::CPU_READ_ONCE) {
            return Err("CPU_READ and CPU_READ_ONCE are mutually exclusive");
        }
        if !is_texture && self.intersects(Self::RENDER_TARGET | Self::DEPTH_STENCIL) {
            return Err("RENDER_TARGET and DEPTH_STENCIL apply to textures only");
        }
        if self.contains(Self::RENDER_TARGET | Self::DEPTH_STENCIL) {
            return Err("RENDER_TARGET and DEPTH_STENCIL are mutually exclusive");
        }
        Ok(())
    }
}

/// A bump-allocated range inside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Index of the page inside its pool.
    pub page: u32,
    /// Byte offset inside the page.
    pub offset: u64,
    /// Aligned size of the range.
    pub size: u64,
}

impl Placement {
    /// End of the range (exclusive).
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// A staging allocation of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingSlot {
    /// Where the staging bytes live.
    pub placement: Placement,
    /// Whether the slot lives in a once-page.
    pub once: bool,
    /// Set once a once-slot completed its single transfer.
    pub consumed: bool,
}

/// Page placements of a buffer or texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Residency {
    /// Flags the resource was allocated with.
    pub flags: ResourceFlags,
    /// Device-local placement.
    pub device: Placement,
    /// Upload staging, when CPU writes were requested.
    pub upload: Option<StagingSlot>,
    /// Readback staging, when CPU reads were requested.
    pub readback: Option<StagingSlot>,
}

impl Residency {
    /// Staging slot of the given page kind (`None` for device pages).
    pub fn staging(&self, kind: PageKind) -> Option<&StagingSlot> {
        match kind {
            PageKind::Device => None,
            PageKind::Upload => self.upload.as_ref(),
            PageKind::Readback => self.readback.as_ref(),
        }
    }

    pub(crate) fn staging_mut(&mut self, kind: PageKind) -> Option<&mut StagingSlot> {
        match kind {
            PageKind::Device => None,
            PageKind::Upload => self.upload.as_mut(),
            PageKind::Readback => self.readback.as_mut(),
        }
    }

    /// Whether every staging slot is a consumed once-slot.
    pub fn staging_released(&self) -> bool {
        let slots = [self.upload, self.readback];
        let mut any = false;
        for slot in slots.iter().flatten() {
            if !(slot.once && slot.consumed) {
                return false;
            }
            any = true;
        }
        any
    }
}

/// Where a resource is in its transfer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferState {
    /// Placed, nothing written yet.
    Allocated,
    /// CPU data written to the upload page.
    Staged,
    /// Upload copy recorded; the device copy is current.
    Uploaded,
    /// Readback copy recorded; waiting for the CPU read.
    ReadbackPending,
    /// CPU read the readback page.
    Read,
    /// Every once-staging allocation of the resource was released.
    ReleasedStaging,
}

/// Common view of buffer and texture records for the transfer paths.
pub(crate) trait StagedRecord<R> {
    fn name(&self) -> &str;
    fn residency(&self) -> &Residency;
    fn residency_mut(&mut self) -> &mut Residency;
    fn default_state(&self) -> ResourceState;
    fn resource(&self) -> &R;
    fn staging_resource(&self, kind: PageKind) -> Option<&R>;
    fn take_staging_resource(&mut self, kind: PageKind) -> Option<R>;
    fn transfer_state(&self) -> TransferState;
    fn set_transfer_state(&mut self, state: TransferState);
    fn copy_shape(&self) -> CopyShape<'_>;
}

/// Per-record staging resources, placed in upload/readback pages.
#[derive(Debug)]
pub(crate) struct StagingResources<R> {
    pub upload: Option<R>,
    pub readback: Option<R>,
}

impl<R> StagingResources<R> {
    pub fn get(&self, kind: PageKind) -> Option<&R> {
        match kind {
            PageKind::Device => None,
            PageKind::Upload => self.upload.as_ref(),
            PageKind::Readback => self.readback.as_ref(),
        }
    }

    pub fn take(&mut self, kind: PageKind) -> Option<R> {
        match kind {
            PageKind::Device => None,
            PageKind::Upload => self.upload.take(),
            PageKind::Readback => self.readback.take(),
        }
    }
}
