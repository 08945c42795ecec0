//! Device abstraction traits and types.
//!
//! This module defines the interface the manager consumes WITHOUT pulling in
//! any backend-specific dependencies. Heaps, placed resources and CPU mappings
//! are associated types owned by the manager's pages and records; dropping
//! them releases the backing object.

use thiserror::Error;

use crate::resources::texture::{SubresourceFootprint, TextureDesc, TextureLayout};

/// The three kinds of coarse memory block a page can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// GPU-local memory, not CPU addressable.
    Device,
    /// CPU-writable, GPU-readable staging memory.
    Upload,
    /// GPU-writable, CPU-readable staging memory.
    Readback,
}

impl PageKind {
    /// Whether pages of this kind are mapped for CPU access.
    pub fn is_cpu_visible(self) -> bool {
        !matches!(self, PageKind::Device)
    }

    /// The state a staging page's buffer rests in between transfers.
    pub fn resting_state(self) -> ResourceState {
        match self {
            PageKind::Device => ResourceState::Common,
            PageKind::Upload => ResourceState::GenericRead,
            PageKind::Readback => ResourceState::CopyDest,
        }
    }
}

/// Usage state of a GPU resource, as declared to barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// No particular usage.
    Common,
    /// Any read-only usage (staging upload buffers live here).
    GenericRead,
    /// Source of a copy.
    CopySource,
    /// Destination of a copy.
    CopyDest,
    /// Vertex or constant buffer input.
    VertexAndConstantBuffer,
    /// Index buffer input.
    IndexBuffer,
    /// Read by shaders through a resource view.
    ShaderResource,
    /// Read and written by shaders through an unordered-access view.
    UnorderedAccess,
    /// Color attachment.
    RenderTarget,
    /// Depth/stencil attachment.
    DepthWrite,
    /// Indirect draw/dispatch arguments.
    IndirectArgument,
}

/// Errors reported by the device abstraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// The device could not back a heap of the requested size.
    #[error("device out of memory: requested {requested} bytes")]
    OutOfMemory {
        /// Requested heap size in bytes.
        requested: u64,
    },
    /// Mapping was requested for memory that is not CPU visible.
    #[error("{0:?} memory cannot be mapped for CPU access")]
    NotMappable(PageKind),
    /// A placed resource or mapped access falls outside its memory block.
    #[error("range [{offset}, {offset}+{len}) exceeds a block of {size} bytes")]
    OutOfBounds {
        /// Start of the range.
        offset: u64,
        /// Length of the range.
        len: u64,
        /// Size of the block.
        size: u64,
    },
    /// Backend-specific error (opaque).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Hardware limits reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Minimum alignment of resources placed in a heap; every logical size
    /// is rounded up to this before page placement.
    pub placement_alignment: u64,
    /// Row pitch alignment of texture data in buffers.
    pub texture_pitch_alignment: u64,
    /// Offset alignment of each texture subresource in buffers.
    pub texture_placement_alignment: u64,
    /// Maximum width of a 1D texture.
    pub max_texture_dimension_1d: u32,
    /// Maximum width/height of a 2D texture.
    pub max_texture_dimension_2d: u32,
    /// Maximum width/height/depth of a 3D texture.
    pub max_texture_dimension_3d: u32,
    /// Maximum face size of a cube texture.
    pub max_texture_dimension_cube: u32,
    /// Maximum number of array slices (cube faces count individually).
    pub max_texture_array_layers: u32,
    /// Maximum sampler anisotropy.
    pub max_anisotropy: u32,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            placement_alignment: 64 * 1024,
            texture_pitch_alignment: 256,
            texture_placement_alignment: 512,
            max_texture_dimension_1d: 16384,
            max_texture_dimension_2d: 16384,
            max_texture_dimension_3d: 2048,
            max_texture_dimension_cube: 16384,
            max_texture_array_layers: 2048,
            max_anisotropy: 16,
        }
    }
}

impl DeviceLimits {
    /// Alignment used for staging allocations, which may hold texture footprints.
    pub fn staging_alignment(&self) -> u64 {
        self.placement_alignment.max(self.texture_placement_alignment)
    }
}

/// What kind of resource is being placed into a heap.
#[derive(Debug, Clone, Copy)]
pub enum PlacedResource<'a> {
    /// A linear buffer.
    Buffer,
    /// A texture with the given (already clamped) descriptor.
    Texture(&'a TextureDesc),
}

/// Placement of a resource inside a heap.
#[derive(Debug, Clone, Copy)]
pub struct PlacementDesc<'a> {
    /// Byte offset inside the heap.
    pub offset: u64,
    /// Size of the placed range in bytes.
    pub size: u64,
    /// Resource flavor.
    pub resource: PlacedResource<'a>,
    /// State the resource is created in.
    pub initial_state: ResourceState,
}

/// CPU access to a mapped staging resource.
///
/// Offsets are relative to the start of the mapped resource.
pub trait CpuMapping {
    /// Copy `data` into mapped memory at `offset`.
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    /// Fill `len` bytes at `offset` with `value`.
    fn fill(&mut self, offset: u64, len: u64, value: u8) -> Result<(), DeviceError>;

    /// Copy mapped memory at `offset` into `out`.
    fn read(&self, offset: u64, out: &mut [u8]) -> Result<(), DeviceError>;
}

/// Core device trait - the backend the manager sub-allocates from.
pub trait Device {
    /// Backing memory block. Dropping it releases the memory.
    type Heap;
    /// A resource placed in a heap. Dropping it destroys the resource.
    type Resource;
    /// A CPU mapping of a staging resource. Dropping it unmaps.
    type Mapping: CpuMapping;

    /// Hardware limits.
    fn limits(&self) -> DeviceLimits;

    /// Create a heap of `size` bytes for pages of `kind`.
    fn create_heap(&mut self, kind: PageKind, size: u64) -> Result<Self::Heap, DeviceError>;

    /// Create a resource at a fixed offset inside `heap`.
    fn create_placed_resource(
        &mut self,
        heap: &Self::Heap,
        desc: &PlacementDesc<'_>,
    ) -> Result<Self::Resource, DeviceError>;

    /// Map a resource living in an upload or readback heap.
    fn map(&mut self, resource: &Self::Resource) -> Result<Self::Mapping, DeviceError>;

    /// Linear byte layout of a texture when staged in a buffer.
    fn texture_layout(&self, desc: &TextureDesc) -> TextureLayout;

    /// Attach a debug name to a heap (for capture tools). Optional.
    fn set_heap_name(&mut self, _heap: &Self::Heap, _name: &str) {}
}

/// A single resource-state transition inside a barrier batch.
#[derive(Debug)]
pub struct Transition<'a, R> {
    /// Resource changing state.
    pub resource: &'a R,
    /// State before the barrier.
    pub before: ResourceState,
    /// State after the barrier.
    pub after: ResourceState,
}

/// One side of a texture copy.
#[derive(Debug)]
pub enum TextureCopyLocation<'a, R> {
    /// A subresource of a texture, by subresource index.
    Subresource {
        /// The texture.
        resource: &'a R,
        /// Subresource index (`mip + slice * mips + plane * mips * slices`).
        index: u32,
    },
    /// Linear texel data inside a buffer.
    Footprint {
        /// The buffer.
        resource: &'a R,
        /// Layout of the data; `footprint.offset` is relative to the buffer start.
        footprint: SubresourceFootprint,
    },
}

/// Command recording surface used by the transfer orchestrator.
///
/// The manager records; executing and fencing is the caller's business.
pub trait CommandRecorder<R> {
    /// Submit one batch of state transitions.
    fn resource_barriers(&mut self, transitions: &[Transition<'_, R>]);

    /// Copy `size` bytes between two buffers.
    fn copy_buffer_region(&mut self, dst: &R, dst_offset: u64, src: &R, src_offset: u64, size: u64);

    /// Copy one texture subresource to or from a buffer footprint.
    fn copy_texture_region(&mut self, dst: TextureCopyLocation<'_, R>, src: TextureCopyLocation<'_, R>);
}
