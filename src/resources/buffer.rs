//! Buffer descriptors and records.

use crate::device::{PageKind, ResourceState};
use crate::resources::{Residency, ResourceFlags, StagedRecord, StagingResources, TransferState};
use crate::transfer::CopyShape;
use crate::util::layout::align_up;

/// Constant buffers are sized in multiples of this.
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

/// Index element width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    /// 16-bit indices.
    U16,
    /// 32-bit indices.
    U32,
}

impl IndexFormat {
    /// Bytes per index.
    pub fn size(self) -> u32 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Untyped bytes.
    Raw,
    /// Array of fixed-stride structures.
    Structured,
    /// Vertex stream.
    Vertex,
    /// Index stream.
    Index(IndexFormat),
    /// Shader constants.
    Constant,
}

/// Description of a buffer to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDesc {
    /// Binding kind.
    pub kind: BufferKind,
    /// Number of elements.
    pub count: u64,
    /// Bytes per element.
    pub stride: u32,
    /// Access and usage flags.
    pub flags: ResourceFlags,
    /// Resting state override; derived from the kind when `None`.
    pub default_state: Option<ResourceState>,
}

impl BufferDesc {
    fn new(kind: BufferKind, count: u64, stride: u32) -> Self {
        Self {
            kind,
            count,
            stride,
            flags: ResourceFlags::empty(),
            default_state: None,
        }
    }

    /// `size` untyped bytes.
    pub fn raw(size: u64) -> Self {
        Self::new(BufferKind::Raw, size, 1)
    }

    /// `count` structures of `stride` bytes.
    pub fn structured(count: u64, stride: u32) -> Self {
        Self::new(BufferKind::Structured, count, stride)
    }

    /// `count` vertices of `stride` bytes.
    pub fn vertex(count: u64, stride: u32) -> Self {
        Self::new(BufferKind::Vertex, count, stride)
    }

    /// `count` indices.
    pub fn index(count: u64, format: IndexFormat) -> Self {
        Self::new(BufferKind::Index(format), count, format.size())
    }

    /// `size` bytes of shader constants.
    pub fn constant(size: u64) -> Self {
        Self::new(BufferKind::Constant, size, 1)
    }

    /// Builder pattern: set flags.
    pub fn with_flags(mut self, flags: ResourceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builder pattern: override the resting state.
    pub fn with_default_state(mut self, state: ResourceState) -> Self {
        self.default_state = Some(state);
        self
    }

    /// Logical size in bytes (`count * stride`, constants rounded to 256).
    ///
    /// `None` when the size does not fit in a `u64`.
    pub fn logical_size(&self) -> Option<u64> {
        let size = self.count.checked_mul(u64::from(self.stride))?;
        match self.kind {
            BufferKind::Constant => align_up(size, CONSTANT_BUFFER_ALIGNMENT),
            _ => Some(size),
        }
    }

    /// The state the buffer rests in between transfers.
    pub fn resolved_state(&self) -> ResourceState {
        if let Some(state) = self.default_state {
            return state;
        }
        match self.kind {
            BufferKind::Vertex | BufferKind::Constant => ResourceState::VertexAndConstantBuffer,
            BufferKind::Index(_) => ResourceState::IndexBuffer,
            BufferKind::Raw | BufferKind::Structured => {
                if self.flags.contains(ResourceFlags::UNORDERED_ACCESS) {
                    ResourceState::UnorderedAccess
                } else {
                    ResourceState::ShaderResource
                }
            }
        }
    }
}

/// A buffer placed in a device page.
#[derive(Debug)]
pub struct Buffer<R> {
    pub(crate) desc: BufferDesc,
    pub(crate) name: String,
    pub(crate) size: u64,
    pub(crate) default_state: ResourceState,
    pub(crate) residency: Residency,
    pub(crate) staging: StagingResources<R>,
    pub(crate) resource: R,
    pub(crate) transfer_state: TransferState,
}

impl<R> Buffer<R> {
    /// The descriptor the buffer was allocated with.
    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes per element.
    pub fn stride(&self) -> u32 {
        self.desc.stride
    }

    /// State the buffer rests in between transfers.
    pub fn default_state(&self) -> ResourceState {
        self.default_state
    }

    /// Page placements of the buffer and its staging copies.
    pub fn residency(&self) -> &Residency {
        &self.residency
    }

    /// The device resource, for binding into views.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Where the buffer is in its transfer lifecycle.
    pub fn transfer_state(&self) -> TransferState {
        self.transfer_state
    }
}

impl<R> StagedRecord<R> for Buffer<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn residency(&self) -> &Residency {
        &self.residency
    }

    fn residency_mut(&mut self) -> &mut Residency {
        &mut self.residency
    }

    fn default_state(&self) -> ResourceState {
        self.default_state
    }

    fn resource(&self) -> &R {
        &self.resource
    }

    fn staging_resource(&self, kind: PageKind) -> Option<&R> {
        self.staging.get(kind)
    }

    fn take_staging_resource(&mut self, kind: PageKind) -> Option<R> {
        self.staging.take(kind)
    }

    fn transfer_state(&self) -> TransferState {
        self.transfer_state
    }

    fn set_transfer_state(&mut self, state: TransferState) {
        self.transfer_state = state;
    }

    fn copy_shape(&self) -> CopyShape<'_> {
        CopyShape::Buffer { size: self.size }
    }
}
