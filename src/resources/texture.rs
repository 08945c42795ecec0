//! Texture descriptors, formats, linear layouts and limit clamping.

use crate::device::{DeviceLimits, PageKind, ResourceState};
use crate::diagnostics::{Diagnostic, GP101, GP102, GP103};
use crate::resources::{Residency, ResourceFlags, StagedRecord, StagingResources, TransferState};
use crate::transfer::CopyShape;
use crate::util::layout::{align_up, div_ceil};

/// Texture dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    /// 1D texture (height and depth are 1).
    D1,
    /// 2D texture.
    D2,
    /// 3D volume texture (array size is 1).
    D3,
    /// Cube texture; every array layer holds 6 faces.
    Cube,
}

/// Texel formats understood by the layout code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    R32Uint,
    Depth32Float,
    /// Two planes: 24-bit depth (stored in 4 bytes) and 8-bit stencil.
    Depth24UnormStencil8,
    Bc1Unorm,
    Bc3Unorm,
    Bc7Unorm,
}

impl TextureFormat {
    /// Width/height of a compression block (1 for uncompressed formats).
    pub fn block_extent(self) -> u32 {
        match self {
            TextureFormat::Bc1Unorm | TextureFormat::Bc3Unorm | TextureFormat::Bc7Unorm => 4,
            _ => 1,
        }
    }

    /// Number of planes; each plane is a separate set of subresources.
    pub fn plane_count(self) -> u32 {
        match self {
            TextureFormat::Depth24UnormStencil8 => 2,
            _ => 1,
        }
    }

    /// Bytes per texel (or per block) of the given plane.
    pub fn bytes_per_block(self, plane: u32) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm | TextureFormat::R16Float => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Rg16Float
            | TextureFormat::R32Float
            | TextureFormat::R32Uint
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float | TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Depth24UnormStencil8 => {
                if plane == 0 {
                    4
                } else {
                    1
                }
            }
            TextureFormat::Bc1Unorm => 8,
            TextureFormat::Bc3Unorm | TextureFormat::Bc7Unorm => 16,
        }
    }

    /// Whether this is a depth or depth/stencil format.
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth32Float | TextureFormat::Depth24UnormStencil8)
    }
}

/// Number of levels in a full mip chain for the given extent.
pub fn full_mip_count(width: u32, height: u32, depth: u32) -> u32 {
    let largest = width.max(height).max(depth).max(1);
    32 - largest.leading_zeros()
}

/// Description of a texture to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    /// Dimensionality.
    pub dimension: TextureDimension,
    /// Texel format.
    pub format: TextureFormat,
    /// Width in texels.
    pub width: u32,
    /// Height in texels (1 for 1D).
    pub height: u32,
    /// Depth in texels (1 unless 3D).
    pub depth: u32,
    /// Array layers (cube: number of cubes).
    pub array_layers: u32,
    /// Mip levels; 0 requests the full chain.
    pub mip_levels: u32,
    /// Access and usage flags.
    pub flags: ResourceFlags,
    /// Resting state override; derived from the flags when `None`.
    pub default_state: Option<ResourceState>,
}

impl TextureDesc {
    fn new(dimension: TextureDimension, format: TextureFormat, width: u32, height: u32, depth: u32) -> Self {
        Self {
            dimension,
            format,
            width,
            height,
            depth,
            array_layers: 1,
            mip_levels: 1,
            flags: ResourceFlags::empty(),
            default_state: None,
        }
    }

    /// A 1D texture.
    pub fn d1(format: TextureFormat, width: u32) -> Self {
        Self::new(TextureDimension::D1, format, width, 1, 1)
    }

    /// A 2D texture.
    pub fn d2(format: TextureFormat, width: u32, height: u32) -> Self {
        Self::new(TextureDimension::D2, format, width, height, 1)
    }

    /// A 3D texture.
    pub fn d3(format: TextureFormat, width: u32, height: u32, depth: u32) -> Self {
        Self::new(TextureDimension::D3, format, width, height, depth)
    }

    /// A cube texture with square faces.
    pub fn cube(format: TextureFormat, size: u32) -> Self {
        Self::new(TextureDimension::Cube, format, size, size, 1)
    }

    /// Builder pattern: set mip levels (0 = full chain).
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Builder pattern: set array layers.
    pub fn with_array_layers(mut self, array_layers: u32) -> Self {
        self.array_layers = array_layers;
        self
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

    /// Number of array slices (cube faces counted individually).
    pub fn slice_count(&self) -> u32 {
        match self.dimension {
            TextureDimension::Cube => self.array_layers * 6,
            _ => self.array_layers,
        }
    }

    /// Number of subresources (mips × slices × planes).
    pub fn subresource_count(&self) -> u32 {
        self.mip_levels * self.slice_count() * self.format.plane_count()
    }

    /// Subresource index of a (mip, slice, plane) triple.
    pub fn subresource_index(&self, mip: u32, slice: u32, plane: u32) -> u32 {
        mip + slice * self.mip_levels + plane * self.mip_levels * self.slice_count()
    }

    /// The state the texture rests in between transfers.
    pub fn resolved_state(&self) -> ResourceState {
        if let Some(state) = self.default_state {
            return state;
        }
        if self.flags.contains(ResourceFlags::RENDER_TARGET) {
            ResourceState::RenderTarget
        } else if self.flags.contains(ResourceFlags::DEPTH_STENCIL) {
            ResourceState::DepthWrite
        } else if self.flags.contains(ResourceFlags::UNORDERED_ACCESS) {
            ResourceState::UnorderedAccess
        } else {
            ResourceState::ShaderResource
        }
    }
}

/// A limit violation that was corrected during allocation.
#[derive(Debug, Clone)]
pub(crate) struct Clamp {
    pub diagnostic: &'static Diagnostic,
    pub context: String,
}

fn clamp_extent(field: &str, value: &mut u32, max: u32, clamps: &mut Vec<Clamp>) {
    if *value > max {
        clamps.push(Clamp {
            diagnostic: &GP101,
            context: format!("{} {} clamped to {}", field, value, max),
        });
        *value = max;
    }
}

/// Clamp a descriptor to the device limits.
///
/// Zero extents are rejected by the caller before this runs.
pub(crate) fn clamp_to_limits(desc: &TextureDesc, limits: &DeviceLimits) -> (TextureDesc, Vec<Clamp>) {
    let mut out = *desc;
    let mut clamps = Vec::new();

    match out.dimension {
        TextureDimension::D1 => {
            clamp_extent("width", &mut out.width, limits.max_texture_dimension_1d, &mut clamps);
            clamp_extent("height", &mut out.height, 1, &mut clamps);
            clamp_extent("depth", &mut out.depth, 1, &mut clamps);
        }
        TextureDimension::D2 => {
            clamp_extent("width", &mut out.width, limits.max_texture_dimension_2d, &mut clamps);
            clamp_extent("height", &mut out.height, limits.max_texture_dimension_2d, &mut clamps);
            clamp_extent("depth", &mut out.depth, 1, &mut clamps);
        }
        TextureDimension::D3 => {
            clamp_extent("width", &mut out.width, limits.max_texture_dimension_3d, &mut clamps);
            clamp_extent("height", &mut out.height, limits.max_texture_dimension_3d, &mut clamps);
            clamp_extent("depth", &mut out.depth, limits.max_texture_dimension_3d, &mut clamps);
        }
        TextureDimension::Cube => {
            clamp_extent("width", &mut out.width, limits.max_texture_dimension_cube, &mut clamps);
            // Cube faces are square.
            let face = out.width;
            clamp_extent("height", &mut out.height, face, &mut clamps);
            if out.height < face {
                clamps.push(Clamp {
                    diagnostic: &GP101,
                    context: format!("cube face width {} clamped to height {}", face, out.height),
                });
                out.width = out.height;
            }
            clamp_extent("depth", &mut out.depth, 1, &mut clamps);
        }
    }

    let max_layers = match out.dimension {
        TextureDimension::D3 => 1,
        TextureDimension::Cube => (limits.max_texture_array_layers / 6).max(1),
        _ => limits.max_texture_array_layers,
    };
    if out.array_layers > max_layers {
        clamps.push(Clamp {
            diagnostic: &GP103,
            context: format!("array layers {} clamped to {}", out.array_layers, max_layers),
        });
        out.array_layers = max_layers;
    }

    let full = full_mip_count(out.width, out.height, out.depth);
    if out.mip_levels == 0 {
        out.mip_levels = full;
    } else if out.mip_levels > full {
        clamps.push(Clamp {
            diagnostic: &GP102,
            context: format!("mip levels {} clamped to {}", out.mip_levels, full),
        });
        out.mip_levels = full;
    }

    (out, clamps)
}

/// Linear layout of one subresource when staged in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceFootprint {
    /// Byte offset of the subresource.
    pub offset: u64,
    /// Width of the mip level in texels.
    pub width: u32,
    /// Height of the mip level in texels.
    pub height: u32,
    /// Depth of the mip level in texels.
    pub depth: u32,
    /// Tightly packed bytes per row (of texels or blocks).
    pub row_size: u64,
    /// Padded bytes per row on the device side.
    pub row_pitch: u64,
    /// Rows per depth slice (block rows for compressed formats).
    pub row_count: u32,
}

impl SubresourceFootprint {
    /// Bytes covered on the device side, padding included.
    pub fn padded_size(&self) -> u64 {
        self.row_pitch
            .saturating_mul(u64::from(self.row_count))
            .saturating_mul(u64::from(self.depth))
    }

    /// Bytes of the tightly packed data.
    pub fn packed_size(&self) -> u64 {
        self.row_size * u64::from(self.row_count) * u64::from(self.depth)
    }

    /// The same footprint moved by `delta` bytes.
    pub fn shifted(mut self, delta: u64) -> Self {
        self.offset += delta;
        self
    }
}

/// Linear byte layout of a whole texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureLayout {
    /// One footprint per subresource, in subresource-index order.
    pub subresources: Vec<SubresourceFootprint>,
    /// Total bytes the layout spans.
    pub total_bytes: u64,
}

/// Compute the linear layout of a texture with the given row pitch and
/// subresource placement alignments.
pub fn compute_texture_layout(desc: &TextureDesc, pitch_alignment: u64, placement_alignment: u64) -> TextureLayout {
    let block = desc.format.block_extent();
    let mut subresources = Vec::with_capacity(desc.subresource_count() as usize);
    let mut offset = 0u64;

    for plane in 0..desc.format.plane_count() {
        for _slice in 0..desc.slice_count() {
            for mip in 0..desc.mip_levels {
                let width = (desc.width >> mip).max(1);
                let height = (desc.height >> mip).max(1);
                let depth = match desc.dimension {
                    TextureDimension::D3 => (desc.depth >> mip).max(1),
                    _ => 1,
                };

                let columns = div_ceil(u64::from(width), u64::from(block));
                let rows = div_ceil(u64::from(height), u64::from(block));
                let row_size = columns * u64::from(desc.format.bytes_per_block(plane));

                // Saturates; the manager rejects layouts it cannot place.
                offset = align_up(offset, placement_alignment).unwrap_or(u64::MAX);
                let footprint = SubresourceFootprint {
                    offset,
                    width,
                    height,
                    depth,
                    row_size,
                    row_pitch: align_up(row_size, pitch_alignment).unwrap_or(u64::MAX),
                    row_count: rows as u32,
                };
                offset = offset.saturating_add(footprint.padded_size());
                subresources.push(footprint);
            }
        }
    }

    TextureLayout {
        subresources,
        total_bytes: offset,
    }
}

/// Source data for one subresource of a texture update.
#[derive(Debug, Clone, Copy)]
pub struct SubresourceData<'a> {
    /// Texel bytes.
    pub data: &'a [u8],
    /// Bytes between rows in `data`; `None` means tightly packed.
    pub row_pitch: Option<u64>,
    /// Bytes between depth slices in `data`; `None` means tightly packed.
    pub slice_pitch: Option<u64>,
}

impl<'a> SubresourceData<'a> {
    /// Tightly packed rows.
    pub fn packed(data: &'a [u8]) -> Self {
        Self {
            data,
            row_pitch: None,
            slice_pitch: None,
        }
    }

    /// Rows separated by `row_pitch` bytes.
    pub fn with_row_pitch(data: &'a [u8], row_pitch: u64) -> Self {
        Self {
            data,
            row_pitch: Some(row_pitch),
            slice_pitch: None,
        }
    }
}

/// A texture placed in a device page.
#[derive(Debug)]
pub struct Texture<R> {
    pub(crate) desc: TextureDesc,
    pub(crate) name: String,
    pub(crate) layout: TextureLayout,
    pub(crate) default_state: ResourceState,
    pub(crate) residency: Residency,
    pub(crate) staging: StagingResources<R>,
    pub(crate) resource: R,
    pub(crate) transfer_state: TransferState,
}

impl<R> Texture<R> {
    /// The descriptor after clamping to device limits.
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Texel format.
    pub fn format(&self) -> TextureFormat {
        self.desc.format
    }

    /// Mip levels actually allocated.
    pub fn mip_levels(&self) -> u32 {
        self.desc.mip_levels
    }

    /// Linear staging layout.
    pub fn layout(&self) -> &TextureLayout {
        &self.layout
    }

    /// State the texture rests in between transfers.
    pub fn default_state(&self) -> ResourceState {
        self.default_state
    }

    /// Page placements of the texture and its staging copies.
    pub fn residency(&self) -> &Residency {
        &self.residency
    }

    /// The device resource, for binding into views.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Where the texture is in its transfer lifecycle.
    pub fn transfer_state(&self) -> TransferState {
        self.transfer_state
    }
}

impl<R> StagedRecord<R> for Texture<R> {
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
        CopyShape::Texture(&self.layout)
    }
}
