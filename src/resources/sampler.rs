//! Sampler descriptors.
//!
//! Samplers are fixed-size descriptors with no page association.

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Point,
    Linear,
}

/// Behavior outside the [0, 1] texture coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
    MirrorOnce,
}

/// Depth comparison for shadow samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Description of a sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub mip_filter: FilterMode,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    /// 1 disables anisotropic filtering.
    pub max_anisotropy: u32,
    pub mip_lod_bias: f32,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: [f32; 4],
    pub compare: Option<CompareFunction>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self::linear_wrap()
    }
}

impl SamplerDesc {
    fn with_filter_and_address(filter: FilterMode, address: AddressMode) -> Self {
        Self {
            min_filter: filter,
            mag_filter: filter,
            mip_filter: filter,
            address_u: address,
            address_v: address,
            address_w: address,
            max_anisotropy: 1,
            mip_lod_bias: 0.0,
            min_lod: 0.0,
            max_lod: f32::MAX,
            border_color: [0.0; 4],
            compare: None,
        }
    }

    /// Trilinear filtering, wrapping coordinates.
    pub fn linear_wrap() -> Self {
        Self::with_filter_and_address(FilterMode::Linear, AddressMode::Wrap)
    }

    /// Nearest filtering, clamped coordinates.
    pub fn point_clamp() -> Self {
        Self::with_filter_and_address(FilterMode::Point, AddressMode::Clamp)
    }

    /// Anisotropic filtering with the given maximum.
    pub fn anisotropic(max_anisotropy: u32) -> Self {
        Self {
            max_anisotropy,
            ..Self::linear_wrap()
        }
    }

    /// Shadow-map comparison sampler.
    pub fn shadow(compare: CompareFunction) -> Self {
        Self {
            compare: Some(compare),
            ..Self::with_filter_and_address(FilterMode::Linear, AddressMode::Border)
        }
    }
}

/// A sampler descriptor slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampler {
    pub(crate) desc: SamplerDesc,
    pub(crate) name: String,
    pub(crate) descriptor_index: u32,
}

impl Sampler {
    /// The (immutable) descriptor.
    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    /// Debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot inside the scope's sampler table.
    pub fn descriptor_index(&self) -> u32 {
        self.descriptor_index
    }
}
