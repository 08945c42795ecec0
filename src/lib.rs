//! # gpupages
//!
//! Page-based GPU resource memory management.
//!
//! ## Features
//!
//! - Device, upload and readback pages (bump allocation, first-fit placement)
//! - Buffers, textures and samplers in long-lived or per-scene pools
//! - Staged uploads and readbacks recorded with batched state barriers
//! - Write-once / read-once staging released after a single transfer
//! - Texture limit clamping with coded diagnostics
//! - Generational handles that go stale when their scope is freed
//! - RAM-backed dummy device for tests and tools
//!
//! ## Quick Start
//!
//! ```rust
//! use gpupages::{
//!     BufferDesc, DummyCommandList, DummyDevice, ManagerConfig, ResourceFlags, ResourceManager, Scope,
//! };
//!
//! let mut manager = ResourceManager::new(DummyDevice::new(), ManagerConfig::minimal());
//!
//! let desc = BufferDesc::vertex(3, 12).with_flags(ResourceFlags::CPU_WRITE_ONCE);
//! let vb = manager.allocate_buffer(Scope::Scene, &desc, "triangle").unwrap();
//! manager.update_buffer(vb, Some(&[0u8; 36])).unwrap();
//!
//! let mut commands = DummyCommandList::new();
//! manager.upload_resources(&mut commands, &[vb]).unwrap();
//!
//! // ... submit, wait for the GPU ...
//! manager.release_retired();
//! manager.free_memory(Scope::Scene);
//! ```

pub mod api;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod resources;

mod allocators;
mod sync;
mod transfer;
mod util;

// Re-export public API at crate root for convenience
pub use api::config::ManagerConfig;
pub use api::handle::{ResourceHandle, ResourceKind, Scope};
pub use api::manager::ResourceManager;
pub use api::scope::SceneScope;
pub use api::stats::{MemoryStats, PageStats};
pub use allocators::page::PageInfo;
pub use error::{ResourceError, Result};

// Device abstraction
pub use device::{
    CommandRecorder, CpuMapping, Device, DeviceError, DeviceLimits, PageKind, PlacedResource, PlacementDesc,
    ResourceState, TextureCopyLocation, Transition,
};
pub use device::{DummyCommandList, DummyDevice};

// Resource descriptors and records
pub use resources::buffer::{Buffer, BufferDesc, BufferKind, IndexFormat};
pub use resources::sampler::{AddressMode, CompareFunction, FilterMode, Sampler, SamplerDesc};
pub use resources::texture::{
    SubresourceData, SubresourceFootprint, Texture, TextureDesc, TextureDimension, TextureFormat, TextureLayout,
};
pub use resources::{Placement, Residency, ResourceFlags, StagingSlot, TransferState};

// Diagnostics
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticKind, DiagnosticSink};
pub use diagnostics::{set_strict_mode, StrictMode, StrictModeGuard};

// Size helpers
pub use util::size::{format_bytes, kb, mb};
