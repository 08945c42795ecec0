//! Device abstraction consumed by the manager.
//!
//! ## Backends
//! - `dummy`: RAM-backed heaps and a recording command list (always available)
//!
//! Real backends implement [`Device`] and [`CommandRecorder`] outside this crate.

// Always present for API stability: traits define the interface
pub mod traits;
pub use traits::{
    CommandRecorder, CpuMapping, Device, DeviceError, DeviceLimits, PageKind, PlacedResource,
    PlacementDesc, ResourceState, TextureCopyLocation, Transition,
};

// Dummy device for testing (always available)
pub mod dummy;
pub use dummy::{DummyCommandList, DummyDevice, DummyHeap, DummyMapping, DummyResource};
