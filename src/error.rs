//! Error types returned by the resource manager.

use thiserror::Error;

use crate::api::handle::ResourceHandle;
use crate::device::{DeviceError, PageKind};

/// Errors returned by [`ResourceManager`](crate::ResourceManager) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The device could not back a new page.
    #[error("out of {kind:?} memory: a page of {size} bytes could not be created")]
    OutOfDeviceMemory {
        /// Kind of the page that failed.
        kind: PageKind,
        /// Requested page size.
        size: u64,
    },

    /// Operation applied to the wrong kind of resource, or to a resource
    /// lacking the CPU access flag it needs.
    #[error("invalid resource kind for {handle:?}: {reason}")]
    InvalidResourceKind {
        /// The offending handle.
        handle: ResourceHandle,
        /// What was expected.
        reason: &'static str,
    },

    /// Update or read after the once-staging memory was released.
    #[error("staging memory of {handle:?} was released after its single transfer")]
    StaleOnceResource {
        /// The offending handle.
        handle: ResourceHandle,
    },

    /// Handle from a scope that has since been freed.
    #[error("handle {handle:?} outlived its scope")]
    StaleHandle {
        /// The offending handle.
        handle: ResourceHandle,
    },

    /// The descriptor cannot be allocated.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(&'static str),

    /// Update data larger than the resource.
    #[error("data of {actual} bytes does not fit a resource of {expected} bytes")]
    DataSizeMismatch {
        /// Bytes available.
        expected: u64,
        /// Bytes given.
        actual: u64,
    },

    /// Texture update with the wrong number of subresources.
    #[error("expected data for {expected} subresources, got {actual}")]
    SubresourceCountMismatch {
        /// Subresources of the texture.
        expected: usize,
        /// Subresources given.
        actual: usize,
    },

    /// Error from the device abstraction.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Result alias for manager operations.
pub type Result<T> = std::result::Result<T, ResourceError>;
