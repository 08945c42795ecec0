//! Resource handles.
//!
//! Handles are plain indices into a scope's record arena. They never own the
//! resource; freeing a scope bumps its generation so older handles stop
//! resolving instead of aliasing newer records.

/// Flavor of a resource record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Linear buffer.
    Buffer,
    /// Texture.
    Texture,
    /// Sampler descriptor.
    Sampler,
}

/// Lifetime scope a resource is allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Lives until the manager is dropped or the scope is freed explicitly.
    LongLived,
    /// Lives until the current scene is unloaded.
    Scene,
}

impl Scope {
    /// Both scopes, long-lived first.
    pub const ALL: [Scope; 2] = [Scope::LongLived, Scope::Scene];
}

/// An opaque reference to a resource record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    kind: ResourceKind,
    index: u32,
    scope: Scope,
    generation: u32,
}

impl ResourceHandle {
    pub(crate) fn new(kind: ResourceKind, index: u32, scope: Scope, generation: u32) -> Self {
        Self {
            kind,
            index,
            scope,
            generation,
        }
    }

    /// Record flavor.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Index inside the scope's arena of this kind.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Scope the record lives in.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Scope generation at allocation time (for debugging).
    pub fn generation(&self) -> u32 {
        self.generation
    }
}
