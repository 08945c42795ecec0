//! Scene scope guard for RAII-style scene teardown.

use std::ops::{Deref, DerefMut};

use crate::api::handle::Scope;
use crate::api::manager::ResourceManager;
use crate::device::Device;

/// A guard that represents a loaded scene.
///
/// When dropped, every scene-scoped resource is freed and scene handles
/// become stale. The guard derefs to the manager, so allocation goes through it.
///
/// # Example
///
/// ```rust
/// use gpupages::{BufferDesc, DummyDevice, ManagerConfig, ResourceManager, Scope};
///
/// let mut manager = ResourceManager::new(DummyDevice::new(), ManagerConfig::minimal());
///
/// {
///     let mut scene = manager.scene_scope();
///     let vb = scene.allocate_buffer(Scope::Scene, &BufferDesc::vertex(64, 32), "level vb").unwrap();
///     assert!(scene.get_buffer(vb).is_ok());
/// } // scene memory released here
///
/// assert_eq!(manager.stats().buffers, 0);
/// ```
pub struct SceneScope<'a, D: Device> {
    manager: &'a mut ResourceManager<D>,
}

impl<'a, D: Device> SceneScope<'a, D> {
    pub(crate) fn new(manager: &'a mut ResourceManager<D>) -> Self {
        Self { manager }
    }
}

impl<'a, D: Device> Deref for SceneScope<'a, D> {
    type Target = ResourceManager<D>;

    fn deref(&self) -> &Self::Target {
        self.manager
    }
}

impl<'a, D: Device> DerefMut for SceneScope<'a, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.manager
    }
}

impl<'a, D: Device> Drop for SceneScope<'a, D> {
    fn drop(&mut self) {
        self.manager.free_memory(Scope::Scene);
    }
}
