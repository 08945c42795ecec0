//! Dummy device implementation for testing.
//!
//! Heaps are plain `Vec<u8>` blocks in RAM and don't require GPU hardware.
//! [`DummyCommandList`] records what the manager asks for and can execute the
//! recorded copies against heap memory, acting as an identity device copy.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::traits::*;
use crate::resources::texture::{compute_texture_layout, SubresourceFootprint, TextureDesc, TextureLayout};
use crate::sync::mutex::Mutex;

type Memory = Arc<Mutex<Vec<u8>>>;

/// A dummy heap that stores its bytes in RAM.
#[derive(Debug)]
pub struct DummyHeap {
    id: u32,
    kind: PageKind,
    memory: Memory,
    /// Liveness token; only the heap itself holds it.
    _alive: Arc<()>,
}

impl DummyHeap {
    /// Device-unique heap id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Page kind the heap was created for.
    pub fn kind(&self) -> PageKind {
        self.kind
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.memory.lock().len() as u64
    }
}

/// A dummy resource: a window into a heap.
#[derive(Debug, Clone)]
pub struct DummyResource {
    id: u32,
    heap_id: u32,
    heap_kind: PageKind,
    memory: Memory,
    offset: u64,
    size: u64,
    layout: Option<Arc<TextureLayout>>,
}

impl DummyResource {
    /// Device-unique resource id.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Id of the heap the resource lives in.
    pub fn heap_id(&self) -> u32 {
        self.heap_id
    }

    /// Offset inside the heap.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the placed range.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Snapshot of the resource's bytes (what the GPU would see).
    pub fn contents(&self) -> Vec<u8> {
        let memory = self.memory.lock();
        let start = self.offset as usize;
        memory[start..start + self.size as usize].to_vec()
    }
}

/// CPU mapping of a dummy staging resource.
#[derive(Debug)]
pub struct DummyMapping {
    memory: Memory,
    base: u64,
    size: u64,
}

impl DummyMapping {
    fn range(&self, offset: u64, len: u64) -> Result<std::ops::Range<usize>, DeviceError> {
        if offset.checked_add(len).map_or(true, |end| end > self.size) {
            return Err(DeviceError::OutOfBounds {
                offset,
                len,
                size: self.size,
            });
        }
        let start = (self.base + offset) as usize;
        Ok(start..start + len as usize)
    }
}

impl CpuMapping for DummyMapping {
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let range = self.range(offset, data.len() as u64)?;
        self.memory.lock()[range].copy_from_slice(data);
        Ok(())
    }

    fn fill(&mut self, offset: u64, len: u64, value: u8) -> Result<(), DeviceError> {
        let range = self.range(offset, len)?;
        self.memory.lock()[range].fill(value);
        Ok(())
    }

    fn read(&self, offset: u64, out: &mut [u8]) -> Result<(), DeviceError> {
        let range = self.range(offset, out.len() as u64)?;
        out.copy_from_slice(&self.memory.lock()[range]);
        Ok(())
    }
}

/// Dummy device for testing.
#[derive(Debug)]
pub struct DummyDevice {
    limits: DeviceLimits,
    /// Total bytes of live heaps allowed (`None` = unlimited)
    memory_budget: Option<u64>,
    heaps: Vec<(Weak<()>, u64)>,
    heap_names: HashMap<u32, String>,
    next_heap_id: u32,
    next_resource_id: u32,
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyDevice {
    /// Create a dummy device with default limits and no memory budget.
    pub fn new() -> Self {
        Self::with_limits(DeviceLimits::default())
    }

    /// Create a dummy device with custom limits.
    pub fn with_limits(limits: DeviceLimits) -> Self {
        Self {
            limits,
            memory_budget: None,
            heaps: Vec::new(),
            heap_names: HashMap::new(),
            next_heap_id: 0,
            next_resource_id: 0,
        }
    }

    /// Builder pattern: fail heap creation past `bytes` of live heaps.
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Number of heaps that have not been dropped.
    pub fn live_heaps(&self) -> usize {
        self.heaps.iter().filter(|(alive, _)| alive.strong_count() > 0).count()
    }

    /// Bytes held by heaps that have not been dropped.
    pub fn live_bytes(&self) -> u64 {
        self.heaps
            .iter()
            .filter(|(alive, _)| alive.strong_count() > 0)
            .map(|(_, size)| size)
            .sum()
    }

    /// Number of heaps ever created.
    pub fn heaps_created(&self) -> usize {
        self.heaps.len()
    }

    /// Last debug name attached to a heap.
    pub fn heap_name(&self, heap_id: u32) -> Option<&str> {
        self.heap_names.get(&heap_id).map(String::as_str)
    }
}

impl Device for DummyDevice {
    type Heap = DummyHeap;
    type Resource = DummyResource;
    type Mapping = DummyMapping;

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn create_heap(&mut self, kind: PageKind, size: u64) -> Result<DummyHeap, DeviceError> {
        if let Some(budget) = self.memory_budget {
            if self.live_bytes().checked_add(size).map_or(true, |total| total > budget) {
                return Err(DeviceError::OutOfMemory { requested: size });
            }
        }
        let len = usize::try_from(size)
            .ok()
            .filter(|&len| len <= isize::MAX as usize)
            .ok_or(DeviceError::OutOfMemory { requested: size })?;

        let alive = Arc::new(());
        self.heaps.push((Arc::downgrade(&alive), size));
        let id = self.next_heap_id;
        self.next_heap_id += 1;

        Ok(DummyHeap {
            id,
            kind,
            memory: Arc::new(Mutex::new(vec![0u8; len])),
            _alive: alive,
        })
    }

    fn create_placed_resource(
        &mut self,
        heap: &DummyHeap,
        desc: &PlacementDesc<'_>,
    ) -> Result<DummyResource, DeviceError> {
        let heap_size = heap.size();
        if desc.offset.checked_add(desc.size).map_or(true, |end| end > heap_size) {
            return Err(DeviceError::OutOfBounds {
                offset: desc.offset,
                len: desc.size,
                size: heap_size,
            });
        }

        let layout = match desc.resource {
            PlacedResource::Buffer => None,
            PlacedResource::Texture(texture) => Some(Arc::new(self.texture_layout(texture))),
        };

        let id = self.next_resource_id;
        self.next_resource_id += 1;

        Ok(DummyResource {
            id,
            heap_id: heap.id,
            heap_kind: heap.kind,
            memory: Arc::clone(&heap.memory),
            offset: desc.offset,
            size: desc.size,
            layout,
        })
    }

    fn map(&mut self, resource: &DummyResource) -> Result<DummyMapping, DeviceError> {
        if !resource.heap_kind.is_cpu_visible() {
            return Err(DeviceError::NotMappable(resource.heap_kind));
        }
        Ok(DummyMapping {
            memory: Arc::clone(&resource.memory),
            base: resource.offset,
            size: resource.size,
        })
    }

    fn texture_layout(&self, desc: &TextureDesc) -> TextureLayout {
        compute_texture_layout(
            desc,
            self.limits.texture_pitch_alignment,
            self.limits.texture_placement_alignment,
        )
    }

    fn set_heap_name(&mut self, heap: &DummyHeap, name: &str) {
        self.heap_names.insert(heap.id, name.to_string());
    }
}

// =============================================================================
// Command recording
// =============================================================================

/// A recorded state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedTransition {
    /// Id of the transitioned resource.
    pub resource: u32,
    /// State before.
    pub before: ResourceState,
    /// State after.
    pub after: ResourceState,
}

/// One side of a recorded texture copy.
#[derive(Debug, Clone)]
pub enum RecordedLocation {
    /// Texture subresource.
    Subresource {
        /// The texture.
        resource: DummyResource,
        /// Subresource index.
        index: u32,
    },
    /// Buffer footprint.
    Footprint {
        /// The buffer.
        resource: DummyResource,
        /// Footprint relative to the buffer start.
        footprint: SubresourceFootprint,
    },
}

impl RecordedLocation {
    fn from_location(location: TextureCopyLocation<'_, DummyResource>) -> Self {
        match location {
            TextureCopyLocation::Subresource { resource, index } => RecordedLocation::Subresource {
                resource: resource.clone(),
                index,
            },
            TextureCopyLocation::Footprint { resource, footprint } => RecordedLocation::Footprint {
                resource: resource.clone(),
                footprint,
            },
        }
    }

    /// Resource and absolute-in-heap footprint of this location.
    fn resolve(&self) -> Result<(&DummyResource, SubresourceFootprint), DeviceError> {
        match self {
            RecordedLocation::Footprint { resource, footprint } => {
                Ok((resource, footprint.shifted(resource.offset)))
            }
            RecordedLocation::Subresource { resource, index } => {
                let footprint = resource
                    .layout
                    .as_ref()
                    .and_then(|layout| layout.subresources.get(*index as usize))
                    .ok_or_else(|| {
                        DeviceError::Backend(format!(
                            "resource {} has no subresource {}",
                            resource.id, index
                        ))
                    })?;
                Ok((resource, footprint.shifted(resource.offset)))
            }
        }
    }
}

/// A recorded command.
#[derive(Debug, Clone)]
pub enum RecordedCommand {
    /// One barrier batch.
    Barriers(Vec<RecordedTransition>),
    /// Buffer-to-buffer copy.
    CopyBuffer {
        /// Destination buffer.
        dst: DummyResource,
        /// Offset in the destination.
        dst_offset: u64,
        /// Source buffer.
        src: DummyResource,
        /// Offset in the source.
        src_offset: u64,
        /// Bytes copied.
        size: u64,
    },
    /// Texture subresource copy.
    CopyTexture {
        /// Destination.
        dst: RecordedLocation,
        /// Source.
        src: RecordedLocation,
    },
}

/// Command list that records commands for later inspection or execution.
#[derive(Debug, Default)]
pub struct DummyCommandList {
    commands: Vec<RecordedCommand>,
}

impl DummyCommandList {
    /// Create an empty command list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in order.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Barrier batches, in order.
    pub fn barrier_batches(&self) -> Vec<&[RecordedTransition]> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::Barriers(batch) => Some(batch.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Number of copy commands recorded.
    pub fn copy_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|cmd| !matches!(cmd, RecordedCommand::Barriers(_)))
            .count()
    }

    /// Drop all recorded commands.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    /// Perform every recorded copy against heap memory, in order.
    pub fn execute(&self) -> Result<(), DeviceError> {
        for cmd in &self.commands {
            match cmd {
                RecordedCommand::Barriers(_) => {}
                RecordedCommand::CopyBuffer {
                    dst,
                    dst_offset,
                    src,
                    src_offset,
                    size,
                } => {
                    if src_offset + size > src.size || dst_offset + size > dst.size {
                        return Err(DeviceError::OutOfBounds {
                            offset: *src_offset,
                            len: *size,
                            size: src.size.min(dst.size),
                        });
                    }
                    copy_bytes(
                        &src.memory,
                        src.offset + src_offset,
                        &dst.memory,
                        dst.offset + dst_offset,
                        *size,
                    );
                }
                RecordedCommand::CopyTexture { dst, src } => {
                    let (src_res, src_fp) = src.resolve()?;
                    let (dst_res, dst_fp) = dst.resolve()?;
                    let rows = u64::from(src_fp.row_count) * u64::from(src_fp.depth);
                    for row in 0..rows {
                        copy_bytes(
                            &src_res.memory,
                            src_fp.offset + row * src_fp.row_pitch,
                            &dst_res.memory,
                            dst_fp.offset + row * dst_fp.row_pitch,
                            src_fp.row_size.min(dst_fp.row_size),
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

fn copy_bytes(src: &Memory, src_offset: u64, dst: &Memory, dst_offset: u64, len: u64) {
    let (src_offset, dst_offset, len) = (src_offset as usize, dst_offset as usize, len as usize);
    if Arc::ptr_eq(src, dst) {
        src.lock().copy_within(src_offset..src_offset + len, dst_offset);
    } else {
        let src = src.lock();
        dst.lock()[dst_offset..dst_offset + len].copy_from_slice(&src[src_offset..src_offset + len]);
    }
}

impl CommandRecorder<DummyResource> for DummyCommandList {
    fn resource_barriers(&mut self, transitions: &[Transition<'_, DummyResource>]) {
        let batch = transitions
            .iter()
            .map(|t| RecordedTransition {
                resource: t.resource.id,
                before: t.before,
                after: t.after,
            })
            .collect();
        self.commands.push(RecordedCommand::Barriers(batch));
    }

    fn copy_buffer_region(
        &mut self,
        dst: &DummyResource,
        dst_offset: u64,
        src: &DummyResource,
        src_offset: u64,
        size: u64,
    ) {
        self.commands.push(RecordedCommand::CopyBuffer {
            dst: dst.clone(),
            dst_offset,
            src: src.clone(),
            src_offset,
            size,
        });
    }

    fn copy_texture_region(
        &mut self,
        dst: TextureCopyLocation<'_, DummyResource>,
        src: TextureCopyLocation<'_, DummyResource>,
    ) {
        self.commands.push(RecordedCommand::CopyTexture {
            dst: RecordedLocation::from_location(dst),
            src: RecordedLocation::from_location(src),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_lifetime_tracking() {
        let mut device = DummyDevice::new();
        let heap = device.create_heap(PageKind::Device, 1024).unwrap();
        assert_eq!(device.live_heaps(), 1);
        assert_eq!(device.live_bytes(), 1024);

        drop(heap);
        assert_eq!(device.live_heaps(), 0);
        assert_eq!(device.heaps_created(), 1);
    }

    #[test]
    fn test_memory_budget() {
        let mut device = DummyDevice::new().with_memory_budget(2048);
        let _a = device.create_heap(PageKind::Device, 1024).unwrap();
        let _b = device.create_heap(PageKind::Upload, 1024).unwrap();

        let err = device.create_heap(PageKind::Device, 1).unwrap_err();
        assert_eq!(err, DeviceError::OutOfMemory { requested: 1 });
    }

    #[test]
    fn test_device_memory_cannot_map() {
        let mut device = DummyDevice::new();
        let heap = device.create_heap(PageKind::Device, 256).unwrap();
        let desc = PlacementDesc {
            offset: 0,
            size: 256,
            resource: PlacedResource::Buffer,
            initial_state: ResourceState::Common,
        };
        let resource = device.create_placed_resource(&heap, &desc).unwrap();

        assert_eq!(
            device.map(&resource).unwrap_err(),
            DeviceError::NotMappable(PageKind::Device)
        );
    }

    #[test]
    fn test_placement_out_of_bounds() {
        let mut device = DummyDevice::new();
        let heap = device.create_heap(PageKind::Upload, 256).unwrap();
        let desc = PlacementDesc {
            offset: 128,
            size: 256,
            resource: PlacedResource::Buffer,
            initial_state: ResourceState::GenericRead,
        };
        assert!(device.create_placed_resource(&heap, &desc).is_err());
    }

    #[test]
    fn test_mapping_and_buffer_copy() {
        let mut device = DummyDevice::new();
        let upload = device.create_heap(PageKind::Upload, 64).unwrap();
        let local = device.create_heap(PageKind::Device, 64).unwrap();
        let staging = device
            .create_placed_resource(
                &upload,
                &PlacementDesc {
                    offset: 0,
                    size: 64,
                    resource: PlacedResource::Buffer,
                    initial_state: ResourceState::GenericRead,
                },
            )
            .unwrap();
        let target = device
            .create_placed_resource(
                &local,
                &PlacementDesc {
                    offset: 16,
                    size: 16,
                    resource: PlacedResource::Buffer,
                    initial_state: ResourceState::Common,
                },
            )
            .unwrap();

        let mut mapping = device.map(&staging).unwrap();
        mapping.write(8, &[1, 2, 3, 4]).unwrap();
        assert!(mapping.write(62, &[0; 4]).is_err());

        let mut list = DummyCommandList::new();
        list.copy_buffer_region(&target, 0, &staging, 8, 4);
        list.execute().unwrap();

        assert_eq!(&target.contents()[..4], &[1, 2, 3, 4]);
        assert_eq!(list.copy_count(), 1);
    }
}
