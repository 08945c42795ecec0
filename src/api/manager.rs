//! The resource manager - allocation, staging and transfer entry points.

use std::collections::HashSet;
use std::sync::Arc;

use crate::allocators::page::{PageBacking, PageInfo};
use crate::allocators::pool::{PlaceRequest, Pool, ScopePools, StagingStatus};
use crate::api::config::ManagerConfig;
use crate::api::handle::{ResourceHandle, ResourceKind, Scope};
use crate::api::scope::SceneScope;
use crate::api::stats::MemoryStats;
use crate::device::{CommandRecorder, Device, DeviceError, DeviceLimits, PageKind, PlacedResource, ResourceState};
use crate::diagnostics::{
    emit_with_context, Diagnostic, DiagnosticSink, GP001, GP002, GP104, GP201, GP202, GP203, GP301, GP302, GP901,
};
use crate::error::{ResourceError, Result};
use crate::resources::buffer::{Buffer, BufferDesc};
use crate::resources::sampler::{Sampler, SamplerDesc};
use crate::resources::texture::{clamp_to_limits, SubresourceData, Texture, TextureDesc, TextureDimension};
use crate::resources::{Residency, ResourceFlags, StagedRecord, StagingResources, StagingSlot, TransferState};
use crate::transfer::{self, TransferItem};
use crate::util::layout::align_up;

/// Forwards diagnostics to the log backend and an optional sink.
#[derive(Default)]
struct Reporter {
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl Reporter {
    fn report(&self, diag: &Diagnostic, context: &str) {
        if let Some(sink) = &self.sink {
            sink.emit(diag, context);
        }
        emit_with_context(diag, context);
    }

    /// Report `diag` and hand back `err` for returning.
    fn fail(&self, diag: &Diagnostic, context: String, err: ResourceError) -> ResourceError {
        self.report(diag, &context);
        err
    }

    fn internal(&self, context: String) -> ResourceError {
        let err = ResourceError::Device(DeviceError::Backend(context.clone()));
        self.fail(&GP901, context, err)
    }
}

/// Placement parameters shared by buffers and textures.
struct RecordRequest<'a> {
    flags: ResourceFlags,
    device_size: u64,
    staging_size: u64,
    default_state: ResourceState,
    resource: PlacedResource<'a>,
    name: &'a str,
}

struct Allocation<R> {
    residency: Residency,
    staging: StagingResources<R>,
    resource: R,
}

fn place_record<D: Device, T>(
    pool: &mut Pool<D, T>,
    device: &mut D,
    reporter: &Reporter,
    config: &ManagerConfig,
    req: &RecordRequest<'_>,
) -> Result<Allocation<D::Resource>> {
    let place = |pool: &mut Pool<D, T>, device: &mut D, kind: PageKind, size: u64, once: bool| {
        let page_size = config.page_size(kind);
        if size > page_size {
            reporter.report(
                &GP002,
                &format!("'{}': {} bytes in a {:?} pool with {} byte pages", req.name, size, kind, page_size),
            );
        }
        let resource = match kind {
            PageKind::Device => req.resource,
            PageKind::Upload | PageKind::Readback => PlacedResource::Buffer,
        };
        pool.place(
            device,
            &PlaceRequest {
                kind,
                size,
                page_size,
                default_state: req.default_state,
                once,
                resource,
                name: req.name,
            },
        )
        .map_err(|err| {
            if let ResourceError::OutOfDeviceMemory { size, .. } = &err {
                reporter.report(&GP001, &format!("'{}': {:?} page of {} bytes", req.name, kind, size));
            }
            err
        })
    };

    let (device_placement, resource) = place(pool, device, PageKind::Device, req.device_size, false)?;

    let mut staging = StagingResources {
        upload: None,
        readback: None,
    };

    let upload = if req.flags.needs_upload() {
        let once = req.flags.contains(ResourceFlags::CPU_WRITE_ONCE);
        let (placement, res) = place(pool, device, PageKind::Upload, req.staging_size, once)?;
        staging.upload = Some(res);
        Some(StagingSlot {
            placement,
            once,
            consumed: false,
        })
    } else {
        None
    };

    let readback = if req.flags.needs_readback() {
        let once = req.flags.contains(ResourceFlags::CPU_READ_ONCE);
        match place(pool, device, PageKind::Readback, req.staging_size, once) {
            Ok((placement, res)) => {
                staging.readback = Some(res);
                Some(StagingSlot {
                    placement,
                    once,
                    consumed: false,
                })
            }
            Err(err) => {
                // Give back the upload page reference taken above.
                if let Some(slot) = upload.filter(|slot| slot.once) {
                    drop(staging.upload.take());
                    drop(pool.release_page_ref(PageKind::Upload, slot.placement.page));
                }
                return Err(err);
            }
        }
    } else {
        None
    };

    Ok(Allocation {
        residency: Residency {
            flags: req.flags,
            device: device_placement,
            upload,
            readback,
        },
        staging,
        resource,
    })
}

/// Check that a record has usable staging memory of `kind`.
fn live_staging<D: Device, T: StagedRecord<D::Resource>>(
    reporter: &Reporter,
    pool: &Pool<D, T>,
    handle: ResourceHandle,
    index: usize,
    kind: PageKind,
) -> Result<StagingSlot> {
    let name = pool.records.get(index).map_or("", |record| record.name());
    match pool.staging_status(index, kind) {
        StagingStatus::Live(slot) => Ok(slot),
        StagingStatus::Missing => {
            let reason = match kind {
                PageKind::Readback => "resource was not allocated with CPU_READ or CPU_READ_ONCE",
                _ => "resource was not allocated with CPU_WRITE or CPU_WRITE_ONCE",
            };
            Err(reporter.fail(
                &GP201,
                format!("'{}' has no {:?} staging memory", name, kind),
                ResourceError::InvalidResourceKind { handle, reason },
            ))
        }
        StagingStatus::Released => Err(reporter.fail(
            &GP202,
            format!("'{}' {:?} staging was released after its single transfer", name, kind),
            ResourceError::StaleOnceResource { handle },
        )),
    }
}

/// Record a completed transfer: consume once-staging and move the lifecycle on.
///
/// Returns whatever staging objects were released.
fn finish_transfer<D: Device, T: StagedRecord<D::Resource>>(
    pool: &mut Pool<D, T>,
    index: usize,
    kind: PageKind,
    state: TransferState,
) -> (Option<D::Resource>, Option<PageBacking<D>>) {
    let released = pool.consume_once(index, kind);
    if let Some(record) = pool.records.get_mut(index) {
        let state = if record.residency().staging_released() {
            TransferState::ReleasedStaging
        } else {
            state
        };
        record.set_transfer_state(state);
    }
    released
}

fn expected_kind(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Buffer => "expected a buffer handle",
        ResourceKind::Texture => "expected a texture handle",
        ResourceKind::Sampler => "expected a sampler handle",
    }
}

/// GPU resource memory manager.
///
/// Sub-allocates buffers and textures from coarse device heaps ("pages"),
/// keeps sampler descriptors, and stages CPU data in upload/readback pages.
/// Every record lives in one of two scopes; [`free_memory`](Self::free_memory)
/// releases a whole scope at once.
///
/// # Example
///
/// ```rust
/// use gpupages::{
///     BufferDesc, DummyCommandList, DummyDevice, ManagerConfig, ResourceFlags, ResourceManager, Scope,
/// };
///
/// let mut manager = ResourceManager::new(DummyDevice::new(), ManagerConfig::minimal());
/// let desc = BufferDesc::raw(16).with_flags(ResourceFlags::CPU_WRITE | ResourceFlags::CPU_READ);
/// let buffer = manager.allocate_buffer(Scope::LongLived, &desc, "params").unwrap();
///
/// manager.update_buffer(buffer, Some(&[7; 16])).unwrap();
///
/// let mut list = DummyCommandList::new();
/// manager.upload_resources(&mut list, &[buffer]).unwrap();
/// manager.readback_resources(&mut list, &[buffer]).unwrap();
/// list.execute().unwrap();
///
/// assert_eq!(manager.read_buffer(buffer).unwrap(), vec![7; 16]);
/// ```
pub struct ResourceManager<D: Device> {
    config: ManagerConfig,
    limits: DeviceLimits,
    reporter: Reporter,
    long_lived: ScopePools<D>,
    scene: ScopePools<D>,
    device: D,
}

impl<D: Device> ResourceManager<D> {
    /// Create a manager sub-allocating from `device`.
    pub fn new(device: D, config: ManagerConfig) -> Self {
        let limits = device.limits();
        log::debug!(
            "resource manager created: pages {} / {} / {} bytes (device / upload / readback)",
            config.device_page_size,
            config.upload_page_size,
            config.readback_page_size
        );
        Self {
            config,
            limits,
            reporter: Reporter::default(),
            long_lived: ScopePools::new(0),
            scene: ScopePools::new(0),
            device,
        }
    }

    /// Builder pattern: also report diagnostics to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.reporter.sink = Some(sink);
        self
    }

    /// The configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Device limits captured at creation.
    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// The device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The device, mutably.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Round `size` up for placement in `kind` pages.
    ///
    /// A size that cannot be aligned is treated like a heap the device cannot back.
    fn aligned_size(&self, size: u64, align: u64, kind: PageKind, name: &str) -> Result<u64> {
        align_up(size, align).ok_or_else(|| {
            self.reporter.fail(
                &GP001,
                format!("'{}': {} bytes do not fit a {:?} page once aligned", name, size, kind),
                ResourceError::OutOfDeviceMemory { kind, size },
            )
        })
    }

    /// Aligned staging size, or 0 when the record has no staging memory.
    fn staging_size(&self, size: u64, flags: ResourceFlags, name: &str) -> Result<u64> {
        let kind = if flags.needs_upload() {
            PageKind::Upload
        } else if flags.needs_readback() {
            PageKind::Readback
        } else {
            return Ok(0);
        };
        self.aligned_size(size, self.limits.staging_alignment(), kind, name)
    }

    fn pools(&self, scope: Scope) -> &ScopePools<D> {
        match scope {
            Scope::LongLived => &self.long_lived,
            Scope::Scene => &self.scene,
        }
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate a buffer.
    ///
    /// The logical size (`count * stride`) must be non-zero. CPU write flags add
    /// an upload allocation, CPU read flags a readback allocation.
    pub fn allocate_buffer(&mut self, scope: Scope, desc: &BufferDesc, name: &str) -> Result<ResourceHandle> {
        desc.flags.validate(false).map_err(ResourceError::InvalidDescriptor)?;
        let size = match desc.logical_size() {
            Some(0) => return Err(ResourceError::InvalidDescriptor("buffer size must be greater than zero")),
            Some(size) => size,
            None => {
                return Err(self.reporter.fail(
                    &GP001,
                    format!("'{}': {} x {} bytes overflow a buffer size", name, desc.count, desc.stride),
                    ResourceError::OutOfDeviceMemory {
                        kind: PageKind::Device,
                        size: u64::MAX,
                    },
                ))
            }
        };
        let default_state = desc.resolved_state();

        let req = RecordRequest {
            flags: desc.flags,
            device_size: self.aligned_size(size, self.limits.placement_alignment, PageKind::Device, name)?,
            staging_size: self.staging_size(size, desc.flags, name)?,
            default_state,
            resource: PlacedResource::Buffer,
            name,
        };
        let pools = match scope {
            Scope::LongLived => &mut self.long_lived,
            Scope::Scene => &mut self.scene,
        };
        let allocation = place_record(&mut pools.buffers, &mut self.device, &self.reporter, &self.config, &req)?;

        let index = pools.buffers.records.len() as u32;
        pools.buffers.records.push(Buffer {
            desc: *desc,
            name: name.to_string(),
            size,
            default_state,
            residency: allocation.residency,
            staging: allocation.staging,
            resource: allocation.resource,
            transfer_state: TransferState::Allocated,
        });

        Ok(ResourceHandle::new(ResourceKind::Buffer, index, scope, pools.generation))
    }

    /// Allocate a texture.
    ///
    /// Extents, array size and mip count beyond the device limits are clamped
    /// with a warning; `mip_levels == 0` requests the full chain.
    pub fn allocate_texture(&mut self, scope: Scope, desc: &TextureDesc, name: &str) -> Result<ResourceHandle> {
        desc.flags.validate(true).map_err(ResourceError::InvalidDescriptor)?;
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 || desc.array_layers == 0 {
            return Err(ResourceError::InvalidDescriptor(
                "texture extents and array size must be greater than zero",
            ));
        }
        if desc.format.is_depth() && desc.dimension == TextureDimension::D3 {
            return Err(ResourceError::InvalidDescriptor("depth formats cannot be used for 3D textures"));
        }

        let (clamped, clamps) = clamp_to_limits(desc, &self.limits);
        for clamp in &clamps {
            self.reporter
                .report(clamp.diagnostic, &format!("texture '{}': {}", name, clamp.context));
        }

        let layout = self.device.texture_layout(&clamped);
        let default_state = clamped.resolved_state();
        let device_size =
            self.aligned_size(layout.total_bytes, self.limits.placement_alignment, PageKind::Device, name)?;
        let staging_size = self.staging_size(layout.total_bytes, clamped.flags, name)?;

        let req = RecordRequest {
            flags: clamped.flags,
            device_size,
            staging_size,
            default_state,
            resource: PlacedResource::Texture(&clamped),
            name,
        };
        let pools = match scope {
            Scope::LongLived => &mut self.long_lived,
            Scope::Scene => &mut self.scene,
        };
        let allocation = place_record(&mut pools.textures, &mut self.device, &self.reporter, &self.config, &req)?;

        let index = pools.textures.records.len() as u32;
        pools.textures.records.push(Texture {
            desc: clamped,
            name: name.to_string(),
            layout,
            default_state,
            residency: allocation.residency,
            staging: allocation.staging,
            resource: allocation.resource,
            transfer_state: TransferState::Allocated,
        });

        Ok(ResourceHandle::new(ResourceKind::Texture, index, scope, pools.generation))
    }

    /// Allocate a sampler descriptor.
    pub fn allocate_sampler(&mut self, scope: Scope, desc: &SamplerDesc, name: &str) -> Result<ResourceHandle> {
        if desc.min_lod > desc.max_lod {
            return Err(ResourceError::InvalidDescriptor("sampler min_lod is greater than max_lod"));
        }

        let mut desc = *desc;
        let max = self.limits.max_anisotropy.max(1);
        if desc.max_anisotropy == 0 || desc.max_anisotropy > max {
            let clamped = desc.max_anisotropy.clamp(1, max);
            self.reporter.report(
                &GP104,
                &format!("sampler '{}': anisotropy {} clamped to {}", name, desc.max_anisotropy, clamped),
            );
            desc.max_anisotropy = clamped;
        }

        let pools = match scope {
            Scope::LongLived => &mut self.long_lived,
            Scope::Scene => &mut self.scene,
        };
        let index = pools.samplers.len() as u32;
        pools.samplers.push(Sampler {
            desc,
            name: name.to_string(),
            descriptor_index: index,
        });

        Ok(ResourceHandle::new(ResourceKind::Sampler, index, scope, pools.generation))
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Resolve a handle to a record index, reporting misuse.
    fn resolve(&self, handle: ResourceHandle, kind: ResourceKind) -> Result<usize> {
        if handle.kind() != kind {
            return Err(self.reporter.fail(
                &GP201,
                format!("{:?} handle #{} used where a {:?} was expected", handle.kind(), handle.index(), kind),
                ResourceError::InvalidResourceKind {
                    handle,
                    reason: expected_kind(kind),
                },
            ));
        }

        let pools = self.pools(handle.scope());
        let len = match kind {
            ResourceKind::Buffer => pools.buffers.records.len(),
            ResourceKind::Texture => pools.textures.records.len(),
            ResourceKind::Sampler => pools.samplers.len(),
        };
        if handle.generation() != pools.generation || handle.index() as usize >= len {
            return Err(self.reporter.fail(
                &GP203,
                format!(
                    "{:?} handle #{} from generation {}, {:?} scope is at generation {}",
                    kind,
                    handle.index(),
                    handle.generation(),
                    handle.scope(),
                    pools.generation
                ),
                ResourceError::StaleHandle { handle },
            ));
        }
        Ok(handle.index() as usize)
    }

    /// Look up a buffer record.
    pub fn get_buffer(&self, handle: ResourceHandle) -> Result<&Buffer<D::Resource>> {
        let index = self.resolve(handle, ResourceKind::Buffer)?;
        Ok(&self.pools(handle.scope()).buffers.records[index])
    }

    /// Look up a texture record.
    pub fn get_texture(&self, handle: ResourceHandle) -> Result<&Texture<D::Resource>> {
        let index = self.resolve(handle, ResourceKind::Texture)?;
        Ok(&self.pools(handle.scope()).textures.records[index])
    }

    /// Look up a sampler record.
    pub fn get_sampler(&self, handle: ResourceHandle) -> Result<&Sampler> {
        let index = self.resolve(handle, ResourceKind::Sampler)?;
        Ok(&self.pools(handle.scope()).samplers[index])
    }

    // =========================================================================
    // CPU staging
    // =========================================================================

    /// Write buffer data into its upload allocation.
    ///
    /// `None` zero-fills. Shorter data is written as a prefix and the rest is
    /// zeroed.
    pub fn update_buffer(&mut self, handle: ResourceHandle, data: Option<&[u8]>) -> Result<()> {
        let index = self.resolve(handle, ResourceKind::Buffer)?;
        let pools = match handle.scope() {
            Scope::LongLived => &mut self.long_lived,
            Scope::Scene => &mut self.scene,
        };
        let pool = &mut pools.buffers;
        live_staging(&self.reporter, pool, handle, index, PageKind::Upload)?;

        let (record, mapping, slot) = match pool.record_and_mapping(index, PageKind::Upload) {
            Some(parts) => parts,
            None => return Err(self.reporter.internal(format!("upload page of buffer #{} is not mapped", index))),
        };
        transfer::stage_buffer(mapping, slot.placement.offset, record.size, data)?;
        record.transfer_state = TransferState::Staged;
        Ok(())
    }

    /// Write texture data into its upload allocation.
    ///
    /// Takes one entry per subresource, in subresource-index order
    /// (`mip + slice * mips + plane * mips * slices`). Rows are copied one at a
    /// time to honor the device row pitch. `None` zero-fills. Partial updates
    /// are not supported.
    pub fn update_texture(&mut self, handle: ResourceHandle, data: Option<&[SubresourceData<'_>]>) -> Result<()> {
        let index = self.resolve(handle, ResourceKind::Texture)?;
        let pools = match handle.scope() {
            Scope::LongLived => &mut self.long_lived,
            Scope::Scene => &mut self.scene,
        };
        let pool = &mut pools.textures;
        live_staging(&self.reporter, pool, handle, index, PageKind::Upload)?;

        let (record, mapping, slot) = match pool.record_and_mapping(index, PageKind::Upload) {
            Some(parts) => parts,
            None => return Err(self.reporter.internal(format!("upload page of texture #{} is not mapped", index))),
        };
        transfer::stage_texture(mapping, slot.placement.offset, &record.layout, data)?;
        record.transfer_state = TransferState::Staged;
        Ok(())
    }

    /// Read buffer data from its readback allocation.
    ///
    /// Call after the GPU finished the copies recorded by
    /// [`readback_resources`](Self::readback_resources). Read-once staging is
    /// released afterwards.
    pub fn read_buffer(&mut self, handle: ResourceHandle) -> Result<Vec<u8>> {
        let index = self.resolve(handle, ResourceKind::Buffer)?;
        let pools = match handle.scope() {
            Scope::LongLived => &mut self.long_lived,
            Scope::Scene => &mut self.scene,
        };
        let pool = &mut pools.buffers;
        live_staging(&self.reporter, pool, handle, index, PageKind::Readback)?;

        let (record, mapping, slot) = match pool.record_and_mapping(index, PageKind::Readback) {
            Some(parts) => parts,
            None => return Err(self.reporter.internal(format!("readback page of buffer #{} is not mapped", index))),
        };
        if record.transfer_state != TransferState::ReadbackPending {
            self.reporter.report(&GP302, &format!("buffer '{}'", record.name));
        }
        let data = transfer::read_staged_buffer(mapping, slot.placement.offset, record.size)?;

        let (resource, backing) = finish_transfer(pool, index, PageKind::Readback, TransferState::Read);
        // The copy has completed, so nothing on the GPU references these anymore.
        drop(resource);
        if backing.is_some() {
            log::debug!("readback once-page #{} released", slot.placement.page);
        }
        Ok(data)
    }

    /// Read every subresource of a texture, tightly packed.
    ///
    /// Same contract as [`read_buffer`](Self::read_buffer).
    pub fn read_texture(&mut self, handle: ResourceHandle) -> Result<Vec<Vec<u8>>> {
        let index = self.resolve(handle, ResourceKind::Texture)?;
        let pools = match handle.scope() {
            Scope::LongLived => &mut self.long_lived,
            Scope::Scene => &mut self.scene,
        };
        let pool = &mut pools.textures;
        live_staging(&self.reporter, pool, handle, index, PageKind::Readback)?;

        let (record, mapping, slot) = match pool.record_and_mapping(index, PageKind::Readback) {
            Some(parts) => parts,
            None => return Err(self.reporter.internal(format!("readback page of texture #{} is not mapped", index))),
        };
        if record.transfer_state != TransferState::ReadbackPending {
            self.reporter.report(&GP302, &format!("texture '{}'", record.name));
        }
        let data = transfer::read_staged_texture(mapping, slot.placement.offset, &record.layout)?;

        let (resource, backing) = finish_transfer(pool, index, PageKind::Readback, TransferState::Read);
        drop(resource);
        if backing.is_some() {
            log::debug!("readback once-page #{} released", slot.placement.page);
        }
        Ok(data)
    }

    // =========================================================================
    // Device transfers
    // =========================================================================

    /// Validate a transfer target: a live buffer or texture with staging of `kind`.
    fn transfer_target(&self, handle: ResourceHandle, kind: PageKind) -> Result<usize> {
        let pools = self.pools(handle.scope());
        match handle.kind() {
            ResourceKind::Buffer => {
                let index = self.resolve(handle, ResourceKind::Buffer)?;
                live_staging(&self.reporter, &pools.buffers, handle, index, kind)?;
                Ok(index)
            }
            ResourceKind::Texture => {
                let index = self.resolve(handle, ResourceKind::Texture)?;
                live_staging(&self.reporter, &pools.textures, handle, index, kind)?;
                Ok(index)
            }
            ResourceKind::Sampler => Err(self.reporter.fail(
                &GP201,
                format!("sampler #{} passed to a transfer", handle.index()),
                ResourceError::InvalidResourceKind {
                    handle,
                    reason: "samplers have no staging memory",
                },
            )),
        }
    }

    fn staged_record(&self, handle: ResourceHandle, index: usize) -> &dyn StagedRecord<D::Resource> {
        let pools = self.pools(handle.scope());
        match handle.kind() {
            ResourceKind::Texture => &pools.textures.records[index],
            _ => &pools.buffers.records[index],
        }
    }

    /// Validate a batch and build its transfer items.
    fn prepare_batch(&self, handles: &[ResourceHandle], kind: PageKind) -> Result<(Vec<ResourceHandle>, Vec<usize>)> {
        let mut seen = HashSet::with_capacity(handles.len());
        let unique: Vec<ResourceHandle> = handles.iter().copied().filter(|h| seen.insert(*h)).collect();

        // Nothing is recorded unless every handle is valid.
        let indices = unique
            .iter()
            .map(|&handle| self.transfer_target(handle, kind))
            .collect::<Result<Vec<_>>>()?;
        Ok((unique, indices))
    }

    fn transfer_items(
        &self,
        handles: &[ResourceHandle],
        indices: &[usize],
        kind: PageKind,
    ) -> Result<Vec<TransferItem<'_, D::Resource>>> {
        handles
            .iter()
            .zip(indices)
            .map(|(&handle, &index)| {
                let record = self.staged_record(handle, index);
                let staging = record.staging_resource(kind).ok_or_else(|| {
                    self.reporter
                        .internal(format!("'{}' lost its {:?} staging resource", record.name(), kind))
                })?;
                Ok(TransferItem {
                    device: record.resource(),
                    default_state: record.default_state(),
                    staging,
                    staging_state: kind.resting_state(),
                    shape: record.copy_shape(),
                })
            })
            .collect()
    }

    /// Record the copies moving staged data into device memory.
    ///
    /// Records one barrier batch (device resources to copy-dest, upload
    /// staging to copy-source), one copy per buffer or texture subresource,
    /// then one batch restoring every state. Write-once staging is released
    /// afterwards and kept alive until [`release_retired`](Self::release_retired)
    /// or until its scope is freed. Nothing is recorded when any handle is invalid.
    ///
    /// Transitions whose before and after states match are left out. A device
    /// resource resting in copy-dest therefore adds one transition per batch
    /// instead of two, and a batch with no transitions is not recorded at all.
    pub fn upload_resources<C>(&mut self, recorder: &mut C, handles: &[ResourceHandle]) -> Result<()>
    where
        C: CommandRecorder<D::Resource> + ?Sized,
    {
        if handles.is_empty() {
            return Ok(());
        }
        let (handles, indices) = self.prepare_batch(handles, PageKind::Upload)?;

        for (&handle, &index) in handles.iter().zip(&indices) {
            let record = self.staged_record(handle, index);
            if record.transfer_state() == TransferState::Allocated {
                self.reporter.report(&GP301, &format!("'{}'", record.name()));
            }
        }

        let items = self.transfer_items(&handles, &indices, PageKind::Upload)?;
        let copies = transfer::record_upload(recorder, &items);
        log::debug!("recorded upload of {} resources ({} copies)", items.len(), copies);
        drop(items);

        for (&handle, &index) in handles.iter().zip(&indices) {
            let pools = match handle.scope() {
                Scope::LongLived => &mut self.long_lived,
                Scope::Scene => &mut self.scene,
            };
            let (resource, backing) = match handle.kind() {
                ResourceKind::Texture => {
                    finish_transfer(&mut pools.textures, index, PageKind::Upload, TransferState::Uploaded)
                }
                _ => finish_transfer(&mut pools.buffers, index, PageKind::Upload, TransferState::Uploaded),
            };
            pools.retired_resources.extend(resource);
            if let Some(backing) = backing {
                log::debug!("upload once-page retired after uploading {:?} #{}", handle.kind(), index);
                pools.retired_pages.push(backing);
            }
        }
        Ok(())
    }

    /// Record the copies moving device data into readback staging.
    ///
    /// Mirrors [`upload_resources`](Self::upload_resources); readback staging
    /// already rests in the copy-dest state, so only device resources are
    /// transitioned. Read the data with [`read_buffer`](Self::read_buffer) or
    /// [`read_texture`](Self::read_texture) once the GPU is done.
    pub fn readback_resources<C>(&mut self, recorder: &mut C, handles: &[ResourceHandle]) -> Result<()>
    where
        C: CommandRecorder<D::Resource> + ?Sized,
    {
        if handles.is_empty() {
            return Ok(());
        }
        let (handles, indices) = self.prepare_batch(handles, PageKind::Readback)?;

        let items = self.transfer_items(&handles, &indices, PageKind::Readback)?;
        let copies = transfer::record_readback(recorder, &items);
        log::debug!("recorded readback of {} resources ({} copies)", items.len(), copies);
        drop(items);

        for (&handle, &index) in handles.iter().zip(&indices) {
            let pools = match handle.scope() {
                Scope::LongLived => &mut self.long_lived,
                Scope::Scene => &mut self.scene,
            };
            match handle.kind() {
                ResourceKind::Texture => pools.textures.records[index].transfer_state = TransferState::ReadbackPending,
                _ => pools.buffers.records[index].transfer_state = TransferState::ReadbackPending,
            }
        }
        Ok(())
    }

    // =========================================================================
    // Lifetime
    // =========================================================================

    /// Release every record and page of a scope.
    ///
    /// Handles issued in the scope become stale. The scope's retired staging
    /// is released too, so the GPU must be done with the scope's resources.
    /// Retired staging of the other scope is kept.
    pub fn free_memory(&mut self, scope: Scope) {
        let pools = match scope {
            Scope::LongLived => &mut self.long_lived,
            Scope::Scene => &mut self.scene,
        };
        let generation = pools.generation.wrapping_add(1);
        let old = std::mem::replace(pools, ScopePools::new(generation));

        log::info!(
            "freed {:?} scope: {} buffers, {} textures, {} samplers, {} pages, {} retired pages",
            scope,
            old.buffers.records.len(),
            old.textures.records.len(),
            old.samplers.len(),
            [PageKind::Device, PageKind::Upload, PageKind::Readback]
                .iter()
                .map(|&kind| old.buffers.pages(kind).len() + old.textures.pages(kind).len())
                .sum::<usize>(),
            old.retired_pages.len()
        );
    }

    /// Drop released once-staging kept alive for in-flight copies, in both scopes.
    ///
    /// Call when the GPU finished the copies recorded by earlier uploads.
    /// Returns the number of pages released.
    pub fn release_retired(&mut self) -> usize {
        let pages = self.long_lived.release_retired() + self.scene.release_retired();
        if pages > 0 {
            log::debug!("released {} retired staging pages", pages);
        }
        pages
    }

    /// Borrow the manager for the lifetime of a scene.
    ///
    /// Dropping the guard frees the scene scope.
    pub fn scene_scope(&mut self) -> SceneScope<'_, D> {
        SceneScope::new(self)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Statistics of one scope.
    pub fn scope_stats(&self, scope: Scope) -> MemoryStats {
        let pools = self.pools(scope);
        let mut stats = MemoryStats::new();
        for kind in [PageKind::Device, PageKind::Upload, PageKind::Readback] {
            for page in pools.buffers.pages(kind).iter().chain(pools.textures.pages(kind)) {
                stats.pages_mut(kind).record(page);
            }
        }
        stats.buffers = pools.buffers.records.len();
        stats.textures = pools.textures.records.len();
        stats.samplers = pools.samplers.len();
        stats.retired_pages = pools.retired_pages.len();
        stats
    }

    /// Statistics of both scopes combined.
    pub fn stats(&self) -> MemoryStats {
        let mut stats = self.scope_stats(Scope::LongLived);
        stats.merge(&self.scope_stats(Scope::Scene));
        stats
    }

    /// Snapshots of the pages of one pool.
    ///
    /// Samplers have no pages.
    pub fn pages(&self, scope: Scope, resource: ResourceKind, kind: PageKind) -> Vec<PageInfo> {
        let pools = self.pools(scope);
        let pages = match resource {
            ResourceKind::Buffer => pools.buffers.pages(kind),
            ResourceKind::Texture => pools.textures.pages(kind),
            ResourceKind::Sampler => return Vec::new(),
        };
        pages
            .iter()
            .enumerate()
            .map(|(index, page)| page.info(index as u32))
            .collect()
    }
}
