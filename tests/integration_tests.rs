//! Integration tests for gpupages.

use std::sync::Arc;

use gpupages::device::dummy::RecordedCommand;
use gpupages::{
    BufferDesc, CollectingSink, DeviceLimits, DummyCommandList, DummyDevice, ManagerConfig, PageKind,
    ResourceError, ResourceFlags, ResourceKind, ResourceManager, ResourceState, SamplerDesc, Scope,
    StrictModeGuard, SubresourceData, TextureDesc, TextureFormat, TransferState,
};

/// Small alignments so byte offsets in assertions stay readable.
fn test_limits() -> DeviceLimits {
    DeviceLimits {
        placement_alignment: 4,
        texture_pitch_alignment: 256,
        texture_placement_alignment: 512,
        ..DeviceLimits::default()
    }
}

fn manager_with_pages(page_size: u64) -> ResourceManager<DummyDevice> {
    ResourceManager::new(
        DummyDevice::with_limits(test_limits()),
        ManagerConfig::default().with_page_size(page_size),
    )
}

fn sink_manager(page_size: u64) -> (ResourceManager<DummyDevice>, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let manager = manager_with_pages(page_size).with_sink(sink.clone());
    (manager, sink)
}

// =============================================================================
// Placement
// =============================================================================

#[test]
fn test_first_fit_placement() {
    let mut manager = manager_with_pages(1024);

    let a = manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(900), "a").unwrap();
    let b = manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(100), "b").unwrap();
    let c = manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(200), "c").unwrap();

    let a = manager.get_buffer(a).unwrap().residency().device;
    let b = manager.get_buffer(b).unwrap().residency().device;
    let c = manager.get_buffer(c).unwrap().residency().device;

    assert_eq!((a.page, a.offset), (0, 0));
    assert_eq!((b.page, b.offset), (0, 900));
    assert_eq!((c.page, c.offset), (1, 0));

    let pages = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Device);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].occupied_bytes, 1000);
    assert_eq!(pages[0].name, "a, b");
    assert_eq!(pages[1].name, "c");
}

#[test]
fn test_bump_and_no_overlap_invariants() {
    let mut manager = manager_with_pages(4096);
    let sizes = [13u64, 700, 64, 1, 2048, 999, 300, 4096, 5000, 17];

    let handles: Vec<_> = sizes
        .iter()
        .enumerate()
        .map(|(i, &size)| {
            let state = if i % 3 == 0 {
                ResourceState::UnorderedAccess
            } else {
                ResourceState::ShaderResource
            };
            let desc = BufferDesc::raw(size).with_default_state(state);
            manager.allocate_buffer(Scope::Scene, &desc, &format!("b{}", i)).unwrap()
        })
        .collect();

    let pages = manager.pages(Scope::Scene, ResourceKind::Buffer, PageKind::Device);
    for page in &pages {
        assert!(page.occupied_bytes <= page.capacity);
    }

    let placements: Vec<_> = handles
        .iter()
        .map(|&h| manager.get_buffer(h).unwrap().residency().device)
        .collect();
    for (i, a) in placements.iter().enumerate() {
        assert!(a.end() <= pages[a.page as usize].capacity);
        assert_eq!(a.offset % 4, 0);
        for b in &placements[i + 1..] {
            if a.page == b.page {
                assert!(a.end() <= b.offset || b.end() <= a.offset, "{:?} overlaps {:?}", a, b);
            }
        }
    }
}

#[test]
fn test_default_state_partitions_pages() {
    let mut manager = manager_with_pages(1024);
    let vb = manager.allocate_buffer(Scope::LongLived, &BufferDesc::vertex(4, 16), "vb").unwrap();
    let uav = manager
        .allocate_buffer(
            Scope::LongLived,
            &BufferDesc::structured(4, 16).with_flags(ResourceFlags::UNORDERED_ACCESS),
            "uav",
        )
        .unwrap();

    let vb = manager.get_buffer(vb).unwrap();
    let uav = manager.get_buffer(uav).unwrap();
    assert_eq!(vb.default_state(), ResourceState::VertexAndConstantBuffer);
    assert_eq!(uav.default_state(), ResourceState::UnorderedAccess);
    assert_ne!(vb.residency().device.page, uav.residency().device.page);
}

#[test]
fn test_oversized_buffer_gets_dedicated_page() {
    let (mut manager, sink) = sink_manager(1024);
    let big = manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(3000), "big").unwrap();

    let placement = manager.get_buffer(big).unwrap().residency().device;
    assert_eq!(placement.offset, 0);
    let pages = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Device);
    assert_eq!(pages[0].capacity, 3000);
    assert_eq!(sink.with_code("GP002").len(), 1);
}

#[test]
fn test_out_of_device_memory() {
    let sink = Arc::new(CollectingSink::new());
    let device = DummyDevice::with_limits(test_limits()).with_memory_budget(2048);
    let mut manager =
        ResourceManager::new(device, ManagerConfig::default().with_page_size(1024)).with_sink(sink.clone());

    manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(1024), "a").unwrap();
    manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(1024), "b").unwrap();
    let err = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::raw(16), "c")
        .unwrap_err();

    assert_eq!(
        err,
        ResourceError::OutOfDeviceMemory {
            kind: PageKind::Device,
            size: 1024
        }
    );
    assert_eq!(sink.with_code("GP001").len(), 1);

    // Freeing the scope gives the memory back.
    manager.free_memory(Scope::LongLived);
    assert!(manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(16), "c").is_ok());
}

#[test]
fn test_huge_buffer_is_out_of_memory() {
    let sink = Arc::new(CollectingSink::new());
    let device = DummyDevice::new().with_memory_budget(1 << 30);
    let mut manager = ResourceManager::new(device, ManagerConfig::minimal()).with_sink(sink.clone());

    // Rounding up to the 64 KiB placement alignment does not fit in a u64.
    let err = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::raw(u64::MAX - 10), "huge")
        .unwrap_err();
    assert_eq!(
        err,
        ResourceError::OutOfDeviceMemory {
            kind: PageKind::Device,
            size: u64::MAX - 10
        }
    );

    // count * stride does not fit either.
    let err = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::structured(u64::MAX / 2, 16), "wide")
        .unwrap_err();
    assert!(matches!(
        err,
        ResourceError::OutOfDeviceMemory {
            kind: PageKind::Device,
            ..
        }
    ));

    assert_eq!(sink.with_code("GP001").len(), 2);
    assert_eq!(manager.device().heaps_created(), 0);
    assert_eq!(manager.stats().buffers, 0);
    assert!(manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(64), "small").is_ok());
}

#[test]
fn test_huge_aligned_buffer_is_out_of_memory() {
    let mut manager = manager_with_pages(1024);
    // Alignment succeeds, the device cannot back the page.
    let err = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::raw(u64::MAX - 8), "huge")
        .unwrap_err();
    assert!(matches!(
        err,
        ResourceError::OutOfDeviceMemory {
            kind: PageKind::Device,
            ..
        }
    ));
    assert_eq!(manager.device().live_heaps(), 0);
}

#[test]
fn test_failed_readback_placement_returns_upload_reference() {
    let sink = Arc::new(CollectingSink::new());
    // Room for one device page and one upload page of 1024 bytes.
    let device = DummyDevice::with_limits(test_limits()).with_memory_budget(2048);
    let mut manager =
        ResourceManager::new(device, ManagerConfig::default().with_page_size(1024)).with_sink(sink.clone());

    let first = manager
        .allocate_buffer(
            Scope::LongLived,
            &BufferDesc::raw(64).with_flags(ResourceFlags::CPU_WRITE_ONCE),
            "first",
        )
        .unwrap();
    let upload = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Upload);
    assert_eq!(upload[0].refcount, 1);

    let flags = ResourceFlags::CPU_WRITE_ONCE | ResourceFlags::CPU_READ;
    let err = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::raw(64).with_flags(flags), "second")
        .unwrap_err();
    assert_eq!(
        err,
        ResourceError::OutOfDeviceMemory {
            kind: PageKind::Readback,
            size: 1024
        }
    );
    assert_eq!(sink.with_code("GP001").len(), 1);

    let upload = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Upload);
    assert_eq!(upload.len(), 1);
    assert_eq!(upload[0].refcount, 1);
    assert!(!upload[0].released);
    assert_eq!(manager.stats().buffers, 1);

    // The surviving once-resource still releases the page after its upload.
    manager.update_buffer(first, None).unwrap();
    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &[first]).unwrap();
    let upload = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Upload);
    assert!(upload[0].released);
    assert_eq!(manager.release_retired(), 1);
}

#[test]
fn test_staging_pages_follow_flags() {
    let mut manager = manager_with_pages(4096);
    let flags = ResourceFlags::CPU_WRITE | ResourceFlags::CPU_READ_ONCE;
    let handle = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::raw(64).with_flags(flags), "rw")
        .unwrap();
    let plain = manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(64), "gpu only").unwrap();

    let residency = *manager.get_buffer(handle).unwrap().residency();
    assert!(residency.upload.is_some_and(|slot| !slot.once));
    assert!(residency.readback.is_some_and(|slot| slot.once));

    let plain = manager.get_buffer(plain).unwrap().residency();
    assert!(plain.upload.is_none() && plain.readback.is_none());

    let upload = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Upload);
    let readback = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Readback);
    assert_eq!(upload.len(), 1);
    assert!(!upload[0].once);
    assert_eq!(readback.len(), 1);
    assert!(readback[0].once);
    assert_eq!(readback[0].refcount, 1);
}

#[test]
fn test_invalid_flag_combination() {
    let mut manager = manager_with_pages(1024);
    let flags = ResourceFlags::CPU_WRITE | ResourceFlags::CPU_WRITE_ONCE;
    let err = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::raw(64).with_flags(flags), "bad")
        .unwrap_err();
    assert!(matches!(err, ResourceError::InvalidDescriptor(_)));
}

// =============================================================================
// Transfers
// =============================================================================

#[test]
fn test_upload_batch_barrier_symmetry() {
    let mut manager = manager_with_pages(4096);
    let n = 5;
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let desc = BufferDesc::raw(32 + i as u64).with_flags(ResourceFlags::CPU_WRITE);
            let handle = manager.allocate_buffer(Scope::Scene, &desc, &format!("b{}", i)).unwrap();
            manager.update_buffer(handle, Some(&[i as u8; 8])).unwrap();
            handle
        })
        .collect();

    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &handles).unwrap();

    let batches = list.barrier_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2 * n);
    assert_eq!(batches[1].len(), 2 * n);
    assert_eq!(list.copy_count(), n);

    for (before, after) in batches[0].iter().zip(batches[1]) {
        assert_eq!(before.resource, after.resource);
        assert_eq!(before.before, after.after);
        assert_eq!(before.after, after.before);
    }
    assert!(batches[0]
        .iter()
        .all(|t| t.after == ResourceState::CopyDest || t.after == ResourceState::CopySource));
}

#[test]
fn test_readback_batch_structure() {
    let mut manager = manager_with_pages(4096);
    let n = 3;
    let flags = ResourceFlags::CPU_WRITE | ResourceFlags::CPU_READ;
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let desc = BufferDesc::raw(16).with_flags(flags);
            let handle = manager.allocate_buffer(Scope::Scene, &desc, &format!("r{}", i)).unwrap();
            manager.update_buffer(handle, Some(&[i as u8; 16])).unwrap();
            handle
        })
        .collect();

    let mut upload = DummyCommandList::new();
    manager.upload_resources(&mut upload, &handles).unwrap();
    upload.execute().unwrap();

    let mut list = DummyCommandList::new();
    manager.readback_resources(&mut list, &handles).unwrap();

    // Only device resources move; readback staging already rests in copy-dest.
    let device_ids: Vec<u32> = handles
        .iter()
        .map(|&h| manager.get_buffer(h).unwrap().resource().id())
        .collect();
    let batches = list.barrier_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), n);
    assert_eq!(batches[1].len(), n);
    for (i, (before, after)) in batches[0].iter().zip(batches[1]).enumerate() {
        assert_eq!(before.resource, device_ids[i]);
        assert_eq!(before.before, ResourceState::ShaderResource);
        assert_eq!(before.after, ResourceState::CopySource);
        assert_eq!((after.resource, after.before, after.after), (before.resource, before.after, before.before));
    }

    let commands = list.commands();
    assert_eq!(commands.len(), n + 2);
    assert!(matches!(commands[0], RecordedCommand::Barriers(_)));
    assert!(commands[1..=n]
        .iter()
        .all(|c| matches!(c, RecordedCommand::CopyBuffer { .. })));
    assert!(matches!(commands[n + 1], RecordedCommand::Barriers(_)));

    list.execute().unwrap();
    for (i, &handle) in handles.iter().enumerate() {
        assert_eq!(manager.read_buffer(handle).unwrap(), vec![i as u8; 16]);
    }
}

#[test]
fn test_buffer_round_trip() {
    let mut manager = manager_with_pages(4096);
    let flags = ResourceFlags::CPU_WRITE | ResourceFlags::CPU_READ;
    let handle = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::structured(16, 4).with_flags(flags), "data")
        .unwrap();

    let data: Vec<u8> = (0..64).collect();
    manager.update_buffer(handle, Some(&data)).unwrap();

    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &[handle]).unwrap();
    manager.readback_resources(&mut list, &[handle]).unwrap();
    list.execute().unwrap();

    assert_eq!(manager.read_buffer(handle).unwrap(), data);
}

#[test]
fn test_update_prefix_and_zero_fill() {
    let mut manager = manager_with_pages(4096);
    let flags = ResourceFlags::CPU_WRITE | ResourceFlags::CPU_READ;
    let handle = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::raw(8).with_flags(flags), "prefix")
        .unwrap();

    let mut list = DummyCommandList::new();
    manager.update_buffer(handle, Some(&[9, 9, 9, 9, 9, 9, 9, 9])).unwrap();
    manager.update_buffer(handle, Some(&[1, 2])).unwrap();
    manager.upload_resources(&mut list, &[handle]).unwrap();
    manager.readback_resources(&mut list, &[handle]).unwrap();
    list.execute().unwrap();
    assert_eq!(manager.read_buffer(handle).unwrap(), vec![1, 2, 0, 0, 0, 0, 0, 0]);

    let err = manager.update_buffer(handle, Some(&[0; 9])).unwrap_err();
    assert_eq!(err, ResourceError::DataSizeMismatch { expected: 8, actual: 9 });
}

#[test]
fn test_write_once_lifecycle() {
    let (mut manager, sink) = sink_manager(4096);
    let desc = BufferDesc::raw(64).with_flags(ResourceFlags::CPU_WRITE_ONCE);
    let handle = manager.allocate_buffer(Scope::Scene, &desc, "once").unwrap();

    manager.update_buffer(handle, Some(&[1; 64])).unwrap();
    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &[handle]).unwrap();

    let upload = manager.pages(Scope::Scene, ResourceKind::Buffer, PageKind::Upload);
    assert!(upload[0].released);
    assert_eq!(upload[0].refcount, 0);
    assert_eq!(manager.stats().retired_pages, 1);
    assert_eq!(
        manager.get_buffer(handle).unwrap().transfer_state(),
        TransferState::ReleasedStaging
    );

    let err = manager.update_buffer(handle, Some(&[2; 64])).unwrap_err();
    assert_eq!(err, ResourceError::StaleOnceResource { handle });
    assert_eq!(sink.with_code("GP202").len(), 1);

    let err = manager.upload_resources(&mut list, &[handle]).unwrap_err();
    assert_eq!(err, ResourceError::StaleOnceResource { handle });
}

#[test]
fn test_once_page_waits_for_every_resource() {
    let mut manager = manager_with_pages(4096);
    let device_heaps = |m: &ResourceManager<DummyDevice>| m.device().live_heaps();

    let desc = BufferDesc::raw(64).with_flags(ResourceFlags::CPU_WRITE_ONCE);
    let a = manager.allocate_buffer(Scope::LongLived, &desc, "a").unwrap();
    let b = manager.allocate_buffer(Scope::LongLived, &desc, "b").unwrap();
    manager.update_buffer(a, None).unwrap();
    manager.update_buffer(b, None).unwrap();

    // One device page, one shared once upload page.
    assert_eq!(device_heaps(&manager), 2);

    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &[a]).unwrap();
    let upload = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Upload);
    assert_eq!(upload[0].refcount, 1);
    assert!(!upload[0].released);

    manager.upload_resources(&mut list, &[b]).unwrap();
    let upload = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Upload);
    assert!(upload[0].released);

    // Retired memory survives until the caller knows the copies completed.
    list.execute().unwrap();
    assert_eq!(device_heaps(&manager), 2);
    assert_eq!(manager.release_retired(), 1);
    assert_eq!(device_heaps(&manager), 1);
}

#[test]
fn test_read_once_lifecycle() {
    let mut manager = manager_with_pages(4096);
    let flags = ResourceFlags::CPU_WRITE | ResourceFlags::CPU_READ_ONCE;
    let handle = manager
        .allocate_buffer(Scope::LongLived, &BufferDesc::raw(4).with_flags(flags), "query")
        .unwrap();

    manager.update_buffer(handle, Some(&[4, 3, 2, 1])).unwrap();
    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &[handle]).unwrap();
    manager.readback_resources(&mut list, &[handle]).unwrap();
    list.execute().unwrap();

    assert_eq!(manager.read_buffer(handle).unwrap(), vec![4, 3, 2, 1]);
    let readback = manager.pages(Scope::LongLived, ResourceKind::Buffer, PageKind::Readback);
    assert!(readback[0].released);

    assert_eq!(
        manager.read_buffer(handle).unwrap_err(),
        ResourceError::StaleOnceResource { handle }
    );
    assert_eq!(
        manager.readback_resources(&mut list, &[handle]).unwrap_err(),
        ResourceError::StaleOnceResource { handle }
    );

    // The persistent upload allocation keeps working.
    manager.update_buffer(handle, None).unwrap();
}

#[test]
fn test_missing_cpu_flag_is_invalid_kind() {
    let (mut manager, sink) = sink_manager(4096);
    let handle = manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(16), "gpu only").unwrap();

    assert!(matches!(
        manager.update_buffer(handle, None),
        Err(ResourceError::InvalidResourceKind { .. })
    ));
    assert!(matches!(
        manager.read_buffer(handle),
        Err(ResourceError::InvalidResourceKind { .. })
    ));
    assert_eq!(sink.with_code("GP201").len(), 2);
}

#[test]
fn test_invalid_batch_records_nothing() {
    let mut manager = manager_with_pages(4096);
    let good = manager
        .allocate_buffer(
            Scope::LongLived,
            &BufferDesc::raw(16).with_flags(ResourceFlags::CPU_WRITE),
            "good",
        )
        .unwrap();
    let sampler = manager
        .allocate_sampler(Scope::LongLived, &SamplerDesc::point_clamp(), "point")
        .unwrap();

    let mut list = DummyCommandList::new();
    let err = manager.upload_resources(&mut list, &[good, sampler]).unwrap_err();
    assert!(matches!(err, ResourceError::InvalidResourceKind { .. }));
    assert!(list.commands().is_empty());

    manager.upload_resources(&mut list, &[]).unwrap();
    assert!(list.commands().is_empty());
}

#[test]
fn test_read_without_readback_warns() {
    let (mut manager, sink) = sink_manager(4096);
    let handle = manager
        .allocate_buffer(
            Scope::LongLived,
            &BufferDesc::raw(16).with_flags(ResourceFlags::CPU_READ),
            "early",
        )
        .unwrap();

    assert_eq!(manager.read_buffer(handle).unwrap(), vec![0; 16]);
    assert_eq!(sink.with_code("GP302").len(), 1);
}

// =============================================================================
// Textures
// =============================================================================

#[test]
fn test_mip_clamp_warns() {
    let (mut manager, sink) = sink_manager(1 << 20);
    let desc = TextureDesc::d3(TextureFormat::Rgba8Unorm, 4, 4, 4).with_mip_levels(255);
    let handle = manager.allocate_texture(Scope::Scene, &desc, "volume").unwrap();

    let texture = manager.get_texture(handle).unwrap();
    assert_eq!(texture.mip_levels(), 3);
    assert_eq!(texture.layout().subresources.len(), 3);

    let warnings = sink.with_code("GP102");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].context.contains("volume"));
    assert!(sink.has_warnings());
}

#[test]
fn test_texture_extent_clamp() {
    let (mut manager, sink) = sink_manager(1 << 20);
    let limits = DeviceLimits {
        max_texture_dimension_2d: 64,
        ..test_limits()
    };
    let mut manager_small = ResourceManager::new(
        DummyDevice::with_limits(limits),
        ManagerConfig::default().with_page_size(1 << 20),
    )
    .with_sink(sink.clone());

    let desc = TextureDesc::d2(TextureFormat::R8Unorm, 100, 32);
    let handle = manager_small.allocate_texture(Scope::Scene, &desc, "wide").unwrap();
    assert_eq!(manager_small.get_texture(handle).unwrap().desc().width, 64);
    assert_eq!(sink.with_code("GP101").len(), 1);

    // Within limits nothing is reported.
    manager.allocate_texture(Scope::Scene, &desc, "fits").unwrap();
    assert_eq!(sink.with_code("GP101").len(), 1);
}

#[test]
fn test_texture_round_trip() {
    let mut manager = manager_with_pages(1 << 20);
    let flags = ResourceFlags::CPU_WRITE_ONCE | ResourceFlags::CPU_READ;
    let desc = TextureDesc::d2(TextureFormat::Rgba8Unorm, 5, 3)
        .with_mip_levels(2)
        .with_array_layers(2)
        .with_flags(flags);
    let handle = manager.allocate_texture(Scope::Scene, &desc, "atlas").unwrap();

    let layout = manager.get_texture(handle).unwrap().layout().clone();
    assert_eq!(layout.subresources.len(), 4);
    // 5 texels * 4 bytes = 20 byte rows, padded to the 256 byte pitch.
    assert_eq!(layout.subresources[0].row_pitch, 256);

    let sources: Vec<Vec<u8>> = layout
        .subresources
        .iter()
        .enumerate()
        .map(|(i, fp)| (0..fp.packed_size()).map(|b| (b as u8).wrapping_mul(3).wrapping_add(i as u8)).collect())
        .collect();
    let data: Vec<SubresourceData<'_>> = sources.iter().map(|s| SubresourceData::packed(s)).collect();
    manager.update_texture(handle, Some(&data)).unwrap();

    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &[handle]).unwrap();
    manager.readback_resources(&mut list, &[handle]).unwrap();
    list.execute().unwrap();

    assert_eq!(manager.read_texture(handle).unwrap(), sources);
    // One copy per subresource in each direction.
    assert_eq!(list.copy_count(), 8);
    assert_eq!(manager.get_texture(handle).unwrap().transfer_state(), TransferState::Read);
}

#[test]
fn test_texture_update_validates_subresources() {
    let mut manager = manager_with_pages(1 << 20);
    let desc = TextureDesc::d2(TextureFormat::Rgba8Unorm, 4, 4)
        .with_mip_levels(0)
        .with_flags(ResourceFlags::CPU_WRITE);
    let handle = manager.allocate_texture(Scope::Scene, &desc, "mipped").unwrap();
    assert_eq!(manager.get_texture(handle).unwrap().mip_levels(), 3);

    let texels = [0u8; 64];
    let err = manager
        .update_texture(handle, Some(&[SubresourceData::packed(&texels)]))
        .unwrap_err();
    assert_eq!(err, ResourceError::SubresourceCountMismatch { expected: 3, actual: 1 });

    manager.update_texture(handle, None).unwrap();
}

#[test]
fn test_texture_update_rejects_overflowing_pitch() {
    let mut manager = manager_with_pages(1 << 20);
    let desc = TextureDesc::d2(TextureFormat::R8Unorm, 4, 4).with_flags(ResourceFlags::CPU_WRITE);
    let handle = manager.allocate_texture(Scope::Scene, &desc, "small").unwrap();

    let texels = [0u8; 16];
    let err = manager
        .update_texture(handle, Some(&[SubresourceData::with_row_pitch(&texels, u64::MAX / 2)]))
        .unwrap_err();
    assert_eq!(err, ResourceError::InvalidDescriptor("source pitch overflows"));
    assert_eq!(manager.get_texture(handle).unwrap().transfer_state(), TransferState::Allocated);

    manager.update_texture(handle, Some(&[SubresourceData::packed(&texels)])).unwrap();
}

#[test]
fn test_invalid_texture_descriptors() {
    let mut manager = manager_with_pages(1 << 20);

    let zero = TextureDesc::d2(TextureFormat::Rgba8Unorm, 0, 4);
    assert!(matches!(
        manager.allocate_texture(Scope::Scene, &zero, "zero"),
        Err(ResourceError::InvalidDescriptor(_))
    ));

    let depth_volume = TextureDesc::d3(TextureFormat::Depth32Float, 4, 4, 4);
    assert!(matches!(
        manager.allocate_texture(Scope::Scene, &depth_volume, "depth"),
        Err(ResourceError::InvalidDescriptor(_))
    ));
}

// =============================================================================
// Scopes and handles
// =============================================================================

#[test]
fn test_free_memory_releases_scope() {
    let mut manager = manager_with_pages(4096);
    let long = manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(64), "long").unwrap();
    let scene = manager
        .allocate_buffer(
            Scope::Scene,
            &BufferDesc::raw(64).with_flags(ResourceFlags::CPU_WRITE),
            "scene",
        )
        .unwrap();
    let sampler = manager
        .allocate_sampler(Scope::Scene, &SamplerDesc::linear_wrap(), "linear")
        .unwrap();
    assert_eq!(manager.device().live_heaps(), 3);

    manager.free_memory(Scope::Scene);

    assert_eq!(manager.device().live_heaps(), 1);
    assert!(manager.get_buffer(long).is_ok());
    assert_eq!(manager.get_buffer(scene).unwrap_err(), ResourceError::StaleHandle { handle: scene });
    assert_eq!(manager.get_sampler(sampler).unwrap_err(), ResourceError::StaleHandle { handle: sampler });

    // A new record at the same index does not revive the old handle.
    let fresh = manager.allocate_buffer(Scope::Scene, &BufferDesc::raw(64), "fresh").unwrap();
    assert_eq!(fresh.index(), scene.index());
    assert!(manager.get_buffer(scene).is_err());
    assert!(manager.get_buffer(fresh).is_ok());
}

#[test]
fn test_freeing_scene_keeps_long_lived_retired_staging() {
    let mut manager = manager_with_pages(4096);
    let desc = BufferDesc::raw(64).with_flags(ResourceFlags::CPU_WRITE_ONCE);
    let long = manager.allocate_buffer(Scope::LongLived, &desc, "long").unwrap();
    let scene = manager.allocate_buffer(Scope::Scene, &desc, "scene").unwrap();
    manager.update_buffer(long, None).unwrap();
    manager.update_buffer(scene, None).unwrap();

    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &[long, scene]).unwrap();
    assert_eq!(manager.stats().retired_pages, 2);
    assert_eq!(manager.scope_stats(Scope::LongLived).retired_pages, 1);

    // The long-lived copy may still be in flight.
    manager.free_memory(Scope::Scene);
    assert_eq!(manager.stats().retired_pages, 1);
    assert_eq!(manager.scope_stats(Scope::LongLived).retired_pages, 1);
    // Long-lived device page plus its retired upload page.
    assert_eq!(manager.device().live_heaps(), 2);

    assert_eq!(manager.release_retired(), 1);
    assert_eq!(manager.device().live_heaps(), 1);
}

#[test]
fn test_scene_scope_guard() {
    let mut manager = manager_with_pages(4096);
    let handle;
    {
        let mut scene = manager.scene_scope();
        handle = scene.allocate_buffer(Scope::Scene, &BufferDesc::raw(32), "level").unwrap();
        assert_eq!(scene.stats().buffers, 1);
    }
    assert_eq!(manager.stats().buffers, 0);
    assert_eq!(manager.device().live_heaps(), 0);
    assert!(manager.get_buffer(handle).is_err());
}

#[test]
fn test_manager_drop_releases_everything() {
    let device = DummyDevice::with_limits(test_limits());
    let mut manager = ResourceManager::new(device, ManagerConfig::default().with_page_size(4096));
    let desc = BufferDesc::raw(64).with_flags(ResourceFlags::CPU_WRITE_ONCE | ResourceFlags::CPU_READ);
    let handle = manager.allocate_buffer(Scope::LongLived, &desc, "x").unwrap();
    manager.update_buffer(handle, None).unwrap();
    let mut list = DummyCommandList::new();
    manager.upload_resources(&mut list, &[handle]).unwrap();

    let stats = manager.stats();
    assert_eq!(stats.device.pages, 1);
    assert_eq!(stats.upload.released, 1);
    assert_eq!(stats.retired_pages, 1);

    // Dropping the manager drops records, pages and retired memory before the device.
    drop(list);
    drop(manager);
}

#[test]
#[should_panic(expected = "GP203")]
fn test_strict_mode_panics_on_stale_handle() {
    let _guard = StrictModeGuard::panic_on_error();
    let mut manager = manager_with_pages(4096);
    let handle = manager.allocate_buffer(Scope::Scene, &BufferDesc::raw(16), "gone").unwrap();
    manager.free_memory(Scope::Scene);
    let _ = manager.get_buffer(handle);
}

#[test]
fn test_stats_display() {
    let mut manager = manager_with_pages(4096);
    manager.allocate_buffer(Scope::LongLived, &BufferDesc::raw(1024), "a").unwrap();
    manager
        .allocate_texture(Scope::Scene, &TextureDesc::d2(TextureFormat::R8Unorm, 16, 16), "t")
        .unwrap();
    manager
        .allocate_sampler(Scope::Scene, &SamplerDesc::default(), "s")
        .unwrap();

    let stats = manager.stats();
    assert_eq!((stats.buffers, stats.textures, stats.samplers), (1, 1, 1));
    assert_eq!(manager.scope_stats(Scope::LongLived).device.occupied, 1024);

    let text = stats.to_string();
    assert!(text.contains("Memory Statistics"));
    assert!(text.contains("Samplers: 1"));
}
