//! Upload and readback orchestration.
//!
//! Staging writes and reads go through a page's CPU mapping. Device copies are
//! recorded in three phases: one barrier batch moving everything into copy
//! states, the copies, then one batch restoring the resting states.

use crate::device::{CommandRecorder, CpuMapping, ResourceState, TextureCopyLocation, Transition};
use crate::error::{ResourceError, Result};
use crate::resources::texture::{SubresourceData, SubresourceFootprint, TextureLayout};

/// What a device copy moves for one record.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CopyShape<'a> {
    /// `size` bytes from offset 0.
    Buffer { size: u64 },
    /// Every subresource of the layout.
    Texture(&'a TextureLayout),
}

/// One record taking part in an upload or readback batch.
pub(crate) struct TransferItem<'a, R> {
    /// Device-local resource.
    pub device: &'a R,
    /// Resting state of the device resource.
    pub default_state: ResourceState,
    /// The record's own staging resource.
    pub staging: &'a R,
    /// Resting state of the staging resource.
    pub staging_state: ResourceState,
    pub shape: CopyShape<'a>,
}

fn push_transition<'a, R>(
    batch: &mut Vec<Transition<'a, R>>,
    resource: &'a R,
    before: ResourceState,
    after: ResourceState,
) {
    if before != after {
        batch.push(Transition {
            resource,
            before,
            after,
        });
    }
}

fn record_batches<'a, R, C>(
    recorder: &mut C,
    items: &[TransferItem<'a, R>],
    transition_staging: bool,
    device_copy_state: ResourceState,
    staging_copy_state: ResourceState,
    mut copy: impl FnMut(&mut C, &TransferItem<'a, R>) -> usize,
) -> usize
where
    C: CommandRecorder<R> + ?Sized,
{
    let mut before = Vec::with_capacity(items.len() * 2);
    let mut after = Vec::with_capacity(items.len() * 2);

    for item in items {
        push_transition(&mut before, item.device, item.default_state, device_copy_state);
        push_transition(&mut after, item.device, device_copy_state, item.default_state);
        if transition_staging {
            push_transition(&mut before, item.staging, item.staging_state, staging_copy_state);
            push_transition(&mut after, item.staging, staging_copy_state, item.staging_state);
        }
    }

    if !before.is_empty() {
        recorder.resource_barriers(&before);
    }
    let copies = items.iter().map(|item| copy(recorder, item)).sum();
    if !after.is_empty() {
        recorder.resource_barriers(&after);
    }
    copies
}

/// Record staging-to-device copies for a batch of records.
///
/// Returns the number of copy commands recorded.
pub(crate) fn record_upload<R, C>(recorder: &mut C, items: &[TransferItem<'_, R>]) -> usize
where
    C: CommandRecorder<R> + ?Sized,
{
    record_batches(
        recorder,
        items,
        true,
        ResourceState::CopyDest,
        ResourceState::CopySource,
        |recorder, item| match item.shape {
            CopyShape::Buffer { size } => {
                recorder.copy_buffer_region(item.device, 0, item.staging, 0, size);
                1
            }
            CopyShape::Texture(layout) => {
                for (index, footprint) in layout.subresources.iter().enumerate() {
                    recorder.copy_texture_region(
                        TextureCopyLocation::Subresource {
                            resource: item.device,
                            index: index as u32,
                        },
                        TextureCopyLocation::Footprint {
                            resource: item.staging,
                            footprint: *footprint,
                        },
                    );
                }
                layout.subresources.len()
            }
        },
    )
}

/// Record device-to-staging copies for a batch of records.
///
/// Readback staging rests in the copy-destination state, so only the device
/// resources are transitioned.
pub(crate) fn record_readback<R, C>(recorder: &mut C, items: &[TransferItem<'_, R>]) -> usize
where
    C: CommandRecorder<R> + ?Sized,
{
    record_batches(
        recorder,
        items,
        false,
        ResourceState::CopySource,
        ResourceState::CopyDest,
        |recorder, item| match item.shape {
            CopyShape::Buffer { size } => {
                recorder.copy_buffer_region(item.staging, 0, item.device, 0, size);
                1
            }
            CopyShape::Texture(layout) => {
                for (index, footprint) in layout.subresources.iter().enumerate() {
                    recorder.copy_texture_region(
                        TextureCopyLocation::Footprint {
                            resource: item.staging,
                            footprint: *footprint,
                        },
                        TextureCopyLocation::Subresource {
                            resource: item.device,
                            index: index as u32,
                        },
                    );
                }
                layout.subresources.len()
            }
        },
    )
}

// =============================================================================
// Staging memory access
// =============================================================================

/// Write buffer data at `base`; bytes past `data` (or all, if absent) are zeroed.
pub(crate) fn stage_buffer<M: CpuMapping + ?Sized>(
    mapping: &mut M,
    base: u64,
    size: u64,
    data: Option<&[u8]>,
) -> Result<()> {
    let data = data.unwrap_or(&[]);
    let len = data.len() as u64;
    if len > size {
        return Err(ResourceError::DataSizeMismatch {
            expected: size,
            actual: len,
        });
    }
    mapping.write(base, data)?;
    if len < size {
        mapping.fill(base + len, size - len, 0)?;
    }
    Ok(())
}

/// Read `size` bytes at `base`.
pub(crate) fn read_staged_buffer<M: CpuMapping + ?Sized>(mapping: &M, base: u64, size: u64) -> Result<Vec<u8>> {
    let mut out = vec![0u8; size as usize];
    mapping.read(base, &mut out)?;
    Ok(out)
}

/// Source strides of one subresource, validated against its data.
struct SourcePitch {
    row: u64,
    slice: u64,
}

fn source_pitch(footprint: &SubresourceFootprint, data: &SubresourceData<'_>) -> Result<SourcePitch> {
    let row = data.row_pitch.unwrap_or(footprint.row_size);
    if row < footprint.row_size {
        return Err(ResourceError::InvalidDescriptor("source row pitch is smaller than a row"));
    }
    let rows = u64::from(footprint.row_count);
    let overflow = || ResourceError::InvalidDescriptor("source pitch overflows");

    let packed_slice = row.checked_mul(rows).ok_or_else(overflow)?;
    let slice = data.slice_pitch.unwrap_or(packed_slice);
    if slice < packed_slice {
        return Err(ResourceError::InvalidDescriptor("source slice pitch is smaller than a slice"));
    }

    let required = slice
        .checked_mul(u64::from(footprint.depth.saturating_sub(1)))
        .zip(row.checked_mul(rows.saturating_sub(1)))
        .and_then(|(slices, rows)| slices.checked_add(rows)?.checked_add(footprint.row_size))
        .ok_or_else(overflow)?;
    if (data.data.len() as u64) < required {
        return Err(ResourceError::DataSizeMismatch {
            expected: required,
            actual: data.data.len() as u64,
        });
    }
    Ok(SourcePitch { row, slice })
}

/// Write texture subresources row by row at `base`, honoring the device row pitch.
///
/// With no data the whole staging range is zeroed.
pub(crate) fn stage_texture<M: CpuMapping + ?Sized>(
    mapping: &mut M,
    base: u64,
    layout: &TextureLayout,
    data: Option<&[SubresourceData<'_>]>,
) -> Result<()> {
    let Some(data) = data else {
        mapping.fill(base, layout.total_bytes, 0)?;
        return Ok(());
    };
    if data.len() != layout.subresources.len() {
        return Err(ResourceError::SubresourceCountMismatch {
            expected: layout.subresources.len(),
            actual: data.len(),
        });
    }

    // Validate everything before touching staging memory.
    let pitches = layout
        .subresources
        .iter()
        .zip(data)
        .map(|(footprint, sub)| source_pitch(footprint, sub))
        .collect::<Result<Vec<_>>>()?;

    for ((footprint, sub), pitch) in layout.subresources.iter().zip(data).zip(pitches) {
        let dst_slice = footprint.row_pitch * u64::from(footprint.row_count);
        for z in 0..u64::from(footprint.depth) {
            for y in 0..u64::from(footprint.row_count) {
                let src = (z * pitch.slice + y * pitch.row) as usize;
                let dst = base + footprint.offset + z * dst_slice + y * footprint.row_pitch;
                mapping.write(dst, &sub.data[src..src + footprint.row_size as usize])?;
            }
        }
    }
    Ok(())
}

/// Read every subresource at `base` into tightly packed rows.
pub(crate) fn read_staged_texture<M: CpuMapping + ?Sized>(
    mapping: &M,
    base: u64,
    layout: &TextureLayout,
) -> Result<Vec<Vec<u8>>> {
    layout
        .subresources
        .iter()
        .map(|footprint| {
            let mut out = vec![0u8; footprint.packed_size() as usize];
            let dst_slice = footprint.row_pitch * u64::from(footprint.row_count);
            let rows = u64::from(footprint.row_count);
            for z in 0..u64::from(footprint.depth) {
                for y in 0..rows {
                    let start = ((z * rows + y) * footprint.row_size) as usize;
                    let src = base + footprint.offset + z * dst_slice + y * footprint.row_pitch;
                    mapping.read(src, &mut out[start..start + footprint.row_size as usize])?;
                }
            }
            Ok(out)
        })
        .collect()
}
