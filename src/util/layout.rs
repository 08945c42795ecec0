//! Alignment utilities for page placement and texture footprints.

/// Align a size up to the given power-of-two alignment.
///
/// Returns `None` when the aligned size does not fit in a `u64`.
#[inline]
pub const fn align_up(size: u64, align: u64) -> Option<u64> {
    match size.checked_add(align - 1) {
        Some(padded) => Some(padded & !(align - 1)),
        None => None,
    }
}

/// Number of `block`-sized units needed to cover `extent` (rounding up).
#[inline]
pub const fn div_ceil(extent: u64, block: u64) -> u64 {
    (extent + block - 1) / block
}
