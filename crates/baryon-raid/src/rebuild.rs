//! Synchronous reconstruction of a re-added device.
//!
//! Runs at startup, before the transport is attached, when exactly one
//! slot was marked for rebuild and no slot is absent. Every stripe column
//! is XORed across the surviving slots and written to the rebuild slot;
//! the slot's prior contents never contribute.

use crate::disk::SlotTable;
use crate::error::RebuildError;
use crate::parity;

/// Reconstructs `slot` block by block from the other slots.
///
/// `device_blocks` is the per-device block count of the array,
/// `virtual_size / (block_size * data_device_count)`.
///
/// # Errors
///
/// Fails fast on the first read or write error; whatever was written so
/// far is left on the device and is not reused.
pub fn rebuild(
    disks: &mut SlotTable,
    block_size: usize,
    slot: usize,
    device_blocks: u64,
) -> Result<(), RebuildError> {
    for block in 0..device_blocks {
        let column = parity::reconstruct_without(disks, block_size, block, slot)
            .map_err(|source| RebuildError { block, source })?;
        disks
            .write_at(slot, block * block_size as u64, &column)
            .map_err(|source| RebuildError { block, source })?;
    }
    Ok(())
}
