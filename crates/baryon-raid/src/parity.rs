//! XOR parity arithmetic and stripe-column reconstruction.
//!
//! A RAID-4 array keeps, at in-device block index `k` of the parity slot,
//! the XOR of block `k` of every data slot. Equivalently: the XOR of
//! block `k` across *all* slots is zero. Reconstruction and incremental
//! parity updates both fall out of that invariant.

use crate::disk::SlotTable;
use crate::error::DiskError;

/// XORs `src` into `dst` byte by byte.
///
/// Both buffers must be one stripe unit long.
pub fn xor_into(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= *s;
    }
}

/// Folds a data-block change into a parity block in place.
///
/// `parity` becomes `parity XOR old_data XOR new_data`, the parity of the
/// stripe after the block changed from `old_data` to `new_data`.
pub fn update_parity(parity: &mut [u8], old_data: &[u8], new_data: &[u8]) {
    xor_into(parity, old_data);
    xor_into(parity, new_data);
}

/// XORs stripe column `device_block` across every present slot.
///
/// With exactly one slot absent, the result is the absent slot's block.
/// With every slot present and the parity invariant intact, the result is
/// all zeroes; callers are expected not to ask in that case.
///
/// # Errors
///
/// Propagates the first slot read failure.
pub fn reconstruct(
    disks: &mut SlotTable,
    block_size: usize,
    device_block: u64,
) -> Result<Vec<u8>, DiskError> {
    reconstruct_skipping(disks, block_size, device_block, None)
}

/// Like [`reconstruct`], but also treats `skip` as absent.
///
/// Used by rebuild, where the slot under reconstruction is attached (so
/// it can be written) but must not contribute to the XOR.
///
/// # Errors
///
/// Propagates the first slot read failure.
pub fn reconstruct_without(
    disks: &mut SlotTable,
    block_size: usize,
    device_block: u64,
    skip: usize,
) -> Result<Vec<u8>, DiskError> {
    reconstruct_skipping(disks, block_size, device_block, Some(skip))
}

fn reconstruct_skipping(
    disks: &mut SlotTable,
    block_size: usize,
    device_block: u64,
    skip: Option<usize>,
) -> Result<Vec<u8>, DiskError> {
    let offset = device_block * block_size as u64;
    let mut column = vec![0u8; block_size];
    let mut scratch = vec![0u8; block_size];

    for slot in 0..disks.slot_count() {
        if skip == Some(slot) || !disks.is_present(slot) {
            continue;
        }
        disks.read_at(slot, offset, &mut scratch)?;
        xor_into(&mut column, &scratch);
    }

    Ok(column)
}
