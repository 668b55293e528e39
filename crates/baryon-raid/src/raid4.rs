//! Striping with a dedicated parity device.
//!
//! The last slot holds, for each in-device block index, the XOR of the
//! data blocks at that index. Reads from an absent data slot fall back to
//! reconstruction; every write keeps the parity invariant, including the
//! degraded cases where the write target or the parity slot itself is the
//! missing device.
//!
//! Each fragment is processed to completion before the next starts; there
//! is no cross-fragment batching of parity updates.

use crate::disk::SlotTable;
use crate::error::DiskError;
use crate::geometry::{Fragment, Geometry};
use crate::parity;

/// Reads `buf.len()` bytes at `offset`.
///
/// Fragments on a present slot are read directly. Fragments on an absent
/// data slot are reconstructed from the XOR of all surviving slots. An
/// absent parity slot never affects reads.
///
/// # Errors
///
/// Propagates the first failed device read.
pub fn read(
    geometry: &Geometry,
    disks: &mut SlotTable,
    offset: u64,
    buf: &mut [u8],
) -> Result<(), DiskError> {
    let block_size = geometry.block_size();
    for f in geometry.fragments(offset, buf.len()) {
        if disks.is_present(f.device) {
            disks.read_at(f.device, f.device_offset(block_size), &mut buf[f.buf.clone()])?;
        } else {
            let column = parity::reconstruct(disks, block_size, f.device_block)?;
            buf[f.buf.clone()]
                .copy_from_slice(&column[f.offset_in_block..f.offset_in_block + f.len]);
        }
    }
    Ok(())
}

/// Writes `buf` at `offset`, maintaining the parity invariant.
///
/// Per fragment, one of three paths applies:
/// - target and parity both present: read-modify-write (also covers the
///   case where some *other* data slot is absent);
/// - target absent: only parity changes, so that reconstruction returns
///   the logically written data;
/// - parity absent: plain write to the target, nothing else to update.
///
/// Startup validation guarantees at most one slot is absent.
///
/// # Errors
///
/// Propagates the first failed device read or write.
pub fn write(
    geometry: &Geometry,
    disks: &mut SlotTable,
    offset: u64,
    buf: &[u8],
) -> Result<(), DiskError> {
    let block_size = geometry.block_size();
    let parity_slot = disks.slot_count() - 1;

    for f in geometry.fragments(offset, buf.len()) {
        let payload = &buf[f.buf.clone()];
        if !disks.is_present(f.device) {
            write_absent_target(disks, block_size, parity_slot, &f, payload)?;
        } else if !disks.is_present(parity_slot) {
            disks.write_at(f.device, f.device_offset(block_size), payload)?;
        } else {
            write_through(disks, block_size, parity_slot, &f, payload)?;
        }
    }
    Ok(())
}

/// Read-modify-write of one fragment: capture the old data and parity
/// blocks, write the payload, re-read the block, fold old and new into
/// the parity block, write it back. The parity write is last; both writes
/// complete before the fragment is done.
fn write_through(
    disks: &mut SlotTable,
    block_size: usize,
    parity_slot: usize,
    f: &Fragment,
    payload: &[u8],
) -> Result<(), DiskError> {
    let block_offset = f.device_block * block_size as u64;

    let mut old_data = vec![0u8; block_size];
    let mut parity_block = vec![0u8; block_size];
    disks.read_at(f.device, block_offset, &mut old_data)?;
    disks.read_at(parity_slot, block_offset, &mut parity_block)?;

    disks.write_at(f.device, f.device_offset(block_size), payload)?;

    let mut new_data = vec![0u8; block_size];
    disks.read_at(f.device, block_offset, &mut new_data)?;

    parity::update_parity(&mut parity_block, &old_data, &new_data);
    disks.write_at(parity_slot, block_offset, &parity_block)?;
    Ok(())
}

/// The write target is the missing slot: the payload cannot be persisted,
/// so fold the logical change into the parity block instead. A subsequent
/// reconstruction of this block then returns the written data.
fn write_absent_target(
    disks: &mut SlotTable,
    block_size: usize,
    parity_slot: usize,
    f: &Fragment,
    payload: &[u8],
) -> Result<(), DiskError> {
    let block_offset = f.device_block * block_size as u64;

    let old_logical = parity::reconstruct(disks, block_size, f.device_block)?;
    let mut new_logical = old_logical.clone();
    new_logical[f.offset_in_block..f.offset_in_block + f.len].copy_from_slice(payload);

    let mut parity_block = vec![0u8; block_size];
    disks.read_at(parity_slot, block_offset, &mut parity_block)?;
    parity::update_parity(&mut parity_block, &old_logical, &new_logical);
    disks.write_at(parity_slot, block_offset, &parity_block)?;
    Ok(())
}
