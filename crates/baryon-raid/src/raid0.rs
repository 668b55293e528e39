//! Striping without parity.
//!
//! Every fragment goes straight to its data device. There is nothing to
//! reconstruct: startup rejects a RAID-0 array with an absent slot.

use crate::disk::SlotTable;
use crate::error::DiskError;
use crate::geometry::Geometry;

/// Reads `buf.len()` bytes at `offset`, one fragment at a time.
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
        disks.read_at(f.device, f.device_offset(block_size), &mut buf[f.buf.clone()])?;
    }
    Ok(())
}

/// Writes `buf` at `offset`, one fragment at a time.
///
/// # Errors
///
/// Propagates the first failed device write.
pub fn write(
    geometry: &Geometry,
    disks: &mut SlotTable,
    offset: u64,
    buf: &[u8],
) -> Result<(), DiskError> {
    let block_size = geometry.block_size();
    for f in geometry.fragments(offset, buf.len()) {
        disks.write_at(f.device, f.device_offset(block_size), &buf[f.buf.clone()])?;
    }
    Ok(())
}
