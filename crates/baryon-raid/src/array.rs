//! Array configuration and the transport-facing request surface.
//!
//! [`Array`] owns the slot table and the stripe geometry, both fixed at
//! startup, and exposes the four callbacks the block device transport
//! drives: [`read`](Array::read), [`write`](Array::write),
//! [`flush`](Array::flush), and [`disconnect`](Array::disconnect). The
//! mode is a plain enum dispatched per request; no function-pointer
//! tables sit in the data path.

use std::io;

use crate::disk::{Disk, SlotTable};
use crate::error::{ConfigError, RebuildError};
use crate::geometry::Geometry;
use crate::{raid0, raid4, rebuild};

/// Striping discipline of the array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Striping only, no redundancy. Exactly two data devices.
    Raid0,
    /// Striping over `N-1` data devices plus a dedicated parity device
    /// in the last slot. 3 to 16 devices.
    Raid4,
}

/// A running array: immutable configuration plus the backing slots.
#[derive(Debug)]
pub struct Array {
    mode: Mode,
    geometry: Geometry,
    disks: SlotTable,
    virtual_size: u64,
    rebuild_slot: Option<usize>,
}

impl Array {
    /// Validates the startup configuration and computes the exported size.
    ///
    /// `slots` is the device table in position order; `None` marks a slot
    /// absent. For RAID-4 the last slot is the parity device.
    /// `rebuild_slot` names a freshly re-added device to reconstruct via
    /// [`rebuild`](Array::rebuild) before serving requests.
    ///
    /// The exported size is the smallest present backing size, truncated
    /// to a whole number of blocks, times the number of data devices.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]; all of them are fatal at startup.
    pub fn new(
        mode: Mode,
        block_size: usize,
        slots: Vec<Option<Box<dyn Disk>>>,
        rebuild_slot: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }

        let disks = SlotTable::new(slots);
        let slot_count = disks.slot_count();
        let absent = disks.absent_count();

        match mode {
            Mode::Raid0 => {
                if slot_count != 2 {
                    return Err(ConfigError::DeviceCount {
                        got: slot_count,
                        expected: "exactly 2",
                    });
                }
                if absent > 0 {
                    return Err(ConfigError::DegradedRaid0);
                }
                if rebuild_slot.is_some() {
                    return Err(ConfigError::RebuildWithoutParity);
                }
            }
            Mode::Raid4 => {
                if !(3..=16).contains(&slot_count) {
                    return Err(ConfigError::DeviceCount {
                        got: slot_count,
                        expected: "3 to 16",
                    });
                }
                if absent > 1 {
                    return Err(ConfigError::InsufficientRedundancy { absent });
                }
                if let Some(slot) = rebuild_slot {
                    if slot >= slot_count {
                        return Err(ConfigError::BadRebuildSlot(slot));
                    }
                    if absent > 0 {
                        return Err(ConfigError::RebuildWhileDegraded);
                    }
                }
            }
        }

        let data_devices = match mode {
            Mode::Raid0 => slot_count,
            Mode::Raid4 => slot_count - 1,
        };

        let min_capacity = disks.min_capacity().unwrap_or(0);
        let device_size = min_capacity / block_size as u64 * block_size as u64;
        let virtual_size = device_size * data_devices as u64;
        if virtual_size == 0 {
            return Err(ConfigError::NoCapacity);
        }

        Ok(Self {
            mode,
            geometry: Geometry::new(block_size, data_devices),
            disks,
            virtual_size,
            rebuild_slot,
        })
    }

    /// Size of the exported virtual device in bytes.
    #[must_use]
    pub fn virtual_size(&self) -> u64 {
        self.virtual_size
    }

    /// Stripe unit in bytes.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.geometry.block_size()
    }

    /// Whether any slot is absent.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.disks.absent_count() > 0
    }

    /// The slot waiting for [`rebuild`](Array::rebuild), if any.
    #[must_use]
    pub fn rebuild_slot(&self) -> Option<usize> {
        self.rebuild_slot
    }

    /// Reconstructs the rebuild slot, if one was configured.
    ///
    /// Strictly synchronous; must finish before the transport starts.
    ///
    /// # Errors
    ///
    /// The first I/O failure, with the block index it happened at.
    pub fn rebuild(&mut self) -> Result<(), RebuildError> {
        if let Some(slot) = self.rebuild_slot {
            let device_blocks = self.device_blocks();
            rebuild::rebuild(
                &mut self.disks,
                self.geometry.block_size(),
                slot,
                device_blocks,
            )?;
        }
        Ok(())
    }

    /// Serves a read request.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the range leaves the virtual device; otherwise
    /// the first failed backing-device operation.
    pub fn read(&mut self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        self.check_range(buf.len(), offset)?;
        match self.mode {
            Mode::Raid0 => raid0::read(&self.geometry, &mut self.disks, offset, buf)?,
            Mode::Raid4 => raid4::read(&self.geometry, &mut self.disks, offset, buf)?,
        }
        Ok(())
    }

    /// Serves a write request.
    ///
    /// # Errors
    ///
    /// `InvalidInput` if the range leaves the virtual device; otherwise
    /// the first failed backing-device operation.
    pub fn write(&mut self, buf: &[u8], offset: u64) -> io::Result<()> {
        self.check_range(buf.len(), offset)?;
        match self.mode {
            Mode::Raid0 => raid0::write(&self.geometry, &mut self.disks, offset, buf)?,
            Mode::Raid4 => raid4::write(&self.geometry, &mut self.disks, offset, buf)?,
        }
        Ok(())
    }

    /// Flushes every present slot.
    ///
    /// All slots are attempted even when one fails; the first failure is
    /// returned so the transport can log it. The transport reports the
    /// flush as successful either way, and a failing device surfaces on
    /// the next read or write that touches it.
    ///
    /// # Errors
    ///
    /// The first per-slot flush failure, after attempting all slots.
    pub fn flush(&mut self) -> io::Result<()> {
        let mut first_err = None;
        for slot in 0..self.disks.slot_count() {
            if !self.disks.is_present(slot) {
                continue;
            }
            if let Err(err) = self.disks.flush(slot) {
                first_err.get_or_insert(io::Error::from(err));
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Serves a disconnect request. Backing devices stay open until the
    /// process exits.
    pub fn disconnect(&mut self) {}

    /// Per-device block count of the data region.
    fn device_blocks(&self) -> u64 {
        self.virtual_size / (self.geometry.block_size() * self.geometry.data_devices()) as u64
    }

    fn check_range(&self, len: usize, offset: u64) -> io::Result<()> {
        match offset.checked_add(len as u64) {
            Some(end) if end <= self.virtual_size => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "request outside the virtual device",
            )),
        }
    }
}
