//! Backing-device token parsing, opening, and sizing.
//!
//! A RAID-4 device token is a path, the literal `MISSING` for an absent
//! slot, or a path prefixed with `+` to re-add a replacement device and
//! rebuild it. Present devices are opened read-write and sized by seeking
//! to the end.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use baryon_raid::{Disk, FileDisk};

/// What one slot position was asked to hold.
#[derive(Debug, PartialEq, Eq)]
pub enum SlotSpec {
    /// An attached backing device.
    Present(PathBuf),
    /// The `MISSING` sentinel: run degraded.
    Absent,
    /// A `+`-prefixed replacement device to rebuild.
    Rebuild(PathBuf),
}

/// Parses RAID-4 device tokens into slot specs.
///
/// # Errors
///
/// Rejects more than one `+` token and any mix of `+` and `MISSING`.
pub fn parse_slots(tokens: &[String]) -> Result<Vec<SlotSpec>> {
    let mut specs = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token == "MISSING" {
            specs.push(SlotSpec::Absent);
        } else if let Some(path) = token.strip_prefix('+') {
            specs.push(SlotSpec::Rebuild(PathBuf::from(path)));
        } else {
            specs.push(SlotSpec::Present(PathBuf::from(token)));
        }
    }

    let rebuilds = specs
        .iter()
        .filter(|s| matches!(s, SlotSpec::Rebuild(_)))
        .count();
    if rebuilds > 1 {
        bail!("multiple '+' devices specified, only one device can be rebuilt at a time");
    }
    if rebuilds > 0 && specs.contains(&SlotSpec::Absent) {
        bail!("cannot rebuild from a missing device ('+' and MISSING are incompatible)");
    }

    Ok(specs)
}

/// Opens every present slot, logging each device's size and a notice for
/// each missing one.
///
/// Returns the slot table for [`baryon_raid::Array::new`] and the index
/// of the rebuild slot, if one was marked.
///
/// # Errors
///
/// The first open failure, with the offending path.
pub fn open_slots(specs: &[SlotSpec]) -> Result<(Vec<Option<Box<dyn Disk>>>, Option<usize>)> {
    let mut slots: Vec<Option<Box<dyn Disk>>> = Vec::with_capacity(specs.len());
    let mut rebuild_slot = None;

    for (index, spec) in specs.iter().enumerate() {
        match spec {
            SlotSpec::Absent => {
                eprintln!("DEGRADED: device number {index} is missing");
                slots.push(None);
            }
            SlotSpec::Present(path) => {
                slots.push(Some(Box::new(open_one(path)?)));
            }
            SlotSpec::Rebuild(path) => {
                rebuild_slot = Some(index);
                slots.push(Some(Box::new(open_one(path)?)));
            }
        }
    }

    Ok((slots, rebuild_slot))
}

fn open_one(path: &Path) -> Result<FileDisk> {
    let disk =
        FileDisk::open(path).with_context(|| format!("cannot open '{}'", path.display()))?;
    eprintln!(
        "Got device '{}', size {} bytes.",
        path.display(),
        disk.capacity()
    );
    Ok(disk)
}
