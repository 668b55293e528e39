//! Userspace RAID block device daemon.
//!
//! Exports a virtual block device over the Linux NBD interface, striped
//! across backing files or block devices: plain striping (`raid0`) or
//! striping with a dedicated parity device (`raid4`). RAID-4 arrays keep
//! serving with one device missing, and a replacement device can be
//! re-added with a `+` prefix to rebuild it synchronously before the
//! device comes up.
//!
//! Startup: parse arguments → open and size the backing devices →
//! validate the array → rebuild if requested → attach to the NBD device
//! and serve until disconnect.

mod cli;
mod devices;
mod nbd;
mod verbose;

use anyhow::{Context, Result};
use baryon_raid::{Array, Mode};
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::devices::SlotSpec;

fn main() -> Result<()> {
    let cli = Cli::parse();
    verbose::init(cli.verbose);

    let (mode, block_size, nbd_device, specs) = match cli.command {
        Command::Raid0(args) => (
            Mode::Raid0,
            args.block_size,
            args.nbd_device,
            vec![
                SlotSpec::Present(args.device1),
                SlotSpec::Present(args.device2),
            ],
        ),
        Command::Raid4(args) => (
            Mode::Raid4,
            args.block_size,
            args.nbd_device,
            devices::parse_slots(&args.devices)?,
        ),
    };

    let block_size = usize::try_from(block_size).context("block size does not fit in memory")?;
    let (slots, rebuild_slot) = devices::open_slots(&specs)?;
    let mut array =
        Array::new(mode, block_size, slots, rebuild_slot).context("invalid array configuration")?;

    if array.rebuild_slot().is_some() {
        eprintln!("Doing RAID rebuild...");
        array.rebuild().context("rebuild failed, aborting")?;
        eprintln!("Rebuild finished.");
    }
    eprintln!("RAID device resulting size: {}.", array.virtual_size());

    nbd::serve(&nbd_device, &mut array)
}
