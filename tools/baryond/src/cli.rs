//! Command-line interface definitions for baryond.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Userspace RAID block device daemon.
#[derive(Parser)]
#[command(name = "baryond", version, about)]
pub struct Cli {
    /// Array mode to export.
    #[command(subcommand)]
    pub command: Command,

    /// Enable per-request diagnostic output.
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Available array modes.
#[derive(Subcommand)]
pub enum Command {
    /// Export two devices striped without redundancy.
    Raid0(Raid0Args),
    /// Export striped devices with a dedicated parity device.
    Raid4(Raid4Args),
}

/// Arguments for the `raid0` subcommand.
#[derive(Args)]
pub struct Raid0Args {
    /// Stripe unit in bytes.
    pub block_size: u64,

    /// NBD device node to attach, for example /dev/nbd0.
    pub nbd_device: PathBuf,

    /// First backing device or file.
    pub device1: PathBuf,

    /// Second backing device or file.
    pub device2: PathBuf,
}

/// Arguments for the `raid4` subcommand.
#[derive(Args)]
pub struct Raid4Args {
    /// Stripe unit in bytes.
    pub block_size: u64,

    /// NBD device node to attach, for example /dev/nbd0.
    pub nbd_device: PathBuf,

    /// Backing devices or files; the last one is the parity device.
    /// `MISSING` marks a slot absent (degraded mode); a leading `+`
    /// re-adds a replacement device and rebuilds it before serving.
    #[arg(num_args = 3..=16, required = true)]
    pub devices: Vec<String>,
}
