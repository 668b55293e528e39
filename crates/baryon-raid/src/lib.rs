//! Block-address translation and parity maintenance for striped arrays.
//!
//! This crate is the core of a userspace RAID daemon. It maps byte-granular
//! requests on a virtual block device onto `(device, offset, length)`
//! operations against a table of backing stores, striped RAID-0 style or
//! protected by a dedicated XOR parity device RAID-4 style, and keeps the
//! parity invariant through degraded operation and synchronous rebuild.
//!
//! The transport that feeds requests in (kernel socket glue, argument
//! parsing, logging) lives outside this crate; it drives an [`Array`]
//! through its four callbacks and nothing else.

pub mod array;
pub mod disk;
pub mod error;
pub mod geometry;
pub mod parity;
pub mod raid0;
pub mod raid4;
pub mod rebuild;

pub use array::{Array, Mode};
pub use disk::{Disk, FileDisk, MemDisk, SlotTable};
pub use error::{ConfigError, DiskError, RebuildError};
