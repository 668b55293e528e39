//! Error types for slot I/O, array configuration, and rebuild.

use std::fmt;
use std::io;

/// Errors from positional I/O against one backing slot.
#[derive(Debug)]
pub enum DiskError {
    /// The slot has no backing device attached.
    Absent,
    /// The OS reported a failure, including short reads and short writes.
    Io(io::Error),
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("backing device absent"),
            Self::Io(err) => write!(f, "backing device I/O failed: {err}"),
        }
    }
}

impl std::error::Error for DiskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Absent => None,
            Self::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for DiskError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<DiskError> for io::Error {
    fn from(err: DiskError) -> Self {
        match err {
            DiskError::Absent => io::Error::new(io::ErrorKind::NotConnected, "backing device absent"),
            DiskError::Io(err) => err,
        }
    }
}

/// Startup validation failures. All of these are fatal before the transport
/// is attached.
#[derive(Debug)]
pub enum ConfigError {
    /// The stripe unit was zero.
    ZeroBlockSize,
    /// The slot count is outside the range the mode supports.
    DeviceCount {
        /// Slots the caller supplied.
        got: usize,
        /// Human-readable range the mode accepts.
        expected: &'static str,
    },
    /// RAID-0 has no redundancy and cannot start with an absent slot.
    DegradedRaid0,
    /// More than one slot is absent; the array cannot serve requests.
    InsufficientRedundancy {
        /// Number of absent slots.
        absent: usize,
    },
    /// A rebuild was requested while a slot is absent.
    RebuildWhileDegraded,
    /// A rebuild was requested for a mode without parity.
    RebuildWithoutParity,
    /// The rebuild slot index does not name a slot.
    BadRebuildSlot(usize),
    /// The smallest backing device holds less than one stripe unit.
    NoCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroBlockSize => f.write_str("block size must be positive"),
            Self::DeviceCount { got, expected } => {
                write!(f, "unsupported device count {got} (expected {expected})")
            }
            Self::DegradedRaid0 => f.write_str("RAID-0 cannot start with a missing device"),
            Self::InsufficientRedundancy { absent } => {
                write!(f, "{absent} devices missing, at most one can be reconstructed")
            }
            Self::RebuildWhileDegraded => {
                f.write_str("cannot rebuild while another device is missing")
            }
            Self::RebuildWithoutParity => f.write_str("RAID-0 cannot rebuild a device"),
            Self::BadRebuildSlot(slot) => write!(f, "rebuild slot {slot} does not exist"),
            Self::NoCapacity => f.write_str("backing devices are smaller than one block"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A read or write failed while reconstructing a device.
///
/// Fatal at startup; the partially rebuilt slot is left as-is and not reused.
#[derive(Debug)]
pub struct RebuildError {
    /// In-device block index at which the rebuild stopped.
    pub block: u64,
    /// The underlying slot I/O failure.
    pub source: DiskError,
}

impl fmt::Display for RebuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rebuild failed at block {}: {}", self.block, self.source)
    }
}

impl std::error::Error for RebuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
