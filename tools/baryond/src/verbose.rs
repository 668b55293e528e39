//! Per-request diagnostic output.
//!
//! Off by default; `-v` turns it on. Everything goes to stderr so the
//! stream mixes cleanly with the unconditional startup notices.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global verbose flag, set once at startup.
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Initialize the verbose flag for the current process.
pub fn init(verbose: bool) {
    VERBOSE.store(verbose, Ordering::Relaxed);
}

/// Returns `true` if verbose mode is active.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Print a message to stderr only when verbose mode is enabled.
///
/// Usage mirrors `eprintln!`:
/// ```ignore
/// vprintln!("R - {}, {}", offset, len);
/// ```
macro_rules! vprintln {
    ($($arg:tt)*) => {
        if $crate::verbose::is_verbose() {
            eprintln!($($arg)*);
        }
    };
}

pub(crate) use vprintln;
