//! Process-wide interrupt coordination.
//! The ctrlc handler records the request here; the front end checks it before committing.
//!
//! Notes:
//! - `request()` is safe to call from signal handlers.
//! - The run moves through phases: reading input, then writing a sink. The handler may
//!   only exit on the spot while input is still being read. Both sides move the phase
//!   with a compare-exchange, so exactly one of "exit now" and "open a sink" wins.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);
static PHASE: AtomicU8 = AtomicU8::new(READING);

const READING: u8 = 0;
const SINK_OPEN: u8 = 1;
const EXITING: u8 = 2;

/// Exit status for a process stopped by SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Request a cooperative shutdown (idempotent).
#[inline]
pub fn request() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Check whether a shutdown has been requested.
#[inline]
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Handler side: true if nothing has been created yet and the process may exit now.
/// Once this returns true, `enter_sink_phase` will refuse.
pub fn claim_immediate_exit() -> bool {
    PHASE
        .compare_exchange(READING, EXITING, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

/// Main side: announce that a sink is about to be opened.
/// Returns false if the interrupt handler already claimed the exit.
pub fn enter_sink_phase() -> bool {
    PHASE
        .compare_exchange(READING, SINK_OPEN, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

#[cfg(test)]
pub(crate) fn reset() {
    SHUTDOWN.store(false, Ordering::Relaxed);
    PHASE.store(READING, Ordering::Relaxed);
}
