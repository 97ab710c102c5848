//! Shared helpers for the integration tests in this directory.

use std::sync::atomic::{AtomicU16, Ordering};

static NEXT_PORT: AtomicU16 = AtomicU16::new(18_000);

/// A likely-free TCP port, distinct from whatever the last call in this process
/// returned. Good enough for tests that run in their own thread per the default
/// test harness; not a substitute for a real ephemeral-port reservation.
pub fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}
