//! First-RTS arbitration
//!
//! While a DATA frame is on air, at most one station in the whole network
//! may dispatch a preemptive RTS. Every station holds a handle to the same
//! [`RtsArbiter`]; the winner releases it when the on-air frame ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "first RTS wins" token
#[derive(Debug)]
pub struct RtsArbiter {
    available: AtomicBool,
}

impl RtsArbiter {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    /// Convenience constructor for the shared handle stations are built with
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Claim the token. Returns false if another station already holds it.
    pub fn try_claim(&self) -> bool {
        self.available
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Hand the token back
    pub fn release(&self) {
        self.available.store(true, Ordering::Release);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

impl Default for RtsArbiter {
    fn default() -> Self {
        Self::new()
    }
}
