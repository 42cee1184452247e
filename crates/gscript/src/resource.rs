//! Cooperative cancellation and call-stack depth limiting.
//!
//! The VM has no preemptive scheduler: a running program can only be
//! interrupted between instructions, so every instruction dispatch polls
//! a `Cancellation` handle and every `Call` checks a recursion bound.
//! Hosts that never need either pay nothing for them, since
//! `NoCancellation`/`DEFAULT_MAX_RECURSION_DEPTH` compile down to a
//! single always-false branch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default cap on the VM's call stack. Chosen so a runaway recursive
/// script fails with a typed [`crate::error::RuntimeError::StackOverflow`]
/// well before it could exhaust the host's real stack.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1024;

/// Polled by the VM between instructions to decide whether a running
/// program should unwind early.
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;
}

/// The default, zero-overhead cancellation source: never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCancellation;

impl Cancellation for NoCancellation {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// A cancellation flag a host can flip from another thread, e.g. a
/// timer thread backing the CLI's `--timelimit` flag.
#[derive(Debug, Clone, Default)]
pub struct AtomicCancellation(Arc<AtomicBool>);

impl AtomicCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl Cancellation for AtomicCancellation {
    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_cancellation_is_observed_after_cancel() {
        let c = AtomicCancellation::new();
        assert!(!c.is_cancelled());
        c.cancel();
        assert!(c.is_cancelled());
    }

    #[test]
    fn cloned_handle_shares_the_same_flag() {
        let c = AtomicCancellation::new();
        let clone = c.clone();
        clone.cancel();
        assert!(c.is_cancelled());
    }
}
