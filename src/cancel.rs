//! Cooperative cancellation.
//!
//! The DP driver polls a [`CancellationToken`] every [`POLL_INTERVAL`] steps. This keeps the
//! core ignorant of whatever host environment drives it (a CLI, an embedding host, a test
//! harness): the host implements the trait however it needs to (an `AtomicBool`, a channel, a
//! callback into a foreign runtime) and the core only ever sees a boolean poll.

/// Number of observations processed between cancellation polls.
pub const POLL_INTERVAL: usize = 128;

/// A cooperative cancellation signal, polled by the solver every [`POLL_INTERVAL`] steps.
pub trait CancellationToken {
    /// Returns `true` if the caller has requested cancellation.
    fn is_cancelled(&self) -> bool;
}

/// A [`CancellationToken`] that never cancels, used when no host signal is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl CancellationToken for NeverCancel {
    #[inline]
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancellationToken for std::sync::atomic::AtomicBool {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl<F: Fn() -> bool> CancellationToken for F {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn never_cancel_is_never_cancelled() {
        assert!(!NeverCancel.is_cancelled());
    }

    #[test]
    fn atomic_bool_reflects_flag() {
        let flag = AtomicBool::new(false);
        assert!(!flag.is_cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(flag.is_cancelled());
    }

    #[test]
    fn closure_token_works() {
        let token = || true;
        assert!(token.is_cancelled());
    }
}
