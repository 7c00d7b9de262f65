//! Cancellation tokens for scan and query operations.
//!
//! Every scan and every query gets its own independently owned flag: the
//! coordinator (§4.8) raises exactly one in-flight query's flag when it is
//! superseded, so the flag cannot be a single process-wide generation
//! counter the way a long-lived index manager's invalidation counter would
//! be. Instead a token is a cheap clone of a shared `AtomicBool`.
//!
//! ## Sparse checking
//!
//! For tight loops scanning millions of entries, `is_cancelled_sparse()`
//! only checks every 65,536 iterations to minimize atomic read overhead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How often long-running loops should check whether execution was cancelled.
/// Using a power of 2 allows efficient modulo via bitwise AND.
pub const CANCEL_CHECK_INTERVAL: usize = 0x10000; // 65,536

/// A cancellation token for terminating long-running operations.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

/// The half of a token pair that can actually raise cancellation.
///
/// Kept separate from `CancellationToken` so that workers which only ever
/// read the flag can't accidentally cancel the operation they're part of.
#[derive(Clone, Debug)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a fresh, uncancelled token paired with the handle that cancels it.
    pub fn new() -> (Self, CancellationHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        (
            Self { flag: flag.clone() },
            CancellationHandle { flag },
        )
    }

    /// Creates a token that can never be cancelled. Useful for tests and for
    /// one-off calls where no external cancellation is wired up.
    pub fn noop() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `Some(())` while uncancelled, `None` once cancelled. Written
    /// this way so call sites can use `token.is_cancelled()?;` as an early
    /// return.
    #[inline]
    pub fn is_cancelled(&self) -> Option<()> {
        if self.flag.load(Ordering::Relaxed) {
            None
        } else {
            Some(())
        }
    }

    /// Sparse cancellation check: only actually reads the flag every
    /// `CANCEL_CHECK_INTERVAL` calls, returning `Some(())` the rest of the
    /// time. `counter` should be a per-iteration running count.
    #[inline]
    pub fn is_cancelled_sparse(&self, counter: usize) -> Option<()> {
        if counter & (CANCEL_CHECK_INTERVAL - 1) == 0 {
            self.is_cancelled()
        } else {
            Some(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::noop()
    }
}

impl CancellationHandle {
    /// Raises the flag. Idempotent; safe to call from any thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
