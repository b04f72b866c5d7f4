//! Cancellable auto-restore timer
//!
//! The coordinator owns at most one [`PendingRestore`]. Cancellation and
//! firing race on a single atomic, so exactly one of them can win: a
//! cancelled restore never fires and a fired restore never fires twice.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

/// Longest restore delay a [`PendingRestore`] will schedule
pub const MAX_RESTORE_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Shared cancellation token for one delayed action
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<AtomicU8>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// Request cancellation
    ///
    /// Returns false if the action already fired (or was already cancelled).
    pub fn cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    /// Claim the right to run the action
    ///
    /// Returns false if the action was cancelled or has already fired.
    pub fn try_fire(&self) -> bool {
        self.transition(FIRED)
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// The single in-flight "turn the display back on" action
#[derive(Debug, Clone)]
pub struct PendingRestore {
    /// Monotonic id (for logging)
    pub id: u64,
    /// Delay the restore was scheduled with
    pub delay: Duration,
    /// When the display should come back on
    pub deadline: Instant,
    /// Cancellation token checked at fire time
    pub token: CancelToken,
}

impl PendingRestore {
    /// Schedule a restore `delay` after `now` (zero delay is due immediately)
    ///
    /// Delays past what `Instant` can represent are capped at
    /// [`MAX_RESTORE_DELAY`].
    pub fn schedule(id: u64, now: Instant, delay: Duration) -> Self {
        let delay = delay.min(MAX_RESTORE_DELAY);
        // Only unrepresentable if the clock itself is near its limit
        let deadline = now.checked_add(delay).unwrap_or(now);
        Self {
            id,
            delay,
            deadline,
            token: CancelToken::new(),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Time left until the deadline (zero once due)
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }
}
