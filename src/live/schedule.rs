use parking_lot::Mutex;

use crate::foundation::core::{Alignment, ArtworkRef, SwapIntent};

/// A swap that should be issued once the wall clock reaches `target_time_ms`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapFuture {
    /// Epoch ms at which the swap request is issued.
    pub target_time_ms: u64,
    /// Artwork to swap to.
    pub artwork: ArtworkRef,
    /// Epoch ms the artwork conceptually started playing, for wall-clock alignment.
    pub start_time_ms: Option<u64>,
    /// Explicit frame to start on.
    pub start_frame: Option<u32>,
    /// Report the outcome to the Live coordinator.
    pub is_live_mode_swap: bool,
    /// Issued by automation rather than a person.
    pub is_automated: bool,
}

impl SwapFuture {
    /// Alignment requested for the loaded artwork.
    pub fn alignment(&self) -> Alignment {
        Alignment {
            start_time_ms: self.start_time_ms,
            start_frame: self.start_frame,
        }
    }

    /// Intent reported to view tracking.
    pub fn intent(&self) -> SwapIntent {
        if self.is_automated {
            SwapIntent::Automated
        } else {
            SwapIntent::Intentional
        }
    }

    /// `true` once `now_ms` reached the target time.
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms >= self.target_time_ms
    }
}

/// Holds at most one pending [`SwapFuture`].
#[derive(Debug, Default)]
pub struct SwapSchedule {
    pending: Mutex<Option<SwapFuture>>,
}

impl SwapSchedule {
    /// Empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `future`, replacing and returning any pending one.
    pub fn schedule(&self, future: SwapFuture) -> Option<SwapFuture> {
        tracing::debug!(
            target_time_ms = future.target_time_ms,
            position = future.artwork.position,
            live = future.is_live_mode_swap,
            "swap scheduled"
        );
        self.pending.lock().replace(future)
    }

    /// Drop the pending swap, if any.
    pub fn cancel(&self) -> Option<SwapFuture> {
        self.pending.lock().take()
    }

    /// `true` while a swap is pending.
    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Copy of the pending swap.
    pub fn pending(&self) -> Option<SwapFuture> {
        self.pending.lock().clone()
    }

    /// Take the pending swap if it is due at `now_ms`.
    pub fn take_ready(&self, now_ms: u64) -> Option<SwapFuture> {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|f| f.is_due(now_ms)) {
            pending.take()
        } else {
            None
        }
    }

    /// Put back a swap whose request was rejected. A newer schedule wins.
    pub fn restore(&self, future: SwapFuture) {
        let mut pending = self.pending.lock();
        if pending.is_none() {
            *pending = Some(future);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/live/schedule.rs"]
mod tests;
