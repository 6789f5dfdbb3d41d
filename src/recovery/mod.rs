use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::foundation::clock::Clock;
use crate::foundation::core::ArtworkRef;
use crate::foundation::error::PlaybackError;
use crate::storage::Storage;

/// Per-position health flags.
pub mod health;

use health::HealthRegistry;

/// Minimum spacing between two corrupt-file deletions.
pub const DELETION_COOLDOWN: Duration = Duration::from_secs(60 * 60);

/// Gate on destructive deletions: at most one per window.
#[derive(Clone, Copy, Debug)]
pub struct DeletionCooldown {
    window: Duration,
    last: Option<Instant>,
}

impl Default for DeletionCooldown {
    fn default() -> Self {
        Self::new(DELETION_COOLDOWN)
    }
}

impl DeletionCooldown {
    /// Cooldown with a custom window.
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Whether a deletion at `now` would be allowed.
    pub fn allows(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.window,
        }
    }

    /// Consume the allowance if available. Returns `true` when the caller may delete.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if !self.allows(now) {
            return false;
        }
        self.last = Some(now);
        true
    }
}

/// Allows one automatic retry after a failure, but only if the attempt before it succeeded.
#[derive(Clone, Copy, Debug)]
pub struct RetryBudget {
    previous_succeeded: bool,
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self {
            previous_succeeded: true,
        }
    }
}

impl RetryBudget {
    /// Record a successful swap. Re-arms the retry.
    pub fn record_success(&mut self) {
        self.previous_succeeded = true;
    }

    /// Record a failed swap. Returns `true` if an automatic retry is allowed.
    pub fn record_failure(&mut self) -> bool {
        std::mem::replace(&mut self.previous_succeeded, false)
    }

    /// `true` when the next failure would be retried.
    pub fn armed(&self) -> bool {
        self.previous_succeeded
    }
}

/// What to do after a failed load or prefetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveryAction {
    /// The file is not downloaded yet. Advance past it.
    Advance,
    /// Leave the current artwork on screen.
    Skip,
    /// The file was deleted so it can be fetched again, then skipped.
    DeleteAndSkip,
}

/// Outcome of [`RecoverySupervisor::on_failure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryDecision {
    /// Primary action.
    pub action: RecoveryAction,
    /// Advance and load again once.
    pub retry: bool,
}

#[derive(Debug, Default)]
struct SupervisorState {
    cooldown: DeletionCooldown,
    retry: RetryBudget,
    deletions: u64,
}

/// Failure policy for the loader: health marking, cooldown-gated deletion and bounded retry.
pub struct RecoverySupervisor {
    storage: Arc<dyn Storage>,
    health: Arc<HealthRegistry>,
    clock: Arc<dyn Clock>,
    state: Mutex<SupervisorState>,
}

impl RecoverySupervisor {
    /// Supervisor deleting through `storage` and marking `health`.
    pub fn new(
        storage: Arc<dyn Storage>,
        health: Arc<HealthRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            health,
            clock,
            state: Mutex::new(SupervisorState::default()),
        }
    }

    /// Health registry shared with the navigator.
    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    /// Number of files deleted so far.
    pub fn deletions(&self) -> u64 {
        self.state.lock().deletions
    }

    /// `true` when the next failure would be retried.
    pub fn retry_armed(&self) -> bool {
        self.state.lock().retry.armed()
    }

    /// A swap to `artwork` landed on the panel.
    pub fn on_success(&self, artwork: &ArtworkRef) {
        self.health.mark(artwork.position, true);
        self.state.lock().retry.record_success();
    }

    /// Decide how to recover from `err` while loading `artwork`.
    ///
    /// A missing vault file only advances: no health change, no deletion, and the retry history
    /// is left alone. Only decode failures of vault files are deleted; a file that is merely too
    /// large is marked unhealthy and kept.
    #[tracing::instrument(
        skip(self, artwork),
        fields(position = artwork.position, path = %artwork.path.display())
    )]
    pub fn on_failure(&self, artwork: &ArtworkRef, err: &PlaybackError) -> RecoveryDecision {
        if matches!(err, PlaybackError::FileMissing(_)) && artwork.is_vault() {
            tracing::info!("file not downloaded yet, advancing");
            return RecoveryDecision {
                action: RecoveryAction::Advance,
                retry: false,
            };
        }

        if err.marks_unhealthy() {
            self.health.mark(artwork.position, false);
        }
        tracing::error!(error = %err, "load failed");

        let mut state = self.state.lock();
        let mut action = RecoveryAction::Skip;
        if matches!(err, PlaybackError::DecodeFailure(_))
            && artwork.is_vault()
            && self.storage.exists(&artwork.path)
        {
            if state.cooldown.try_acquire(self.clock.now()) {
                match self.storage.delete(&artwork.path) {
                    Ok(()) => {
                        state.deletions += 1;
                        action = RecoveryAction::DeleteAndSkip;
                        tracing::warn!("deleted corrupt file so it can be downloaded again");
                    }
                    Err(e) => tracing::error!(error = %e, "failed to delete corrupt file"),
                }
            } else {
                tracing::warn!("corrupt file kept, deletion cooldown active");
            }
        }

        let retry = state.retry.record_failure();
        if !retry {
            tracing::warn!("consecutive failures, auto-retry disabled until a swap succeeds");
        }
        RecoveryDecision { action, retry }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recovery/mod.rs"]
mod tests;
