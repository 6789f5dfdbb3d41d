use crate::foundation::core::ContentId;
use crate::foundation::error::PlaybackError;
use crate::navigator::Navigator;

/// Frame seeking for synchronized playback.
pub mod align;
/// Swaps scheduled for a wall-clock time.
pub mod schedule;

pub use align::{AlignedFrame, LiveAligner};

/// External scheduler of synchronized (Live Mode) playback.
///
/// Only swaps flagged as Live Mode swaps are reported.
pub trait LiveCoordinator: Send + Sync {
    /// The back slot for catalog `position` was swapped in.
    fn notify_swap_succeeded(&self, position: usize);
    /// Loading or prefetching catalog `position` failed.
    fn notify_swap_failed(&self, position: usize);
    /// Decide how to continue after a failed Live Mode swap.
    fn recover_from_failed_swap(
        &self,
        navigator: &dyn Navigator,
        position: usize,
        error: &PlaybackError,
    );
}

/// Receives a record each time vault content starts being shown.
pub trait ViewTracker: Send + Sync {
    /// `content` is now on screen. `intentional` is `false` for automated advances.
    fn record_view(&self, content: &ContentId, intentional: bool);
}
