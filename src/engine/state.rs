use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam::channel::{Sender, TrySendError};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::codec::CodecFactory;
use crate::config::{PlaybackConfig, RuntimeSettings};
use crate::display::{Display, FrameSource};
use crate::foundation::clock::Clock;
use crate::foundation::core::{Alignment, ArtworkRef, SwapIntent};
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::live::schedule::SwapSchedule;
use crate::live::{LiveCoordinator, ViewTracker};
use crate::navigator::Navigator;
use crate::overlay::SwapNotice;
use crate::recovery::RecoverySupervisor;
use crate::slot::BufferSlot;
use crate::storage::Storage;
use crate::upscale::UpscaleWorkerPool;

pub(crate) const FRONT: usize = 0;
pub(crate) const BACK: usize = 1;

/// Why the loader was woken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Wake {
    /// A swap request was accepted.
    Load,
    /// Leaving UI mode: load even though UI mode was active when the request was made.
    Resume,
}

/// Cursor movement applied once a swap request is accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NavMove {
    Stay,
    Next,
    Previous,
    To(usize),
}

/// One accepted swap, consumed by the loader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LoadRequest {
    /// Load this artwork instead of the navigator's current one.
    pub(crate) artwork: Option<ArtworkRef>,
    pub(crate) alignment: Alignment,
    pub(crate) is_live_swap: bool,
    pub(crate) intent: SwapIntent,
    pub(crate) wake: Wake,
}

impl LoadRequest {
    pub(crate) fn navigator(intent: SwapIntent) -> Self {
        Self {
            artwork: None,
            alignment: Alignment::NONE,
            is_live_swap: false,
            intent,
            wake: Wake::Load,
        }
    }
}

/// Every flag the loader, presenter and control surface coordinate on. Guarded by one mutex.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    /// `[front, back]`. A swap exchanges the two entries.
    pub(crate) slots: [BufferSlot; 2],
    pub(crate) swap_requested: bool,
    pub(crate) loader_busy: bool,
    pub(crate) pending: Option<LoadRequest>,
    pub(crate) paused: bool,
    pub(crate) ui_mode: bool,
    pub(crate) next_token: u64,
    /// Progress notice raised by intentional requests.
    pub(crate) notice: SwapNotice,
}

impl EngineState {
    pub(crate) fn front(&self) -> &BufferSlot {
        &self.slots[FRONT]
    }

    pub(crate) fn back(&self) -> &BufferSlot {
        &self.slots[BACK]
    }

    pub(crate) fn back_mut(&mut self) -> &mut BufferSlot {
        &mut self.slots[BACK]
    }

    /// A new request may only start when nothing is in flight.
    pub(crate) fn busy_reason(&self) -> Option<&'static str> {
        if self.swap_requested {
            Some("a swap is already requested")
        } else if self.loader_busy {
            Some("the loader is busy")
        } else if self.back().prefetch_pending() || self.back().prefetch_in_progress() {
            Some("the back slot is being prefetched")
        } else {
            None
        }
    }

    pub(crate) fn take_token(&mut self) -> u64 {
        self.next_token = self.next_token.wrapping_add(1);
        self.next_token
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) frames_presented: AtomicU64,
    pub(crate) swaps: AtomicU64,
    pub(crate) failed_loads: AtomicU64,
    pub(crate) rejected_requests: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// State and collaborators shared by the engine handle, the loader and the presenter.
pub(crate) struct EngineShared {
    pub(crate) config: PlaybackConfig,
    pub(crate) settings: RuntimeSettings,
    pub(crate) state: Mutex<EngineState>,
    /// Signalled whenever `loader_busy` drops.
    pub(crate) idle: Condvar,
    pub(crate) wake_tx: Sender<Wake>,
    pub(crate) shutdown: AtomicBool,

    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) codecs: Arc<dyn CodecFactory>,
    pub(crate) display: Arc<dyn Display>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pool: UpscaleWorkerPool,
    pub(crate) recovery: RecoverySupervisor,
    pub(crate) live: Option<Arc<dyn LiveCoordinator>>,
    pub(crate) views: Option<Arc<dyn ViewTracker>>,
    pub(crate) ui_source: Option<Arc<dyn FrameSource>>,
    pub(crate) schedule: SwapSchedule,
    pub(crate) counters: Counters,
}

impl EngineShared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock()
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Accept or reject a swap request. Never blocks on loader or presenter work.
    ///
    /// The navigator is only moved once the request is accepted, so a rejected request leaves
    /// the cursor where it was.
    pub(crate) fn request_swap(&self, request: LoadRequest, nav: NavMove) -> PlaybackResult<()> {
        if let NavMove::To(position) = nav
            && position >= self.navigator.len()
        {
            return Err(PlaybackError::validation(format!(
                "position {position} is outside a catalog of {}",
                self.navigator.len()
            )));
        }

        let wake = request.wake;
        {
            let mut st = self.lock();
            if let Some(reason) = st.busy_reason() {
                Counters::bump(&self.counters.rejected_requests);
                tracing::debug!(reason, "swap request rejected");
                return Err(PlaybackError::swap_conflict(reason));
            }
            st.swap_requested = true;
            st.loader_busy = true;
            if request.intent == SwapIntent::Intentional {
                st.notice.start(self.clock.now());
            }
            st.pending = Some(request);
        }

        let moved = match nav {
            NavMove::Stay => Ok(()),
            NavMove::Next => {
                self.navigator.advance();
                Ok(())
            }
            NavMove::Previous => {
                self.navigator.go_back();
                Ok(())
            }
            NavMove::To(position) => self.navigator.jump_to(position),
        };
        if let Err(e) = moved {
            self.discard_request();
            return Err(e);
        }

        self.wake_loader(wake);
        Ok(())
    }

    pub(crate) fn wake_loader(&self, wake: Wake) {
        match self.wake_tx.try_send(wake) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("loader is gone, dropping wake");
                self.discard_request();
            }
        }
    }

    /// Withdraw the in-flight request and tear down the back slot.
    pub(crate) fn discard_request(&self) {
        let mut st = self.lock();
        let had_request = st.swap_requested;
        st.swap_requested = false;
        st.loader_busy = false;
        st.pending = None;
        if had_request {
            st.notice.fail(self.clock.now());
        }
        if let Err(e) = st.back_mut().try_unload() {
            tracing::warn!(error = %e, "back slot kept while its prefetch finishes");
        }
        drop(st);
        self.idle.notify_all();
        if had_request {
            tracing::debug!("swap request discarded");
        }
    }

    /// Mark the loader idle and wake waiters.
    pub(crate) fn loader_done(&self, st: &mut EngineState) {
        st.loader_busy = false;
        self.idle.notify_all();
    }

    /// Block until the loader is idle or `timeout` elapses. Returns `true` when idle.
    pub(crate) fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut st = self.lock();
        while st.loader_busy {
            if self.idle.wait_until(&mut st, deadline).timed_out() {
                return !st.loader_busy;
            }
        }
        true
    }

    /// Wait (bounded) for a concurrent prefetch of the back slot, then clear it.
    pub(crate) fn clear_back_slot<'a>(
        &'a self,
        mut st: MutexGuard<'a, EngineState>,
    ) -> PlaybackResult<MutexGuard<'a, EngineState>> {
        let deadline = Instant::now() + Duration::from_millis(self.config.unload_wait_timeout_ms);
        while st.back().prefetch_in_progress() {
            if self.idle.wait_until(&mut st, deadline).timed_out() {
                break;
            }
        }
        st.back_mut().try_unload()?;
        Ok(st)
    }
}
