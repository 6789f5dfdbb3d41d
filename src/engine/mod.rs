use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use parking_lot::{Condvar, Mutex};

use crate::codec::{CodecFactory, ImageCodecFactory};
use crate::config::{PlaybackConfig, RuntimeSettings};
use crate::display::{Display, FrameSource};
use crate::foundation::clock::{Clock, SystemClock};
use crate::foundation::core::{Rgb8, Rotation, SwapIntent};
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::foundation::threads::{ThreadRole, spawn_pinned};
use crate::live::schedule::{SwapFuture, SwapSchedule};
use crate::live::{LiveCoordinator, ViewTracker};
use crate::loader::Loader;
use crate::navigator::Navigator;
use crate::presenter::Presenter;
use crate::recovery::RecoverySupervisor;
use crate::recovery::health::HealthRegistry;
use crate::slot::SlotPhase;
use crate::storage::{FsStorage, Storage};
use crate::upscale::{UpscalePoolOpts, UpscaleWorkerPool};

pub(crate) mod state;

use state::{Counters, EngineShared, EngineState, LoadRequest, NavMove, Wake};

/// Counters accumulated since the engine started.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Frames handed to the display.
    pub frames_presented: u64,
    /// Front/back exchanges.
    pub swaps: u64,
    /// Load or prefetch attempts that failed.
    pub failed_loads: u64,
    /// Swap requests rejected because another one was in flight.
    pub rejected_requests: u64,
    /// Upscale joins that gave up waiting.
    pub upscale_timeouts: u64,
    /// Corrupt files deleted.
    pub deletions: u64,
}

/// Point-in-time view of the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineStatus {
    /// Phase of the front slot.
    pub front: SlotPhase,
    /// Phase of the back slot.
    pub back: SlotPhase,
    /// Catalog position shown by the front slot.
    pub front_position: Option<usize>,
    /// Catalog position loaded into the back slot.
    pub back_position: Option<usize>,
    /// A swap is waiting for the back slot.
    pub swap_requested: bool,
    /// A load or prefetch cycle is in flight.
    pub loader_busy: bool,
    /// A scheduled swap has not been issued yet.
    pub scheduled_swap: bool,
    /// Playback is paused.
    pub paused: bool,
    /// The UI frame source is shown instead of artwork.
    pub ui_mode: bool,
    /// Counters.
    pub stats: PlaybackStats,
}

/// Assembles a [`PlaybackEngine`] from its collaborators.
pub struct EngineBuilder {
    config: PlaybackConfig,
    navigator: Arc<dyn Navigator>,
    display: Arc<dyn Display>,
    storage: Arc<dyn Storage>,
    codecs: Arc<dyn CodecFactory>,
    clock: Arc<dyn Clock>,
    health: Option<Arc<HealthRegistry>>,
    live: Option<Arc<dyn LiveCoordinator>>,
    views: Option<Arc<dyn ViewTracker>>,
    ui_source: Option<Arc<dyn FrameSource>>,
}

impl EngineBuilder {
    /// Builder with filesystem storage, the `image` codecs and the system clock.
    pub fn new(
        config: PlaybackConfig,
        navigator: Arc<dyn Navigator>,
        display: Arc<dyn Display>,
    ) -> Self {
        Self {
            config,
            navigator,
            display,
            storage: Arc::new(FsStorage),
            codecs: Arc::new(ImageCodecFactory),
            clock: Arc::new(SystemClock),
            health: None,
            live: None,
            views: None,
            ui_source: None,
        }
    }

    /// Read assets through `storage`.
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    /// Open assets through `codecs`.
    pub fn codecs(mut self, codecs: Arc<dyn CodecFactory>) -> Self {
        self.codecs = codecs;
        self
    }

    /// Use `clock` for pacing, cooldowns and alignment.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Mark failures in `health`.
    ///
    /// Only needed for navigators that keep no registry of their own. When the navigator reports
    /// one through [`Navigator::health`], that registry is used and a different one is rejected
    /// by [`EngineBuilder::build`].
    pub fn health(mut self, health: Arc<HealthRegistry>) -> Self {
        self.health = Some(health);
        self
    }

    /// Report Live Mode swaps to `live`.
    pub fn live_coordinator(mut self, live: Arc<dyn LiveCoordinator>) -> Self {
        self.live = Some(live);
        self
    }

    /// Record views of vault content with `views`.
    pub fn view_tracker(mut self, views: Arc<dyn ViewTracker>) -> Self {
        self.views = Some(views);
        self
    }

    /// Draw `source` while in UI mode.
    pub fn ui_source(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.ui_source = Some(source);
        self
    }

    /// Build the shared state without starting any threads.
    pub(crate) fn build_shared(self) -> PlaybackResult<(Arc<EngineShared>, Receiver<Wake>)> {
        self.config.validate()?;
        if self.display.size() != self.config.panel {
            return Err(PlaybackError::config(format!(
                "display is {}x{} but the configured panel is {}x{}",
                self.display.size().width,
                self.display.size().height,
                self.config.panel.width,
                self.config.panel.height
            )));
        }

        let health = match (self.health, self.navigator.health()) {
            (Some(given), Some(own)) if !Arc::ptr_eq(&given, &own) => {
                return Err(PlaybackError::config(
                    "health registry differs from the one the navigator skips with",
                ));
            }
            (Some(given), _) => given,
            (None, Some(own)) => own,
            (None, None) => Arc::new(HealthRegistry::new(self.navigator.len())),
        };
        if health.len() < self.navigator.len() {
            health.resize(self.navigator.len());
        }
        let pool = UpscaleWorkerPool::new(UpscalePoolOpts {
            join_timeout: self.config.join_timeout(),
            cores: self.config.worker_cores,
        })?;
        let recovery = RecoverySupervisor::new(
            Arc::clone(&self.storage),
            health,
            Arc::clone(&self.clock),
        );
        let (wake_tx, wake_rx) = channel::bounded(1);

        let shared = Arc::new(EngineShared {
            settings: RuntimeSettings::from_config(&self.config),
            config: self.config,
            state: Mutex::new(EngineState::default()),
            idle: Condvar::new(),
            wake_tx,
            shutdown: AtomicBool::new(false),
            navigator: self.navigator,
            storage: self.storage,
            codecs: self.codecs,
            display: self.display,
            clock: self.clock,
            pool,
            recovery,
            live: self.live,
            views: self.views,
            ui_source: self.ui_source,
            schedule: SwapSchedule::new(),
            counters: Counters::default(),
        });
        Ok((shared, wake_rx))
    }

    /// Start the loader and presenter threads.
    ///
    /// Nothing is shown until the first swap request, usually
    /// [`PlaybackEngine::request_swap_current`].
    pub fn build(self) -> PlaybackResult<PlaybackEngine> {
        let (shared, wake_rx) = self.build_shared()?;

        let loader = Loader::new(Arc::clone(&shared), wake_rx);
        let loader_handle =
            spawn_pinned("p3a-loader", ThreadRole::Loader, None, move || loader.run())?;

        let presenter = Presenter::new(Arc::clone(&shared));
        let presenter_core = shared.config.presenter_core;
        let spawned = spawn_pinned(
            "p3a-presenter",
            ThreadRole::Presenter,
            presenter_core,
            move || presenter.run(),
        );
        let presenter_handle = match spawned {
            Ok(h) => h,
            Err(e) => {
                stop_loader(&shared);
                if loader_handle.join().is_err() {
                    tracing::error!("loader thread panicked");
                }
                return Err(e);
            }
        };

        tracing::info!(
            width = shared.config.panel.width,
            height = shared.config.panel.height,
            entries = shared.navigator.len(),
            "playback engine started"
        );
        Ok(PlaybackEngine {
            shared,
            threads: vec![loader_handle, presenter_handle],
        })
    }
}

fn stop_loader(shared: &EngineShared) {
    shared.shutdown.store(true, Ordering::Release);
    shared.wake_loader(Wake::Resume);
}

/// Running playback engine.
///
/// Every control method returns immediately: a request is either accepted (and its outcome shows
/// up later in [`PlaybackEngine::status`]) or rejected with [`PlaybackError::SwapConflict`].
pub struct PlaybackEngine {
    shared: Arc<EngineShared>,
    threads: Vec<JoinHandle<()>>,
}

impl PlaybackEngine {
    /// Handle without threads; tests drive the loader and presenter by hand.
    #[cfg(test)]
    pub(crate) fn from_shared(shared: Arc<EngineShared>) -> Self {
        Self {
            shared,
            threads: Vec::new(),
        }
    }

    /// Reload the navigator's current artwork.
    pub fn request_swap_current(&self) -> PlaybackResult<()> {
        self.shared
            .request_swap(LoadRequest::navigator(SwapIntent::Intentional), NavMove::Stay)
    }

    /// Advance the navigator and swap to its new current artwork.
    pub fn request_swap_next(&self, intent: SwapIntent) -> PlaybackResult<()> {
        self.shared
            .request_swap(LoadRequest::navigator(intent), NavMove::Next)
    }

    /// Step the navigator back and swap to its new current artwork.
    pub fn request_swap_previous(&self) -> PlaybackResult<()> {
        self.shared.request_swap(
            LoadRequest::navigator(SwapIntent::Intentional),
            NavMove::Previous,
        )
    }

    /// Jump to catalog `position` and swap to it.
    pub fn request_swap_to(&self, position: usize) -> PlaybackResult<()> {
        self.shared.request_swap(
            LoadRequest::navigator(SwapIntent::Intentional),
            NavMove::To(position),
        )
    }

    /// Issue `future` once the wall clock reaches its target time. Replaces any pending one.
    pub fn schedule_swap(&self, future: SwapFuture) -> Option<SwapFuture> {
        self.shared.schedule.schedule(future)
    }

    /// Drop the pending scheduled swap.
    pub fn cancel_scheduled_swap(&self) -> Option<SwapFuture> {
        self.shared.schedule.cancel()
    }

    /// Stop advancing frames. The current frame stays on the panel.
    pub fn pause(&self) {
        self.shared.lock().paused = true;
        tracing::info!("paused");
    }

    /// Continue advancing frames.
    pub fn resume(&self) {
        self.shared.lock().paused = false;
        tracing::info!("resumed");
    }

    /// Show the UI frame source instead of artwork. Loads requested meanwhile are skipped.
    pub fn enter_ui_mode(&self) {
        self.shared.lock().ui_mode = true;
        tracing::info!("entered ui mode");
    }

    /// Return to artwork playback and reload the current artwork.
    pub fn exit_ui_mode(&self) -> PlaybackResult<()> {
        self.shared.lock().ui_mode = false;
        tracing::info!("left ui mode");
        let request = LoadRequest {
            wake: Wake::Resume,
            ..LoadRequest::navigator(SwapIntent::Intentional)
        };
        self.shared.request_swap(request, NavMove::Stay)
    }

    /// Change the background color used for borders and transparency.
    pub fn set_background(&self, color: Rgb8) -> u64 {
        self.shared.settings.set_background(color)
    }

    /// Change the panel rotation.
    pub fn set_rotation(&self, rotation: Rotation) {
        self.shared.settings.set_rotation(rotation);
    }

    /// Runtime settings.
    pub fn settings(&self) -> &RuntimeSettings {
        &self.shared.settings
    }

    /// Snapshot of slots, flags and counters.
    pub fn status(&self) -> EngineStatus {
        status_of(&self.shared)
    }

    /// Block until no load or prefetch is in flight, at most `timeout`. Returns `true` if idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.shared.wait_until_idle(timeout)
    }

    /// Stop both threads and release every slot.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        stop_loader(&self.shared);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                tracing::error!("engine thread panicked");
            }
        }
        let mut st = self.shared.lock();
        for slot in &mut st.slots {
            slot.unload();
        }
        tracing::info!("playback engine stopped");
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

pub(crate) fn status_of(shared: &EngineShared) -> EngineStatus {
    let scheduled_swap = shared.schedule.has_pending();
    let st = shared.lock();
    let position = |i: usize| st.slots[i].meta().map(|m| m.artwork.position);
    let c = &shared.counters;
    EngineStatus {
        front: st.front().phase(),
        back: st.back().phase(),
        front_position: position(state::FRONT),
        back_position: position(state::BACK),
        swap_requested: st.swap_requested,
        loader_busy: st.loader_busy,
        scheduled_swap,
        paused: st.paused,
        ui_mode: st.ui_mode,
        stats: PlaybackStats {
            frames_presented: c.frames_presented.load(Ordering::Relaxed),
            swaps: c.swaps.load(Ordering::Relaxed),
            failed_loads: c.failed_loads.load(Ordering::Relaxed),
            rejected_requests: c.rejected_requests.load(Ordering::Relaxed),
            upscale_timeouts: shared.pool.timeouts(),
            deletions: shared.recovery.deletions(),
        },
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/mod.rs"]
mod tests;
