use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::state::{
    BACK, Counters, EngineShared, EngineState, FRONT, LoadRequest, NavMove, Wake,
};
use crate::foundation::core::{PanelSize, Rgb8, Rotation, SwapIntent};
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::overlay::draw_notice;
use crate::slot::{SlotLease, SlotMeta};
use crate::upscale::{FrameBuffer, PANEL_BYTES_PER_PIXEL};

const VSYNC_TIMEOUT: Duration = Duration::from_millis(100);

/// What a tick ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// A new frame went to the display.
    Presented,
    /// Paused: the panel keeps its current frame.
    Held,
    /// Nothing has been swapped in yet.
    Idle,
    /// UI mode drew its own frame.
    Ui,
}

/// Per-tick inputs captured under the state lock.
struct FramePlan {
    first: bool,
    paused: bool,
    is_static: bool,
    static_generation: u64,
    prefetched_delay_ms: u32,
}

struct Rendered {
    delay_ms: Option<u32>,
    refreshed_static: bool,
}

/// Real-time loop that owns the front slot.
pub(crate) struct Presenter {
    shared: Arc<EngineShared>,
    /// Delay of the frame currently on the panel.
    shown_delay_ms: Option<u32>,
    dwell_started: Option<Instant>,
    /// Panel contents as last presented, without the notice.
    rows: Vec<u8>,
    /// What actually goes to the display when it differs from `rows`.
    staging: Vec<u8>,
    ui_frame: Vec<u8>,
}

impl Presenter {
    pub(crate) fn new(shared: Arc<EngineShared>) -> Self {
        Self {
            shared,
            shown_delay_ms: None,
            dwell_started: None,
            rows: Vec::new(),
            staging: Vec::new(),
            ui_frame: Vec::new(),
        }
    }

    pub(crate) fn run(mut self) {
        tracing::debug!("presenter started");
        while !self.shared.is_shutting_down() {
            if let Err(e) = self.tick() {
                tracing::error!(error = %e, "presenter tick failed");
                self.shared.clock.sleep(self.shared.config.idle_tick());
            }
        }
        tracing::debug!("presenter stopped");
    }

    pub(crate) fn tick(&mut self) -> PlaybackResult<TickOutcome> {
        let shared = Arc::clone(&self.shared);
        let tick_start = shared.clock.now();
        self.poll_schedule();

        let (background, generation) = shared.settings.background();
        let rotation = shared.settings.rotation();
        let panel = shared.config.panel;

        let mut st = shared.lock();
        if st.ui_mode {
            drop(st);
            self.present_ui(panel)?;
            shared.clock.sleep(shared.config.idle_tick());
            return Ok(TickOutcome::Ui);
        }

        let swapped = if st.swap_requested && st.back().is_ready() {
            Some(swap_slots(&mut st))
        } else {
            None
        };
        rebuild_back_tables(&mut st, panel, rotation);
        let notice = st.notice.update(tick_start);

        let paused = st.paused;
        let front = &mut st.slots[FRONT];
        let Some(mut lease) = front.lease() else {
            drop(st);
            shared.clock.sleep(shared.config.idle_tick());
            return Ok(TickOutcome::Idle);
        };
        let Some(meta) = front.meta().cloned() else {
            let _ = front.return_lease(lease);
            return Err(PlaybackError::validation("active slot has no metadata"));
        };
        let plan = FramePlan {
            first: front.take_first_frame(),
            paused,
            is_static: meta.info.is_static() && front.static_frame_cached(),
            static_generation: front.cached_bg_generation(),
            prefetched_delay_ms: meta.prefetched_delay_ms,
        };
        drop(st);

        if let Some(meta) = swapped.flatten() {
            self.on_swapped(&meta, tick_start);
        }

        let rendered =
            self.render_front(&mut lease, &plan, panel, rotation, background, generation);
        let frame = Arc::clone(&lease.resources.frame);
        {
            let mut st = shared.lock();
            let front = &mut st.slots[FRONT];
            if matches!(rendered, Ok(Rendered { refreshed_static: true, .. })) {
                front.cache_static_frame(generation);
            }
            if front.return_lease(lease).is_err() {
                tracing::debug!("front slot changed during the tick, dropping its resources");
            }
        }

        let Some(delay_ms) = rendered?.delay_ms else {
            shared.clock.sleep(shared.config.idle_tick());
            return Ok(TickOutcome::Held);
        };

        self.pace(tick_start);
        self.present(&frame, notice)?;
        self.shown_delay_ms = Some(delay_ms);
        Counters::bump(&shared.counters.frames_presented);

        self.check_dwell(&meta, paused);
        Ok(TickOutcome::Presented)
    }

    /// Decide whether this tick shows a new frame and prepare it in the front buffer.
    fn render_front(
        &self,
        lease: &mut SlotLease,
        plan: &FramePlan,
        panel: PanelSize,
        rotation: Rotation,
        background: Rgb8,
        generation: u64,
    ) -> PlaybackResult<Rendered> {
        let res = &mut lease.resources;
        res.ensure_tables(panel, rotation)?;
        let mut needs_upscale = res.frame_stale;
        let static_stale = plan.is_static && plan.static_generation != generation;

        // A held frame still follows background changes of a cached static frame.
        if plan.paused && !plan.first && !needs_upscale && !static_stale {
            return Ok(Rendered {
                delay_ms: None,
                refreshed_static: false,
            });
        }

        let delay_ms = if plan.first || plan.paused {
            plan.prefetched_delay_ms
        } else if plan.is_static {
            plan.prefetched_delay_ms
        } else {
            needs_upscale = true;
            res.decode_next(background)?
        };

        if static_stale {
            let info = res.info();
            if info.has_transparency {
                res.decode_first(background)?;
                needs_upscale = true;
            } else if res.tables.has_borders {
                needs_upscale = true;
            }
            tracing::debug!(
                generation,
                redecoded = info.has_transparency,
                "static frame recomposited"
            );
        }

        if needs_upscale {
            let outcome =
                self.shared
                    .pool
                    .upscale(res.current(), &res.tables, &res.frame, background)?;
            res.frame_stale = false;
            if !outcome.is_complete() {
                tracing::debug!(
                    completed = ?outcome.completed,
                    "presenting partially upscaled frame"
                );
            }
        }

        Ok(Rendered {
            delay_ms: Some(delay_ms),
            refreshed_static: static_stale,
        })
    }

    /// Sleep off whatever remains of the displayed frame's delay.
    fn pace(&self, tick_start: Instant) {
        let Some(target_ms) = self.shown_delay_ms else {
            return;
        };
        let target = Duration::from_millis(u64::from(target_ms));
        let elapsed = self.shared.clock.now().saturating_duration_since(tick_start);
        if let Some(residual) = target.checked_sub(elapsed)
            && residual >= Duration::from_millis(1)
        {
            self.shared.clock.sleep(residual);
        }
    }

    /// Assemble the whole panel and hand it to the display in a single draw.
    fn present(&mut self, frame: &FrameBuffer, notice: Option<Rgb8>) -> PlaybackResult<()> {
        let display = Arc::clone(&self.shared.display);
        let panel = frame.size();
        let stride = panel.width as usize * PANEL_BYTES_PER_PIXEL;
        self.rows.resize(panel.pixel_count() * PANEL_BYTES_PER_PIXEL, 0);

        for band in 0..2 {
            let (start, end) = frame.band_rows(band);
            let span = start as usize * stride..end as usize * stride;
            match frame.band(band).try_lock() {
                Some(px) => self.rows[span].copy_from_slice(&px),
                None => tracing::debug!(band, "band still being written, keeping previous rows"),
            }
        }

        let notice = notice.filter(|_| self.shared.config.swap_notice);
        let out: &[u8] = if display.brightness() == 0 {
            self.staging.clear();
            self.staging.resize(self.rows.len(), 0);
            &self.staging
        } else if let Some(color) = notice {
            self.staging.clear();
            self.staging.extend_from_slice(&self.rows);
            draw_notice(&mut self.staging, panel, self.shared.config.swap_notice_size, color);
            &self.staging
        } else {
            &self.rows
        };

        if display.buffer_count() > 1 && !display.wait_vsync(VSYNC_TIMEOUT) {
            tracing::warn!("vsync wait timed out");
        }
        display.draw(out, 0, 0, panel.width, panel.height)
    }

    fn present_ui(&mut self, panel: PanelSize) -> PlaybackResult<()> {
        let len = panel.pixel_count() * PANEL_BYTES_PER_PIXEL;
        self.ui_frame.clear();
        self.ui_frame.resize(len, 0);
        if let Some(source) = &self.shared.ui_source {
            source.render(&mut self.ui_frame, panel)?;
        }
        self.shared
            .display
            .draw(&self.ui_frame, 0, 0, panel.width, panel.height)
    }

    fn on_swapped(&mut self, meta: &SlotMeta, now: Instant) {
        let shared = &self.shared;
        Counters::bump(&shared.counters.swaps);
        shared.recovery.on_success(&meta.artwork);
        self.dwell_started = Some(now);
        tracing::info!(
            position = meta.artwork.position,
            path = %meta.artwork.path.display(),
            frame = meta.prefetched_frame,
            "swapped in"
        );
        if meta.is_live_swap
            && let Some(live) = &shared.live
        {
            live.notify_swap_succeeded(meta.artwork.position);
        }
        if meta.artwork.is_vault()
            && let (Some(views), Some(id)) = (&shared.views, &meta.artwork.content_id)
        {
            views.record_view(id, meta.intent == SwapIntent::Intentional);
        }
    }

    fn check_dwell(&mut self, meta: &SlotMeta, paused: bool) {
        if paused {
            return;
        }
        let dwell_ms = meta
            .artwork
            .dwell_override_ms
            .unwrap_or(self.shared.config.default_dwell_ms);
        let Some(started) = self.dwell_started else {
            return;
        };
        if dwell_ms == 0 {
            return;
        }
        let now = self.shared.clock.now();
        if now.saturating_duration_since(started) < Duration::from_millis(dwell_ms) {
            return;
        }
        match self
            .shared
            .request_swap(LoadRequest::navigator(SwapIntent::Automated), NavMove::Next)
        {
            Ok(()) => {
                tracing::info!(dwell_ms, "dwell elapsed, advancing");
                self.dwell_started = Some(now);
            }
            Err(e) => tracing::debug!(error = %e, "dwell advance deferred"),
        }
    }

    fn poll_schedule(&self) {
        let shared = &self.shared;
        let Some(future) = shared.schedule.take_ready(shared.clock.epoch_ms()) else {
            return;
        };
        let request = LoadRequest {
            artwork: Some(future.artwork.clone()),
            alignment: future.alignment(),
            is_live_swap: future.is_live_mode_swap,
            intent: future.intent(),
            wake: Wake::Load,
        };
        match shared.request_swap(request, NavMove::Stay) {
            Ok(()) => tracing::debug!(position = future.artwork.position, "scheduled swap issued"),
            Err(PlaybackError::SwapConflict(_)) => shared.schedule.restore(future),
            Err(e) => tracing::warn!(error = %e, "scheduled swap dropped"),
        }
    }
}

/// Exchange front and back. Returns the new front's metadata.
fn swap_slots(st: &mut EngineState) -> Option<SlotMeta> {
    st.slots.swap(FRONT, BACK);
    st.slots[FRONT].activate();
    st.swap_requested = false;
    st.notice.succeed();
    st.slots[FRONT].meta().cloned()
}

/// Follow a rotation change on the back slot, unless the loader may be touching it.
fn rebuild_back_tables(st: &mut EngineState, panel: PanelSize, rotation: Rotation) {
    if st.loader_busy {
        return;
    }
    if let Some(res) = st.slots[BACK].resources_mut()
        && let Err(e) = res.ensure_tables(panel, rotation)
    {
        tracing::warn!(error = %e, "back slot tables not rebuilt");
    }
}
