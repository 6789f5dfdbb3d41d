use std::sync::Arc;

use crate::codec::{Codec, CodecInfo, PixelFormat, decode_frame};
use crate::foundation::core::{Alignment, ArtworkRef, PanelSize, Rgb8, Rotation, SwapIntent};
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::upscale::{FrameBuffer, NativeFrame, UpscaleTables};

/// Lifecycle phase of a [`BufferSlot`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SlotPhase {
    /// No resources.
    #[default]
    Empty,
    /// The loader is reading bytes and opening the codec.
    Loading,
    /// Resources are present; the first frame is pending or being decoded.
    Prefetching,
    /// First frame decoded and upscaled; safe to swap in.
    Ready,
    /// Promoted by a swap. Stays active until the slot is cleared for its next load.
    Active,
}

/// Identity and timing of the asset held by a slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotMeta {
    /// Catalog entry the slot was loaded from.
    pub artwork: ArtworkRef,
    /// Codec stream properties.
    pub info: CodecInfo,
    /// Live Mode alignment requested for this load. Cleared when the seek falls back.
    pub alignment: Alignment,
    /// `true` when this load is part of a Live Mode swap.
    pub is_live_swap: bool,
    /// Why the swap was requested.
    pub intent: SwapIntent,
    /// Delay of the prefetched first frame.
    pub prefetched_delay_ms: u32,
    /// Frame index the prefetch landed on.
    pub prefetched_frame: u32,
}

/// Everything a loaded slot owns. Either all of it exists or none of it does.
pub(crate) struct SlotResources {
    bytes: Arc<[u8]>,
    codec: Box<dyn Codec>,
    info: CodecInfo,
    format: PixelFormat,
    scratch: [Arc<NativeFrame>; 2],
    active: usize,
    pub(crate) tables: Arc<UpscaleTables>,
    pub(crate) frame: Arc<FrameBuffer>,
    /// Tables changed since `frame` was last rendered.
    pub(crate) frame_stale: bool,
}

impl SlotResources {
    pub(crate) fn new(
        bytes: Arc<[u8]>,
        codec: Box<dyn Codec>,
        panel: PanelSize,
        rotation: Rotation,
        background: Rgb8,
    ) -> PlaybackResult<Self> {
        let info = codec.info();
        if info.width == 0 || info.height == 0 || info.frame_count == 0 {
            return Err(PlaybackError::decode("codec reported an empty stream"));
        }
        let format = info.preferred_format();
        let scratch = [
            Arc::new(NativeFrame::new(info.width, info.height, format)?),
            Arc::new(NativeFrame::new(info.width, info.height, format)?),
        ];
        let tables = Arc::new(UpscaleTables::build(
            info.width,
            info.height,
            panel,
            rotation,
        )?);
        let frame = Arc::new(FrameBuffer::new(panel, background)?);
        Ok(Self {
            bytes,
            codec,
            info,
            format,
            scratch,
            active: 0,
            tables,
            frame,
            frame_stale: false,
        })
    }

    pub(crate) fn info(&self) -> CodecInfo {
        self.info
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// The most recently decoded native frame.
    pub(crate) fn current(&self) -> &Arc<NativeFrame> {
        &self.scratch[self.active]
    }

    /// Codec and the idle scratch buffer, for callers that drive decoding themselves.
    ///
    /// If an upscale worker still holds the idle buffer (a timed-out join), it is cloned so the
    /// worker keeps reading a stable frame.
    pub(crate) fn decode_target(&mut self) -> (&mut dyn Codec, &mut NativeFrame, PixelFormat) {
        let next = 1 - self.active;
        let frame = Arc::make_mut(&mut self.scratch[next]);
        (self.codec.as_mut(), frame, self.format)
    }

    /// Make the buffer filled through [`Self::decode_target`] the current frame.
    pub(crate) fn commit_decoded(&mut self) {
        self.active = 1 - self.active;
    }

    /// Decode the next frame into the idle scratch buffer, looping at end of stream.
    pub(crate) fn decode_next(&mut self, background: Rgb8) -> PlaybackResult<u32> {
        let (codec, frame, format) = self.decode_target();
        match decode_frame(codec, format, &mut frame.pixels, background) {
            Ok(()) => {}
            Err(PlaybackError::EndOfStream) => {
                codec.reset()?;
                decode_frame(codec, format, &mut frame.pixels, background)?;
            }
            Err(e) => return Err(e),
        }
        let delay = codec.frame_delay_ms();
        self.commit_decoded();
        Ok(delay)
    }

    /// Rewind and decode frame 0.
    pub(crate) fn decode_first(&mut self, background: Rgb8) -> PlaybackResult<u32> {
        self.codec.reset()?;
        self.decode_next(background)
    }

    /// Rebuild tables when the rotation or panel changed. Returns `true` on rebuild.
    pub(crate) fn ensure_tables(
        &mut self,
        panel: PanelSize,
        rotation: Rotation,
    ) -> PlaybackResult<bool> {
        if self.tables.rotation == rotation && self.tables.panel == panel {
            return Ok(false);
        }
        self.tables = Arc::new(UpscaleTables::build(
            self.info.width,
            self.info.height,
            panel,
            rotation,
        )?);
        self.frame_stale = true;
        Ok(true)
    }
}

/// Resources checked out of a slot for work done outside the state lock.
///
/// The lease is the only handle to the resources while it exists. Returning it to a slot that
/// was unloaded in the meantime drops it instead.
pub(crate) struct SlotLease {
    token: u64,
    pub(crate) resources: Box<SlotResources>,
}

/// One of the two decode slots (front or back).
#[derive(Default)]
pub struct BufferSlot {
    phase: SlotPhase,
    token: u64,
    resources: Option<Box<SlotResources>>,
    leased: bool,
    prefetch_in_progress: bool,
    first_frame_ready: bool,
    static_frame_cached: bool,
    cached_bg_generation: u64,
    meta: Option<SlotMeta>,
}

impl std::fmt::Debug for BufferSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSlot")
            .field("phase", &self.phase)
            .field("token", &self.token)
            .field("has_resources", &self.has_resources())
            .field("prefetch_in_progress", &self.prefetch_in_progress)
            .field("first_frame_ready", &self.first_frame_ready)
            .field("static_frame_cached", &self.static_frame_cached)
            .finish()
    }
}

impl BufferSlot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> SlotPhase {
        self.phase
    }

    /// Safe to present.
    pub fn is_ready(&self) -> bool {
        self.phase == SlotPhase::Ready
    }

    /// Loaded, waiting for its first-frame decode.
    pub fn prefetch_pending(&self) -> bool {
        self.phase == SlotPhase::Prefetching && !self.prefetch_in_progress
    }

    /// First-frame decode is running; the slot must not be cleared.
    pub fn prefetch_in_progress(&self) -> bool {
        self.prefetch_in_progress
    }

    /// The prefetched first frame has not been presented yet.
    pub fn first_frame_ready(&self) -> bool {
        self.first_frame_ready
    }

    /// A single-frame asset is decoded and will not be decoded again.
    pub fn static_frame_cached(&self) -> bool {
        self.static_frame_cached
    }

    /// Metadata of the loaded asset.
    pub fn meta(&self) -> Option<&SlotMeta> {
        self.meta.as_ref()
    }

    /// Resources exist, either in the slot or checked out on a lease.
    pub fn has_resources(&self) -> bool {
        self.resources.is_some() || self.leased
    }

    /// Check the slot's structural invariants.
    pub fn check_invariants(&self) -> PlaybackResult<()> {
        let fail = |msg: &str| Err(PlaybackError::validation(format!("{msg}: {self:?}")));
        match self.phase {
            SlotPhase::Empty | SlotPhase::Loading => {
                if self.has_resources() || self.meta.is_some() {
                    return fail("slot without a committed load owns resources");
                }
                if self.prefetch_in_progress || self.first_frame_ready || self.static_frame_cached {
                    return fail("slot without a committed load has flags set");
                }
            }
            SlotPhase::Prefetching => {
                if !self.has_resources() || self.meta.is_none() {
                    return fail("prefetching slot is missing resources");
                }
            }
            SlotPhase::Ready | SlotPhase::Active => {
                if !self.has_resources() || self.meta.is_none() {
                    return fail("ready slot is missing resources");
                }
                if self.prefetch_pending() || self.prefetch_in_progress {
                    return fail("ready slot still has a prefetch pending");
                }
            }
        }
        Ok(())
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    /// Resources held in the slot right now (not checked out).
    pub(crate) fn resources_mut(&mut self) -> Option<&mut SlotResources> {
        self.resources.as_deref_mut()
    }

    pub(crate) fn begin_load(&mut self, token: u64) -> PlaybackResult<()> {
        if self.phase != SlotPhase::Empty {
            return Err(PlaybackError::validation(format!(
                "load into a {:?} slot",
                self.phase
            )));
        }
        self.phase = SlotPhase::Loading;
        self.token = token;
        Ok(())
    }

    pub(crate) fn commit_load(
        &mut self,
        token: u64,
        resources: Box<SlotResources>,
        meta: SlotMeta,
    ) -> PlaybackResult<()> {
        if self.phase != SlotPhase::Loading || self.token != token {
            return Err(PlaybackError::validation(
                "slot was cleared while its load was in flight",
            ));
        }
        self.resources = Some(resources);
        self.meta = Some(meta);
        self.phase = SlotPhase::Prefetching;
        Ok(())
    }

    pub(crate) fn begin_prefetch(&mut self) -> PlaybackResult<SlotLease> {
        if !self.prefetch_pending() {
            return Err(PlaybackError::prefetch(format!(
                "no prefetch pending on {:?} slot",
                self.phase
            )));
        }
        let resources = self
            .resources
            .take()
            .ok_or_else(|| PlaybackError::prefetch("slot resources are checked out"))?;
        self.leased = true;
        self.prefetch_in_progress = true;
        Ok(SlotLease {
            token: self.token,
            resources,
        })
    }

    pub(crate) fn finish_prefetch(
        &mut self,
        lease: SlotLease,
        delay_ms: u32,
        frame_index: u32,
        alignment_cleared: bool,
    ) -> PlaybackResult<()> {
        if !self.prefetch_in_progress || lease.token != self.token {
            return Err(PlaybackError::prefetch(
                "prefetch finished on a slot that no longer expects it",
            ));
        }
        self.resources = Some(lease.resources);
        self.leased = false;
        self.prefetch_in_progress = false;
        self.first_frame_ready = true;
        self.phase = SlotPhase::Ready;
        if let Some(meta) = self.meta.as_mut() {
            meta.prefetched_delay_ms = delay_ms;
            meta.prefetched_frame = frame_index;
            if alignment_cleared {
                meta.alignment = Alignment::NONE;
            }
        }
        Ok(())
    }

    pub(crate) fn fail_prefetch(&mut self, lease: SlotLease) {
        drop(lease);
        self.prefetch_in_progress = false;
        self.unload();
    }

    pub(crate) fn activate(&mut self) {
        if self.phase == SlotPhase::Ready {
            self.phase = SlotPhase::Active;
        }
    }

    /// Check out resources of an active slot for one presenter tick.
    pub(crate) fn lease(&mut self) -> Option<SlotLease> {
        if self.phase != SlotPhase::Active {
            return None;
        }
        let resources = self.resources.take()?;
        self.leased = true;
        Some(SlotLease {
            token: self.token,
            resources,
        })
    }

    /// Return a lease. Returns it back to the caller if it belongs to another load.
    pub(crate) fn return_lease(&mut self, lease: SlotLease) -> Result<(), SlotLease> {
        if lease.token != self.token || !self.leased || self.resources.is_some() {
            return Err(lease);
        }
        self.resources = Some(lease.resources);
        self.leased = false;
        Ok(())
    }

    /// Consume the prefetched first frame. Returns `true` if it had not been presented yet.
    pub(crate) fn take_first_frame(&mut self) -> bool {
        std::mem::take(&mut self.first_frame_ready)
    }

    pub(crate) fn cache_static_frame(&mut self, bg_generation: u64) {
        self.static_frame_cached = true;
        self.cached_bg_generation = bg_generation;
    }

    pub(crate) fn cached_bg_generation(&self) -> u64 {
        self.cached_bg_generation
    }

    /// Unload unless a prefetch is reading the slot.
    pub(crate) fn try_unload(&mut self) -> PlaybackResult<()> {
        if self.prefetch_in_progress {
            return Err(PlaybackError::swap_conflict(
                "slot is being prefetched and cannot be cleared",
            ));
        }
        self.unload();
        Ok(())
    }

    /// Release every resource and reset every flag. Valid from any phase.
    ///
    /// An outstanding lease is orphaned: it is dropped when returned.
    pub fn unload(&mut self) {
        if let Some(res) = self.resources.as_mut() {
            res.codec.close();
        }
        *self = Self::default();
    }
}

#[cfg(test)]
#[path = "../tests/unit/slot.rs"]
mod tests;
