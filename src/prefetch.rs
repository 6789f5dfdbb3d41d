use crate::engine::state::{BACK, EngineShared};
use crate::foundation::core::{Alignment, Rgb8};
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::live::LiveAligner;
use crate::slot::SlotLease;

/// Result of a first-frame decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Prefetched {
    pub(crate) delay_ms: u32,
    pub(crate) frame_index: u32,
    pub(crate) alignment_cleared: bool,
}

/// Decodes (optionally seeking) the back slot's first frame and upscales it into the slot's
/// presentation buffer.
pub(crate) struct PrefetchEngine<'a> {
    shared: &'a EngineShared,
}

impl<'a> PrefetchEngine<'a> {
    pub(crate) fn new(shared: &'a EngineShared) -> Self {
        Self { shared }
    }

    /// Prefetch the back slot. On failure the slot is torn down before returning.
    #[tracing::instrument(level = "debug", skip(self))]
    pub(crate) fn prefetch_back(&self) -> PlaybackResult<Prefetched> {
        let (mut lease, alignment) = {
            let mut st = self.shared.lock();
            let back = &mut st.slots[BACK];
            let alignment = back.meta().map(|m| m.alignment).unwrap_or_default();
            (back.begin_prefetch()?, alignment)
        };
        let (background, generation) = self.shared.settings.background();

        // Slow part: runs without the state lock. The slot is marked in progress, so nobody
        // clears it meanwhile.
        let result = self.run(&mut lease, alignment, background);

        let mut st = self.shared.lock();
        let back = &mut st.slots[BACK];
        match result {
            Ok(done) => {
                let is_static = lease.resources.info().is_static();
                back.finish_prefetch(
                    lease,
                    done.delay_ms,
                    done.frame_index,
                    done.alignment_cleared,
                )?;
                if is_static {
                    back.cache_static_frame(generation);
                }
                Ok(done)
            }
            Err(e) => {
                back.fail_prefetch(lease);
                Err(e)
            }
        }
    }

    fn run(
        &self,
        lease: &mut SlotLease,
        alignment: Alignment,
        background: Rgb8,
    ) -> PlaybackResult<Prefetched> {
        let res = &mut lease.resources;
        let mut alignment_cleared = false;

        let aligned = if alignment.is_none() {
            None
        } else {
            let aligner = LiveAligner::new(self.shared.clock.epoch_ms(), background);
            let (codec, frame, format) = res.decode_target();
            match aligner.align(codec, format, &mut frame.pixels, alignment) {
                Ok(a) => {
                    res.commit_decoded();
                    Some(a)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "live alignment failed, starting from frame 0");
                    alignment_cleared = true;
                    None
                }
            }
        };

        let (delay_ms, frame_index) = match aligned {
            Some(a) => (a.delay_ms, a.index),
            None => {
                let delay = res
                    .decode_first(background)
                    .map_err(|e| PlaybackError::prefetch(format!("first frame: {e}")))?;
                (delay, 0)
            }
        };

        res.ensure_tables(self.shared.config.panel, self.shared.settings.rotation())?;
        let outcome = self
            .shared
            .pool
            .upscale(res.current(), &res.tables, &res.frame, background)
            .map_err(|e| PlaybackError::prefetch(format!("upscale: {e}")))?;
        res.frame_stale = false;
        if !outcome.is_complete() {
            tracing::warn!("prefetched frame presented before every band finished");
        }

        Ok(Prefetched {
            delay_ms,
            frame_index,
            alignment_cleared,
        })
    }
}
