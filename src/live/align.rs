use crate::codec::{Codec, PixelFormat, decode_frame};
use crate::foundation::core::{Alignment, Rgb8};
use crate::foundation::error::{PlaybackError, PlaybackResult};

/// Frame a seek landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlignedFrame {
    /// Index of the decoded frame within the loop.
    pub index: u32,
    /// Its own delay, used as the prefetched delay.
    pub delay_ms: u32,
}

/// Reduce an elapsed time into one loop of `loop_ms`.
pub fn reduce_elapsed(elapsed_ms: u64, loop_ms: u64) -> PlaybackResult<u64> {
    if loop_ms == 0 {
        return Err(PlaybackError::alignment("animation has zero loop duration"));
    }
    Ok(elapsed_ms % loop_ms)
}

/// Computes which frame a newly loaded asset starts on so it joins a shared schedule in phase.
///
/// Seeking decodes and discards frames; the decoded target is left in the caller's buffer.
#[derive(Clone, Copy, Debug)]
pub struct LiveAligner {
    now_ms: u64,
    background: Rgb8,
}

impl LiveAligner {
    /// Aligner evaluating wall-clock alignments at `now_ms`.
    pub fn new(now_ms: u64, background: Rgb8) -> Self {
        Self { now_ms, background }
    }

    /// Seek `codec` according to `alignment`, leaving the target frame in `dst`.
    ///
    /// An explicit start frame takes precedence over a start time. Single-frame assets cannot be
    /// seeked. On error the codec position is unspecified; the caller resets and falls back.
    #[tracing::instrument(level = "debug", skip(self, codec, dst))]
    pub fn align(
        &self,
        codec: &mut dyn Codec,
        format: PixelFormat,
        dst: &mut [u8],
        alignment: Alignment,
    ) -> PlaybackResult<AlignedFrame> {
        let info = codec.info();
        if info.frame_count <= 1 {
            return Err(PlaybackError::alignment(
                "single-frame assets are not seekable",
            ));
        }

        if let Some(start_frame) = alignment.start_frame {
            return self.seek_frame(codec, format, dst, start_frame % info.frame_count);
        }
        let Some(start_time_ms) = alignment.start_time_ms else {
            return Err(PlaybackError::alignment("no alignment requested"));
        };

        let elapsed = self.now_ms.saturating_sub(start_time_ms);
        let loop_ms = self.loop_duration_ms(codec, format, dst)?;
        let offset = reduce_elapsed(elapsed, loop_ms)?;

        codec.reset()?;
        let mut acc = 0u64;
        for index in 0..info.frame_count {
            decode_frame(codec, format, dst, self.background)?;
            let delay = codec.frame_delay_ms();
            acc += u64::from(delay);
            if acc > offset {
                tracing::debug!(elapsed, loop_ms, offset, index, "aligned to wall clock");
                return Ok(AlignedFrame {
                    index,
                    delay_ms: delay,
                });
            }
        }
        Err(PlaybackError::alignment(
            "frame delays changed between passes",
        ))
    }

    fn seek_frame(
        &self,
        codec: &mut dyn Codec,
        format: PixelFormat,
        dst: &mut [u8],
        target: u32,
    ) -> PlaybackResult<AlignedFrame> {
        codec.reset()?;
        for _ in 0..=target {
            decode_frame(codec, format, dst, self.background)?;
        }
        tracing::debug!(frame = target, "aligned to explicit frame");
        Ok(AlignedFrame {
            index: target,
            delay_ms: codec.frame_delay_ms(),
        })
    }

    /// Sum of every frame delay. Leaves the codec rewound.
    fn loop_duration_ms(
        &self,
        codec: &mut dyn Codec,
        format: PixelFormat,
        dst: &mut [u8],
    ) -> PlaybackResult<u64> {
        codec.reset()?;
        let mut total = 0u64;
        for _ in 0..codec.info().frame_count {
            decode_frame(codec, format, dst, self.background)?;
            total += u64::from(codec.frame_delay_ms());
        }
        codec.reset()?;
        Ok(total)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/live/align.rs"]
mod tests;
