use image::{Frames, RgbaImage};

use crate::codec::{CodecInfo, DEFAULT_FRAME_DELAY_MS};
use crate::foundation::core::Rgb8;
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::foundation::math::{blend_over_bg, buffer_len};

const MAX_DECODED_BYTES: usize = 512 * 1024 * 1024;

struct StoredFrame {
    rgba: Vec<u8>,
    delay_ms: u32,
}

/// Fully decoded frame list with a playback cursor.
///
/// Pixel-art assets are small enough that decoding every frame at open keeps the per-tick cost
/// down to a copy, and lets the codec be moved freely between the loader and presenter threads.
pub(crate) struct FrameSequence {
    width: u32,
    height: u32,
    frames: Vec<StoredFrame>,
    cursor: usize,
    last_delay_ms: u32,
    has_transparency: bool,
}

fn delay_ms(numer: u32, denom: u32) -> u32 {
    let ms = if denom == 0 { 0 } else { numer / denom };
    if ms == 0 { DEFAULT_FRAME_DELAY_MS } else { ms }
}

impl FrameSequence {
    pub(crate) fn from_frames(frames: Frames<'_>) -> PlaybackResult<Self> {
        Self::from_frames_capped(frames, MAX_DECODED_BYTES)
    }

    /// Decode every frame, refusing animations whose decoded size exceeds `cap` bytes.
    pub(crate) fn from_frames_capped(frames: Frames<'_>, cap: usize) -> PlaybackResult<Self> {
        let mut seq: Option<Self> = None;
        let mut total = 0usize;
        for frame in frames {
            let frame = frame.map_err(|e| PlaybackError::decode(e.to_string()))?;
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = delay_ms(numer, denom);
            let buffer = frame.into_buffer();
            total = total.saturating_add(buffer.as_raw().len());
            if total > cap {
                return Err(PlaybackError::resource_limit(format!(
                    "animation decodes to more than {cap} bytes"
                )));
            }
            match seq.as_mut() {
                None => seq = Some(Self::from_image(buffer, delay)?),
                Some(s) => s.push(buffer, delay)?,
            }
        }
        seq.ok_or_else(|| PlaybackError::decode("animation has no frames"))
    }

    pub(crate) fn from_image(image: RgbaImage, delay: u32) -> PlaybackResult<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PlaybackError::decode("image has zero size"));
        }
        let rgba = image.into_raw();
        let has_transparency = rgba.chunks_exact(4).any(|p| p[3] != 255);
        Ok(Self {
            width,
            height,
            frames: vec![StoredFrame {
                rgba,
                delay_ms: delay,
            }],
            cursor: 0,
            last_delay_ms: delay,
            has_transparency,
        })
    }

    fn push(&mut self, image: RgbaImage, delay: u32) -> PlaybackResult<()> {
        if image.dimensions() != (self.width, self.height) {
            return Err(PlaybackError::decode(format!(
                "frame size {:?} differs from canvas {}x{}",
                image.dimensions(),
                self.width,
                self.height
            )));
        }
        let rgba = image.into_raw();
        self.has_transparency |= rgba.chunks_exact(4).any(|p| p[3] != 255);
        self.frames.push(StoredFrame {
            rgba,
            delay_ms: delay,
        });
        Ok(())
    }

    pub(crate) fn info(&self) -> CodecInfo {
        CodecInfo {
            width: self.width,
            height: self.height,
            frame_count: self.frames.len() as u32,
            has_transparency: self.has_transparency,
        }
    }

    fn advance(&mut self) -> PlaybackResult<&StoredFrame> {
        let frame = self
            .frames
            .get(self.cursor)
            .ok_or(PlaybackError::EndOfStream)?;
        self.cursor += 1;
        self.last_delay_ms = frame.delay_ms;
        Ok(frame)
    }

    pub(crate) fn decode_next(&mut self, dst: &mut [u8]) -> PlaybackResult<()> {
        let expected = buffer_len(self.width, self.height, 4)?;
        if dst.len() != expected {
            return Err(PlaybackError::validation(format!(
                "rgba destination is {} bytes, expected {expected}",
                dst.len()
            )));
        }
        let frame = self.advance()?;
        dst.copy_from_slice(&frame.rgba);
        Ok(())
    }

    pub(crate) fn decode_next_rgb(
        &mut self,
        dst: &mut [u8],
        background: Rgb8,
    ) -> PlaybackResult<()> {
        let expected = buffer_len(self.width, self.height, 3)?;
        if dst.len() != expected {
            return Err(PlaybackError::validation(format!(
                "rgb destination is {} bytes, expected {expected}",
                dst.len()
            )));
        }
        let bg = background.to_array();
        let frame = self.advance()?;
        for (d, s) in dst.chunks_exact_mut(3).zip(frame.rgba.chunks_exact(4)) {
            let a = s[3];
            d[0] = blend_over_bg(s[0], bg[0], a);
            d[1] = blend_over_bg(s[1], bg[1], a);
            d[2] = blend_over_bg(s[2], bg[2], a);
        }
        Ok(())
    }

    pub(crate) fn frame_delay_ms(&self) -> u32 {
        self.last_delay_ms
    }

    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/frames.rs"]
mod tests;
