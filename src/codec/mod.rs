use std::sync::Arc;

use crate::foundation::core::{AssetKind, Rgb8};
use crate::foundation::error::PlaybackResult;

mod formats;
mod frames;

pub(crate) use formats::FormatCodec;

/// Delay reported for frames that carry none (or zero).
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Stream properties reported by an open codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecInfo {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Number of frames in one loop. Still images report 1.
    pub frame_count: u32,
    /// `true` when any frame has a pixel with alpha below 255.
    pub has_transparency: bool,
}

impl CodecInfo {
    /// Scratch format the engine decodes this stream into.
    pub fn preferred_format(&self) -> PixelFormat {
        if self.has_transparency {
            PixelFormat::Rgba8
        } else {
            PixelFormat::Rgb8
        }
    }

    /// `true` for single-frame assets.
    pub fn is_static(&self) -> bool {
        self.frame_count <= 1
    }
}

/// Layout of a native (source resolution) frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Straight RGBA, 4 bytes per pixel.
    Rgba8,
    /// Opaque RGB, 3 bytes per pixel.
    Rgb8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
        }
    }
}

/// Decoder for one open asset.
///
/// Frames are produced in order. Once every frame has been produced, `decode_next*` returns
/// [`crate::PlaybackError::EndOfStream`] until [`Codec::reset`] rewinds to frame 0.
pub trait Codec: Send {
    /// Stream properties.
    fn info(&self) -> CodecInfo;
    /// Decode the next frame as straight RGBA into `dst` (`width * height * 4` bytes).
    fn decode_next(&mut self, dst: &mut [u8]) -> PlaybackResult<()>;
    /// Decode the next frame as RGB into `dst` (`width * height * 3` bytes), flattening any
    /// transparency over `background`.
    fn decode_next_rgb(&mut self, dst: &mut [u8], background: Rgb8) -> PlaybackResult<()>;
    /// Delay of the most recently decoded frame, in milliseconds.
    fn frame_delay_ms(&self) -> u32;
    /// Rewind to frame 0.
    fn reset(&mut self) -> PlaybackResult<()>;
    /// Release decoder state early. Dropping the codec has the same effect.
    fn close(&mut self) {}
}

/// Opens a codec for an asset kind.
pub trait CodecFactory: Send + Sync {
    /// Open `bytes` as `kind`.
    fn open(&self, kind: AssetKind, bytes: Arc<[u8]>) -> PlaybackResult<Box<dyn Codec>>;
}

/// Codec factory backed by the `image` crate decoders.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageCodecFactory;

impl CodecFactory for ImageCodecFactory {
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn open(&self, kind: AssetKind, bytes: Arc<[u8]>) -> PlaybackResult<Box<dyn Codec>> {
        let codec = FormatCodec::open(kind, &bytes)?;
        let info = codec.info();
        tracing::debug!(
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            transparency = info.has_transparency,
            "codec opened"
        );
        Ok(Box::new(codec))
    }
}

/// Decode one frame in `format` into `dst`.
pub(crate) fn decode_frame(
    codec: &mut dyn Codec,
    format: PixelFormat,
    dst: &mut [u8],
    background: Rgb8,
) -> PlaybackResult<()> {
    match format {
        PixelFormat::Rgba8 => codec.decode_next(dst),
        PixelFormat::Rgb8 => codec.decode_next_rgb(dst, background),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/mod.rs"]
mod tests;
