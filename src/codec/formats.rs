use std::io::Cursor;

use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, ImageError, ImageFormat};

use crate::codec::frames::FrameSequence;
use crate::codec::{Codec, CodecInfo, DEFAULT_FRAME_DELAY_MS};
use crate::foundation::core::{AssetKind, Rgb8};
use crate::foundation::error::{PlaybackError, PlaybackResult};

fn decode_err(e: ImageError) -> PlaybackError {
    PlaybackError::decode(e.to_string())
}

pub(crate) struct GifCodec(FrameSequence);

impl GifCodec {
    fn open(bytes: &[u8]) -> PlaybackResult<Self> {
        let dec = GifDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
        Ok(Self(FrameSequence::from_frames(dec.into_frames())?))
    }
}

pub(crate) struct WebpCodec(FrameSequence);

impl WebpCodec {
    fn open(bytes: &[u8]) -> PlaybackResult<Self> {
        let dec = WebPDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
        if dec.has_animation() {
            return Ok(Self(FrameSequence::from_frames(dec.into_frames())?));
        }
        let img = DynamicImage::from_decoder(dec).map_err(decode_err)?;
        Ok(Self(FrameSequence::from_image(
            img.to_rgba8(),
            DEFAULT_FRAME_DELAY_MS,
        )?))
    }
}

pub(crate) struct PngCodec(FrameSequence);

impl PngCodec {
    fn open(bytes: &[u8]) -> PlaybackResult<Self> {
        let dec = PngDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
        if dec.is_apng().map_err(decode_err)? {
            let apng = dec.apng().map_err(decode_err)?;
            return Ok(Self(FrameSequence::from_frames(apng.into_frames())?));
        }
        let img = DynamicImage::from_decoder(dec).map_err(decode_err)?;
        Ok(Self(FrameSequence::from_image(
            img.to_rgba8(),
            DEFAULT_FRAME_DELAY_MS,
        )?))
    }
}

pub(crate) struct JpegCodec(FrameSequence);

impl JpegCodec {
    fn open(bytes: &[u8]) -> PlaybackResult<Self> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .map_err(decode_err)?;
        Ok(Self(FrameSequence::from_image(
            img.to_rgba8(),
            DEFAULT_FRAME_DELAY_MS,
        )?))
    }
}

/// Closed set of built-in codecs, selected by [`AssetKind`] at open time.
pub(crate) enum FormatCodec {
    Gif(GifCodec),
    Webp(WebpCodec),
    Png(PngCodec),
    Jpeg(JpegCodec),
}

impl FormatCodec {
    pub(crate) fn open(kind: AssetKind, bytes: &[u8]) -> PlaybackResult<Self> {
        if bytes.is_empty() {
            return Err(PlaybackError::decode("empty file"));
        }
        Ok(match kind {
            AssetKind::Gif => Self::Gif(GifCodec::open(bytes)?),
            AssetKind::Webp => Self::Webp(WebpCodec::open(bytes)?),
            AssetKind::Png => Self::Png(PngCodec::open(bytes)?),
            AssetKind::Jpeg => Self::Jpeg(JpegCodec::open(bytes)?),
        })
    }

    fn frames(&self) -> &FrameSequence {
        match self {
            Self::Gif(c) => &c.0,
            Self::Webp(c) => &c.0,
            Self::Png(c) => &c.0,
            Self::Jpeg(c) => &c.0,
        }
    }

    fn frames_mut(&mut self) -> &mut FrameSequence {
        match self {
            Self::Gif(c) => &mut c.0,
            Self::Webp(c) => &mut c.0,
            Self::Png(c) => &mut c.0,
            Self::Jpeg(c) => &mut c.0,
        }
    }
}

impl Codec for FormatCodec {
    fn info(&self) -> CodecInfo {
        self.frames().info()
    }

    fn decode_next(&mut self, dst: &mut [u8]) -> PlaybackResult<()> {
        self.frames_mut().decode_next(dst)
    }

    fn decode_next_rgb(&mut self, dst: &mut [u8], background: Rgb8) -> PlaybackResult<()> {
        self.frames_mut().decode_next_rgb(dst, background)
    }

    fn frame_delay_ms(&self) -> u32 {
        self.frames().frame_delay_ms()
    }

    fn reset(&mut self) -> PlaybackResult<()> {
        self.frames_mut().reset();
        Ok(())
    }
}
