use parking_lot::Mutex;

use crate::codec::PixelFormat;
use crate::foundation::core::{PanelSize, Rgb8};
use crate::foundation::error::PlaybackResult;
use crate::foundation::math::buffer_len;

/// Bytes per pixel of panel-resolution buffers (RGB888).
pub const PANEL_BYTES_PER_PIXEL: usize = 3;

/// One decoded frame at source resolution.
#[derive(Clone, Debug)]
pub struct NativeFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout of `pixels`.
    pub format: PixelFormat,
    /// Row-major pixel data.
    pub pixels: Vec<u8>,
}

impl NativeFrame {
    /// Allocate a zeroed frame.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> PlaybackResult<Self> {
        let len = buffer_len(width, height, format.bytes_per_pixel())?;
        Ok(Self {
            width,
            height,
            format,
            pixels: vec![0; len],
        })
    }

    /// Straight RGBA of the pixel at `(x, y)`. RGB frames report alpha 255.
    #[inline]
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let bpp = self.format.bytes_per_pixel();
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * bpp;
        match self.format {
            PixelFormat::Rgba8 => [
                self.pixels[i],
                self.pixels[i + 1],
                self.pixels[i + 2],
                self.pixels[i + 3],
            ],
            PixelFormat::Rgb8 => [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], 255],
        }
    }
}

/// Panel-resolution RGB888 presentation buffer, split into a top and bottom band.
///
/// Each band has its own lock so the two upscale workers write disjoint halves concurrently, and
/// a worker that outlives the join timeout only ever blocks its own band.
#[derive(Debug)]
pub struct FrameBuffer {
    size: PanelSize,
    split_row: u32,
    bands: [Mutex<Vec<u8>>; 2],
}

impl FrameBuffer {
    /// Allocate a buffer for `size`, filled with `fill`.
    pub fn new(size: PanelSize, fill: Rgb8) -> PlaybackResult<Self> {
        let split_row = size.height / 2;
        let stride = buffer_len(size.width, 1, PANEL_BYTES_PER_PIXEL)?;
        let top = vec_filled(stride * split_row as usize, fill);
        let bottom = vec_filled(stride * (size.height - split_row) as usize, fill);
        Ok(Self {
            size,
            split_row,
            bands: [Mutex::new(top), Mutex::new(bottom)],
        })
    }

    /// Panel size this buffer was allocated for.
    pub fn size(&self) -> PanelSize {
        self.size
    }

    /// Row range `[start, end)` covered by `band` (0 = top, 1 = bottom).
    pub fn band_rows(&self, band: usize) -> (u32, u32) {
        if band == 0 {
            (0, self.split_row)
        } else {
            (self.split_row, self.size.height)
        }
    }

    pub(crate) fn band(&self, band: usize) -> &Mutex<Vec<u8>> {
        &self.bands[band.min(1)]
    }

    /// Copy the whole frame into one contiguous RGB888 buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size.pixel_count() * PANEL_BYTES_PER_PIXEL);
        for band in &self.bands {
            out.extend_from_slice(&band.lock());
        }
        out
    }
}

fn fill_rgb(px: &mut [u8], color: Rgb8) {
    let c = color.to_array();
    for p in px.chunks_exact_mut(PANEL_BYTES_PER_PIXEL) {
        p.copy_from_slice(&c);
    }
}

fn vec_filled(len: usize, color: Rgb8) -> Vec<u8> {
    let mut v = vec![0u8; len];
    fill_rgb(&mut v, color);
    v
}
