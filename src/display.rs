use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::foundation::core::PanelSize;
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::upscale::PANEL_BYTES_PER_PIXEL;

/// Panel the presenter draws onto.
///
/// `draw` receives tightly packed RGB888 rows. The engine calls it exactly once per presented
/// frame with the whole panel, after at most one `wait_vsync`.
pub trait Display: Send + Sync {
    /// Native resolution.
    fn size(&self) -> PanelSize;
    /// Copy a `width x height` RGB888 rectangle to `(x, y)`.
    fn draw(&self, pixels: &[u8], x: u32, y: u32, width: u32, height: u32) -> PlaybackResult<()>;
    /// Current brightness, 0 to 100. Zero blanks the panel.
    fn brightness(&self) -> u8;
    /// Number of hardware frame buffers. Vsync is only awaited when there is more than one.
    fn buffer_count(&self) -> usize {
        1
    }
    /// Wait for the previous frame to be scanned out. Returns `false` on timeout.
    fn wait_vsync(&self, _timeout: Duration) -> bool {
        true
    }
}

/// Alternate content shown while the engine is in UI mode.
pub trait FrameSource: Send + Sync {
    /// Render one panel-sized RGB888 frame into `dst`.
    fn render(&self, dst: &mut [u8], panel: PanelSize) -> PlaybackResult<()>;
}

/// [`Display`] that keeps the panel contents in memory.
///
/// Clones share the same panel, so a test or the CLI can keep one handle while the engine owns
/// another.
#[derive(Clone, Debug)]
pub struct MemoryDisplay {
    size: PanelSize,
    buffers: usize,
    state: Arc<Mutex<MemoryDisplayState>>,
}

#[derive(Debug)]
struct MemoryDisplayState {
    pixels: Vec<u8>,
    draws: u64,
    vsync_waits: u64,
    brightness: u8,
}

impl MemoryDisplay {
    /// Single-buffered panel of `size`, full brightness, initially black.
    pub fn new(size: PanelSize) -> Self {
        Self {
            size,
            buffers: 1,
            state: Arc::new(Mutex::new(MemoryDisplayState {
                pixels: vec![0; size.pixel_count() * PANEL_BYTES_PER_PIXEL],
                draws: 0,
                vsync_waits: 0,
                brightness: 100,
            })),
        }
    }

    /// Report `buffers` hardware frame buffers.
    pub fn with_buffers(mut self, buffers: usize) -> Self {
        self.buffers = buffers.max(1);
        self
    }

    /// Change the reported brightness.
    pub fn set_brightness(&self, brightness: u8) {
        self.state.lock().brightness = brightness.min(100);
    }

    /// Copy of the panel contents (RGB888, row-major).
    pub fn snapshot(&self) -> Vec<u8> {
        self.state.lock().pixels.clone()
    }

    /// RGB of one panel pixel.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = (y as usize * self.size.width as usize + x as usize) * PANEL_BYTES_PER_PIXEL;
        let st = self.state.lock();
        [st.pixels[i], st.pixels[i + 1], st.pixels[i + 2]]
    }

    /// Number of `draw` calls so far.
    pub fn draws(&self) -> u64 {
        self.state.lock().draws
    }

    /// Number of vsync waits so far.
    pub fn vsync_waits(&self) -> u64 {
        self.state.lock().vsync_waits
    }
}

impl Display for MemoryDisplay {
    fn size(&self) -> PanelSize {
        self.size
    }

    fn draw(&self, pixels: &[u8], x: u32, y: u32, width: u32, height: u32) -> PlaybackResult<()> {
        if x.saturating_add(width) > self.size.width || y.saturating_add(height) > self.size.height
        {
            return Err(PlaybackError::validation(format!(
                "draw {width}x{height} at ({x}, {y}) exceeds panel {}x{}",
                self.size.width, self.size.height
            )));
        }
        let row_len = width as usize * PANEL_BYTES_PER_PIXEL;
        if pixels.len() != row_len * height as usize {
            return Err(PlaybackError::validation(format!(
                "draw received {} bytes for {width}x{height}",
                pixels.len()
            )));
        }
        let stride = self.size.width as usize * PANEL_BYTES_PER_PIXEL;
        let mut st = self.state.lock();
        for (row, line) in pixels.chunks_exact(row_len).enumerate() {
            let off = (y as usize + row) * stride + x as usize * PANEL_BYTES_PER_PIXEL;
            st.pixels[off..off + row_len].copy_from_slice(line);
        }
        st.draws += 1;
        Ok(())
    }

    fn brightness(&self) -> u8 {
        self.state.lock().brightness
    }

    fn buffer_count(&self) -> usize {
        self.buffers
    }

    fn wait_vsync(&self, _timeout: Duration) -> bool {
        self.state.lock().vsync_waits += 1;
        true
    }
}
