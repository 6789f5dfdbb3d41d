//! Swap-progress notice drawn into presented frames.
//!
//! An intentional swap request raises a blue checkerboard triangle in the bottom-right corner.
//! It clears when the swap lands, turns red when the load fails or takes longer than
//! [`NOTICE_TIMEOUT`], and the red triangle stays up for [`FAILED_HOLD`].

use std::time::{Duration, Instant};

use crate::foundation::core::{PanelSize, Rgb8};
use crate::upscale::PANEL_BYTES_PER_PIXEL;

pub(crate) const NOTICE_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const FAILED_HOLD: Duration = Duration::from_secs(3);
/// Triangles smaller than this are not drawn.
pub(crate) const MIN_NOTICE_SIZE: u32 = 8;

const PROCESSING_COLOR: Rgb8 = Rgb8::new(0, 0, 255);
const FAILED_COLOR: Rgb8 = Rgb8::new(255, 0, 0);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum SwapNotice {
    #[default]
    Idle,
    Processing {
        since: Instant,
    },
    Failed {
        since: Instant,
    },
}

impl SwapNotice {
    /// A swap was requested. Ignored while a notice is already up.
    pub(crate) fn start(&mut self, now: Instant) {
        if *self == Self::Idle {
            *self = Self::Processing { since: now };
            tracing::debug!("swap notice raised");
        }
    }

    pub(crate) fn succeed(&mut self) {
        if matches!(self, Self::Processing { .. }) {
            *self = Self::Idle;
            tracing::debug!("swap notice cleared");
        }
    }

    pub(crate) fn fail(&mut self, now: Instant) {
        if matches!(self, Self::Processing { .. }) {
            *self = Self::Failed { since: now };
            tracing::debug!("swap notice marked failed");
        }
    }

    /// Apply timeouts at `now` and return the color to draw, if any.
    pub(crate) fn update(&mut self, now: Instant) -> Option<Rgb8> {
        if let Self::Processing { since } = *self {
            if now.saturating_duration_since(since) <= NOTICE_TIMEOUT {
                return Some(PROCESSING_COLOR);
            }
            tracing::warn!("swap did not land in time");
            *self = Self::Failed { since: now };
        }
        match *self {
            Self::Failed { since } if now.saturating_duration_since(since) > FAILED_HOLD => {
                *self = Self::Idle;
                None
            }
            Self::Failed { .. } => Some(FAILED_COLOR),
            _ => None,
        }
    }
}

/// Checkerboard right triangle with its right angle in the panel's bottom-right corner.
pub(crate) fn draw_notice(buf: &mut [u8], panel: PanelSize, size: u32, color: Rgb8) {
    if size < MIN_NOTICE_SIZE {
        return;
    }
    let stride = panel.width as usize * PANEL_BYTES_PER_PIXEL;
    let base_x = i64::from(panel.width) - i64::from(size);
    let base_y = i64::from(panel.height) - i64::from(size);
    for ly in 0..size {
        let y = base_y + i64::from(ly);
        if y < 0 {
            continue;
        }
        for lx in (size - 1 - ly)..size {
            let x = base_x + i64::from(lx);
            if x < 0 || (lx + ly) % 2 != 0 {
                continue;
            }
            let i = y as usize * stride + x as usize * PANEL_BYTES_PER_PIXEL;
            if let Some(px) = buf.get_mut(i..i + PANEL_BYTES_PER_PIXEL) {
                px.copy_from_slice(&color.to_array());
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/overlay.rs"]
mod tests;
