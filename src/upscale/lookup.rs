use crate::foundation::core::{PanelSize, Rotation};
use crate::foundation::error::{PlaybackError, PlaybackResult};

/// Nearest-neighbour mapping from panel pixels back to source pixels.
///
/// The source is scaled to fit the panel while keeping its aspect ratio and centered; the area
/// outside `[offset, offset + scaled)` is border. Tables index the *rotated* source: `col_map`
/// maps each local destination column to a rotated-source column, `row_map` does the same for
/// rows, and [`UpscaleTables::source_xy`] undoes the rotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpscaleTables {
    /// Rotation these tables were built for.
    pub rotation: Rotation,
    /// Source width in pixels.
    pub src_width: u32,
    /// Source height in pixels.
    pub src_height: u32,
    /// Panel the tables target.
    pub panel: PanelSize,
    /// Left edge of the scaled image on the panel.
    pub offset_x: u32,
    /// Top edge of the scaled image on the panel.
    pub offset_y: u32,
    /// Width of the scaled image on the panel.
    pub scaled_width: u32,
    /// Height of the scaled image on the panel.
    pub scaled_height: u32,
    /// `true` when the scaled image does not cover the whole panel.
    pub has_borders: bool,
    col_map: Vec<u32>,
    row_map: Vec<u32>,
}

impl UpscaleTables {
    /// Build tables for a `src_width x src_height` source shown on `panel` at `rotation`.
    pub fn build(
        src_width: u32,
        src_height: u32,
        panel: PanelSize,
        rotation: Rotation,
    ) -> PlaybackResult<Self> {
        if src_width == 0 || src_height == 0 {
            return Err(PlaybackError::validation("source size must be non-zero"));
        }
        if panel.width == 0 || panel.height == 0 {
            return Err(PlaybackError::validation("panel size must be non-zero"));
        }

        let (rw, rh) = if rotation.swaps_axes() {
            (u64::from(src_height), u64::from(src_width))
        } else {
            (u64::from(src_width), u64::from(src_height))
        };
        let (pw, ph) = (u64::from(panel.width), u64::from(panel.height));

        // Fit: whichever axis is the tighter constraint fills the panel.
        let (scaled_w, scaled_h) = if rw * ph >= rh * pw {
            (pw, ((rh * pw + rw / 2) / rw).clamp(1, ph))
        } else {
            (((rw * ph + rh / 2) / rh).clamp(1, pw), ph)
        };
        let offset_x = ((pw - scaled_w) / 2) as u32;
        let offset_y = ((ph - scaled_h) / 2) as u32;

        let col_map = (0..scaled_w)
            .map(|x| ((x * rw) / scaled_w).min(rw - 1) as u32)
            .collect();
        let row_map = (0..scaled_h)
            .map(|y| ((y * rh) / scaled_h).min(rh - 1) as u32)
            .collect();

        Ok(Self {
            rotation,
            src_width,
            src_height,
            panel,
            offset_x,
            offset_y,
            scaled_width: scaled_w as u32,
            scaled_height: scaled_h as u32,
            has_borders: scaled_w != pw || scaled_h != ph,
            col_map,
            row_map,
        })
    }

    /// `true` when these tables still fit a source of this size at this rotation.
    pub fn matches(&self, src_width: u32, src_height: u32, rotation: Rotation) -> bool {
        self.src_width == src_width && self.src_height == src_height && self.rotation == rotation
    }

    /// Source pixel shown at local (inside the scaled area) coordinates.
    #[inline]
    pub fn source_xy(&self, local_x: u32, local_y: u32) -> (u32, u32) {
        let rx = self.col_map[local_x as usize];
        let ry = self.row_map[local_y as usize];
        match self.rotation {
            Rotation::Deg0 => (rx, ry),
            Rotation::Deg90 => (ry, self.src_height - 1 - rx),
            Rotation::Deg180 => (self.src_width - 1 - rx, self.src_height - 1 - ry),
            Rotation::Deg270 => (self.src_width - 1 - ry, rx),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/upscale/lookup.rs"]
mod tests;
