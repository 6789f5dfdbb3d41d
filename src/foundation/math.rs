use crate::foundation::error::{PlaybackError, PlaybackResult};

/// Straight-alpha blend of one channel over an opaque background, rounded once.
pub(crate) fn blend_over_bg(src: u8, bg: u8, alpha: u8) -> u8 {
    match alpha {
        0 => bg,
        255 => src,
        a => {
            let a = u32::from(a);
            let v = u32::from(src) * a + u32::from(bg) * (255 - a);
            ((v + 127) / 255) as u8
        }
    }
}

pub(crate) fn buffer_len(width: u32, height: u32, bytes_per_pixel: usize) -> PlaybackResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(bytes_per_pixel))
        .ok_or_else(|| PlaybackError::validation("buffer size overflow"))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
