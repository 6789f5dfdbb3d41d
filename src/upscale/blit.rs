use crate::codec::PixelFormat;
use crate::foundation::core::Rgb8;
use crate::foundation::error::{PlaybackError, PlaybackResult};
use crate::foundation::math::blend_over_bg;
use crate::upscale::frame::{NativeFrame, PANEL_BYTES_PER_PIXEL};
use crate::upscale::lookup::UpscaleTables;

/// Rasterize panel rows `[row_start, row_end)` of `src` into `out`.
///
/// `out` holds exactly those rows. Rows and columns outside the scaled area are filled with
/// `background`; transparent source pixels are composited over it.
pub(crate) fn render_rows(
    src: &NativeFrame,
    tables: &UpscaleTables,
    background: Rgb8,
    row_start: u32,
    row_end: u32,
    out: &mut [u8],
) -> PlaybackResult<()> {
    if !tables.matches(src.width, src.height, tables.rotation) {
        return Err(PlaybackError::validation(format!(
            "tables built for {}x{}, frame is {}x{}",
            tables.src_width, tables.src_height, src.width, src.height
        )));
    }
    let width = tables.panel.width as usize;
    let stride = width * PANEL_BYTES_PER_PIXEL;
    let rows = row_end.saturating_sub(row_start) as usize;
    if out.len() != stride * rows {
        return Err(PlaybackError::validation(format!(
            "band holds {} bytes, expected {}",
            out.len(),
            stride * rows
        )));
    }

    let bg = background.to_array();
    let x0 = tables.offset_x as usize;
    let x1 = x0 + tables.scaled_width as usize;
    let y0 = tables.offset_y;
    let y1 = y0 + tables.scaled_height;
    let blend = src.format == PixelFormat::Rgba8;

    for (row, line) in (row_start..row_end).zip(out.chunks_exact_mut(stride)) {
        if row < y0 || row >= y1 {
            fill_line(line, bg);
            continue;
        }
        let local_y = row - y0;
        fill_line(&mut line[..x0 * PANEL_BYTES_PER_PIXEL], bg);
        fill_line(&mut line[x1 * PANEL_BYTES_PER_PIXEL..], bg);

        let inner = &mut line[x0 * PANEL_BYTES_PER_PIXEL..x1 * PANEL_BYTES_PER_PIXEL];
        for (local_x, px) in inner.chunks_exact_mut(PANEL_BYTES_PER_PIXEL).enumerate() {
            let (sx, sy) = tables.source_xy(local_x as u32, local_y);
            let s = src.rgba_at(sx, sy);
            if blend {
                px[0] = blend_over_bg(s[0], bg[0], s[3]);
                px[1] = blend_over_bg(s[1], bg[1], s[3]);
                px[2] = blend_over_bg(s[2], bg[2], s[3]);
            } else {
                px.copy_from_slice(&s[..3]);
            }
        }
    }
    Ok(())
}

/// Single-threaded upscale of a whole frame.
#[cfg(test)]
pub(crate) fn render_frame(
    src: &NativeFrame,
    tables: &UpscaleTables,
    background: Rgb8,
    dst: &FrameBuffer,
) -> PlaybackResult<()> {
    for band in 0..2 {
        let (start, end) = dst.band_rows(band);
        let mut px = dst.band(band).lock();
        render_rows(src, tables, background, start, end, &mut px)?;
    }
    Ok(())
}

fn fill_line(line: &mut [u8], bg: [u8; 3]) {
    for p in line.chunks_exact_mut(PANEL_BYTES_PER_PIXEL) {
        p.copy_from_slice(&bg);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/upscale/blit.rs"]
mod tests;
