use super::*;
use crate::foundation::core::{PanelSize, Rotation};

fn rgba_frame(w: u32, h: u32, px: &[[u8; 4]]) -> NativeFrame {
    let mut f = NativeFrame::new(w, h, PixelFormat::Rgba8).unwrap();
    for (d, s) in f.pixels.chunks_exact_mut(4).zip(px) {
        d.copy_from_slice(s);
    }
    f
}

fn pixel(buf: &[u8], width: u32, x: u32, y: u32) -> [u8; 3] {
    let i = ((y * width + x) as usize) * 3;
    [buf[i], buf[i + 1], buf[i + 2]]
}

#[test]
fn alpha_extremes_and_partial_blend() {
    let src = rgba_frame(
        3,
        1,
        &[[10, 20, 30, 0], [200, 100, 50, 255], [255, 0, 0, 128]],
    );
    let panel = PanelSize::new(3, 1).unwrap();
    let t = UpscaleTables::build(3, 1, panel, Rotation::Deg0).unwrap();
    let bg = Rgb8::new(0, 0, 255);
    let mut out = vec![0u8; 9];
    render_rows(&src, &t, bg, 0, 1, &mut out).unwrap();

    assert_eq!(pixel(&out, 3, 0, 0), [0, 0, 255]);
    assert_eq!(pixel(&out, 3, 1, 0), [200, 100, 50]);
    // (255*128 + 0*127) / 255 = 128, (0*128 + 255*127) / 255 = 127
    assert_eq!(pixel(&out, 3, 2, 0), [128, 0, 127]);
}

#[test]
fn borders_use_background_color() {
    let src = rgba_frame(2, 1, &[[9, 9, 9, 255], [9, 9, 9, 255]]);
    let panel = PanelSize::new(4, 4).unwrap();
    let t = UpscaleTables::build(2, 1, panel, Rotation::Deg0).unwrap();
    let bg = Rgb8::new(1, 2, 3);
    let dst = FrameBuffer::new(panel, Rgb8::BLACK).unwrap();
    render_frame(&src, &t, bg, &dst).unwrap();
    let out = dst.to_vec();

    // 2x1 scales to 4x2, centered vertically at rows 1..3.
    assert_eq!(pixel(&out, 4, 0, 0), [1, 2, 3]);
    assert_eq!(pixel(&out, 4, 3, 3), [1, 2, 3]);
    assert_eq!(pixel(&out, 4, 0, 1), [9, 9, 9]);
    assert_eq!(pixel(&out, 4, 3, 2), [9, 9, 9]);
}

#[test]
fn half_turn_mirrors_both_axes() {
    let src = NativeFrame {
        width: 2,
        height: 2,
        format: PixelFormat::Rgb8,
        pixels: vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4],
    };
    let panel = PanelSize::new(2, 2).unwrap();
    let t = UpscaleTables::build(2, 2, panel, Rotation::Deg180).unwrap();
    let dst = FrameBuffer::new(panel, Rgb8::BLACK).unwrap();
    render_frame(&src, &t, Rgb8::BLACK, &dst).unwrap();
    assert_eq!(dst.to_vec(), vec![4, 4, 4, 3, 3, 3, 2, 2, 2, 1, 1, 1]);
}

#[test]
fn quarter_turn_moves_top_row_to_right_column() {
    // Source row 0 is [1, 2]; row 1 is [3, 4].
    let src = NativeFrame {
        width: 2,
        height: 2,
        format: PixelFormat::Rgb8,
        pixels: vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4],
    };
    let panel = PanelSize::new(2, 2).unwrap();
    let t = UpscaleTables::build(2, 2, panel, Rotation::Deg90).unwrap();
    let dst = FrameBuffer::new(panel, Rgb8::BLACK).unwrap();
    render_frame(&src, &t, Rgb8::BLACK, &dst).unwrap();
    let out = dst.to_vec();
    assert_eq!(pixel(&out, 2, 1, 0), [1, 1, 1]);
    assert_eq!(pixel(&out, 2, 1, 1), [2, 2, 2]);
    assert_eq!(pixel(&out, 2, 0, 0), [3, 3, 3]);
    assert_eq!(pixel(&out, 2, 0, 1), [4, 4, 4]);
}

#[test]
fn mismatched_band_length_is_rejected() {
    let src = rgba_frame(1, 1, &[[0, 0, 0, 255]]);
    let panel = PanelSize::new(2, 2).unwrap();
    let t = UpscaleTables::build(1, 1, panel, Rotation::Deg0).unwrap();
    let mut out = vec![0u8; 5];
    assert!(render_rows(&src, &t, Rgb8::BLACK, 0, 1, &mut out).is_err());
}

#[test]
fn tables_for_another_source_are_rejected() {
    let src = rgba_frame(1, 1, &[[0, 0, 0, 255]]);
    let panel = PanelSize::new(2, 2).unwrap();
    let t = UpscaleTables::build(2, 2, panel, Rotation::Deg0).unwrap();
    let dst = FrameBuffer::new(panel, Rgb8::BLACK).unwrap();
    assert!(render_frame(&src, &t, Rgb8::BLACK, &dst).is_err());
}
