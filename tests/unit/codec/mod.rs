use super::*;
use crate::PlaybackError;
use crate::test_support::{gif_bytes, jpeg_bytes, png_rgba_bytes};

const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn open(kind: AssetKind, bytes: Vec<u8>) -> Box<dyn Codec> {
    match ImageCodecFactory.open(kind, Arc::from(bytes)) {
        Ok(c) => c,
        Err(e) => panic!("open failed: {e}"),
    }
}

#[test]
fn gif_reports_info_and_per_frame_delays() {
    let mut codec = open(
        AssetKind::Gif,
        gif_bytes(4, 2, &[(RED, 100), (GREEN, 150), (BLUE, 200)]),
    );
    assert_eq!(
        codec.info(),
        CodecInfo {
            width: 4,
            height: 2,
            frame_count: 3,
            has_transparency: false,
        }
    );

    let mut buf = vec![0u8; 4 * 2 * 4];
    for (color, delay) in [(RED, 100), (GREEN, 150), (BLUE, 200)] {
        codec.decode_next(&mut buf).unwrap();
        assert_eq!(&buf[..4], &color);
        assert_eq!(codec.frame_delay_ms(), delay);
    }
    assert!(matches!(
        codec.decode_next(&mut buf),
        Err(PlaybackError::EndOfStream)
    ));
}

#[test]
fn reset_after_full_loop_reproduces_first_frame() {
    let mut codec = open(
        AssetKind::Gif,
        gif_bytes(3, 3, &[(RED, 100), (GREEN, 150), (BLUE, 200)]),
    );
    let mut first = vec![0u8; 3 * 3 * 4];
    codec.decode_next(&mut first).unwrap();
    let first_delay = codec.frame_delay_ms();

    let mut buf = vec![0u8; first.len()];
    for _ in 1..codec.info().frame_count {
        codec.decode_next(&mut buf).unwrap();
    }
    codec.reset().unwrap();
    codec.decode_next(&mut buf).unwrap();
    assert_eq!(buf, first);
    assert_eq!(codec.frame_delay_ms(), first_delay);
}

#[test]
fn rgb_decode_flattens_partial_alpha_over_background() {
    let bytes = png_rgba_bytes(2, 1, |x, _| {
        if x == 0 {
            [200, 100, 0, 128]
        } else {
            [1, 2, 3, 0]
        }
    });
    let mut codec = open(AssetKind::Png, bytes);
    let info = codec.info();
    assert!(info.has_transparency);
    assert_eq!(info.preferred_format(), PixelFormat::Rgba8);

    let mut rgb = vec![0u8; 2 * 3];
    codec
        .decode_next_rgb(&mut rgb, Rgb8::new(0, 0, 0))
        .unwrap();
    assert_eq!(&rgb[..3], &[100, 50, 0]);

    codec.reset().unwrap();
    codec
        .decode_next_rgb(&mut rgb, Rgb8::new(10, 20, 30))
        .unwrap();
    assert_eq!(&rgb[3..], &[10, 20, 30]);
}

#[test]
fn jpeg_is_single_frame_and_opaque() {
    let mut codec = open(AssetKind::Jpeg, jpeg_bytes(8, 8, [40, 80, 120]));
    let info = codec.info();
    assert_eq!(info.frame_count, 1);
    assert!(info.is_static());
    assert!(!info.has_transparency);
    assert_eq!(info.preferred_format(), PixelFormat::Rgb8);

    let mut rgb = vec![0u8; 8 * 8 * 3];
    codec.decode_next_rgb(&mut rgb, Rgb8::BLACK).unwrap();
    assert_eq!(codec.frame_delay_ms(), DEFAULT_FRAME_DELAY_MS);
    assert!(matches!(
        codec.decode_next_rgb(&mut rgb, Rgb8::BLACK),
        Err(PlaybackError::EndOfStream)
    ));
}

#[test]
fn still_png_opens_as_one_frame() {
    let codec = open(AssetKind::Png, png_rgba_bytes(5, 4, |_, _| [9, 9, 9, 255]));
    assert_eq!(codec.info().frame_count, 1);
    assert_eq!((codec.info().width, codec.info().height), (5, 4));
}

#[test]
fn garbage_bytes_are_decode_failures() {
    for kind in [AssetKind::Gif, AssetKind::Png, AssetKind::Webp, AssetKind::Jpeg] {
        let Err(err) = ImageCodecFactory.open(kind, Arc::from(vec![1u8, 2, 3, 4, 5])) else {
            panic!("garbage opened as {kind:?}");
        };
        assert!(matches!(err, PlaybackError::DecodeFailure(_)), "{err}");
    }
    let Err(err) = ImageCodecFactory.open(AssetKind::Gif, Arc::from(Vec::new())) else {
        panic!("empty file opened");
    };
    assert!(matches!(err, PlaybackError::DecodeFailure(_)));
}

#[test]
fn wrong_destination_size_is_rejected() {
    let mut codec = open(AssetKind::Gif, gif_bytes(2, 2, &[(RED, 100)]));
    let mut small = vec![0u8; 3];
    assert!(matches!(
        codec.decode_next(&mut small),
        Err(PlaybackError::Validation(_))
    ));
}
