#![cfg(feature = "flif")]

//! Small FLIF files decoded end to end by the built-in decoder.

use std::time::Duration;

use flif_shell_win::codec::{FlifCodec, ImageInfo, default_codec};
use flif_shell_win::properties::{ImageProperties, ImageProperty, PropertyValue};
use flif_shell_win::{CodecError, DecodeError, FrameCodec, FrameSet};

const GREY_3X2: &[u8] = include_bytes!("fixtures/grey_3x2.flif");
const RGB_4X3: &[u8] = include_bytes!("fixtures/rgb_4x3.flif");
const RGBA_3X2: &[u8] = include_bytes!("fixtures/rgba_3x2.flif");
const ANIMATED_2X2: &[u8] = include_bytes!("fixtures/animated_2x2.flif");
const GREY16_2X2: &[u8] = include_bytes!("fixtures/grey16_2x2.flif");

fn info(width: u32, height: u32, channels: u8, bits: u8, frames: u32, loops: u32) -> ImageInfo {
    ImageInfo {
        width,
        height,
        channels,
        bits_per_channel: bits,
        frame_count: frames,
        loop_count: loops,
    }
}

#[test]
fn test_grey_pixels_expand_to_opaque_rgba() {
    let image = FlifCodec.decode_all(GREY_3X2).unwrap();
    assert_eq!(image.channels, 1);
    assert_eq!(image.bits_per_channel, 8);
    assert_eq!(image.loop_count, 0);

    let frame = &image.frames[0];
    assert_eq!((frame.width, frame.height), (3, 2));
    assert_eq!(frame.delay_ms, 0);
    let expected: Vec<u8> = [0u8, 128, 255, 64, 32, 200]
        .iter()
        .flat_map(|&l| [l, l, l, 255])
        .collect();
    assert_eq!(frame.rgba, expected);

    assert_eq!(FlifCodec.read_info(GREY_3X2).unwrap(), info(3, 2, 1, 8, 1, 0));
}

#[test]
fn test_rgb_pixels() {
    let image = FlifCodec.decode_all(RGB_4X3).unwrap();
    let frame = &image.frames[0];
    assert_eq!((frame.width, frame.height), (4, 3));

    let rgb: [[u8; 3]; 12] = [
        [255, 0, 0],
        [0, 255, 0],
        [0, 0, 255],
        [255, 255, 0],
        [10, 20, 30],
        [40, 50, 60],
        [70, 80, 90],
        [100, 110, 120],
        [0, 0, 0],
        [255, 255, 255],
        [128, 64, 32],
        [7, 200, 99],
    ];
    let expected: Vec<u8> = rgb.iter().flat_map(|&[r, g, b]| [r, g, b, 255]).collect();
    assert_eq!(frame.rgba, expected);

    assert_eq!(FlifCodec.read_info(RGB_4X3).unwrap(), info(4, 3, 3, 8, 1, 0));
}

#[test]
fn test_rgba_keeps_alpha_and_hidden_color() {
    let image = FlifCodec.decode_all(RGBA_3X2).unwrap();
    assert_eq!(
        image.frames[0].rgba,
        vec![
            255, 0, 0, 255, 0, 255, 0, 128, 0, 0, 255, 0, //
            12, 34, 56, 78, 200, 100, 50, 255, 1, 2, 3, 4,
        ]
    );
    assert_eq!(FlifCodec.read_info(RGBA_3X2).unwrap(), info(3, 2, 4, 8, 1, 0));
}

#[test]
fn test_fixture_feeds_frame_set_and_properties() {
    let set = FrameSet::decode(RGB_4X3, &FlifCodec).unwrap();
    assert!(!set.is_animated());
    assert_eq!(set.dimensions(), (4, 3));
    assert_eq!(set.total_loop_duration(), Duration::ZERO);

    let props = ImageProperties::from_frame_set(&set);
    assert_eq!(props.value(ImageProperty::Dimensions), PropertyValue::Text("4 x 3".into()));
    assert_eq!(props.value(ImageProperty::BitDepth), PropertyValue::U32(24));

    let header = ImageProperties::from_info(&FlifCodec.read_info(RGBA_3X2).unwrap());
    assert_eq!(header.value(ImageProperty::BitDepth), PropertyValue::U32(32));
}

#[test]
fn test_animated_header_is_read_without_pixels() {
    assert_eq!(FlifCodec.read_info(ANIMATED_2X2).unwrap(), info(2, 2, 4, 8, 3, 2));
    assert!(matches!(
        FlifCodec.decode_all(ANIMATED_2X2),
        Err(CodecError::Unsupported(_))
    ));
    assert!(matches!(
        FrameSet::decode(ANIMATED_2X2, &FlifCodec),
        Err(DecodeError::Unsupported(_))
    ));
}

#[test]
fn test_sixteen_bit_header_reports_depth() {
    let header = FlifCodec.read_info(GREY16_2X2).unwrap();
    assert_eq!(header, info(2, 2, 1, 16, 1, 0));
    assert_eq!(
        ImageProperties::from_info(&header).value(ImageProperty::BitDepth),
        PropertyValue::U32(16)
    );
    assert!(matches!(
        FlifCodec.decode_all(GREY16_2X2),
        Err(CodecError::Unsupported(_))
    ));
}

#[test]
fn test_cut_header_is_truncated() {
    assert_eq!(FlifCodec.read_info(&GREY_3X2[..7]), Err(CodecError::Truncated));
    assert_eq!(FlifCodec.decode_all(&RGB_4X3[..6]), Err(CodecError::Truncated));
}

#[test]
fn test_default_codec_decodes_fixture() {
    let codec = default_codec();
    let image = codec.decode_all(GREY_3X2).unwrap();
    assert_eq!(image.frames[0].rgba[4..8], [128, 128, 128, 255]);
    assert_eq!(codec.read_info(ANIMATED_2X2).unwrap().frame_count, 3);
}
