//! Read-only image properties shown in Explorer's details pane and tooltips.

use crate::codec::{DecodedImage, ImageInfo};
use crate::frames::FrameSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageProperty {
    HorizontalSize,
    VerticalSize,
    Dimensions,
    BitDepth,
}

impl ImageProperty {
    /// Order in which the property store enumerates its keys.
    pub const ALL: [ImageProperty; 4] = [
        ImageProperty::HorizontalSize,
        ImageProperty::VerticalSize,
        ImageProperty::Dimensions,
        ImageProperty::BitDepth,
    ];

    /// Canonical property system name.
    pub fn canonical_name(self) -> &'static str {
        match self {
            ImageProperty::HorizontalSize => "System.Image.HorizontalSize",
            ImageProperty::VerticalSize => "System.Image.VerticalSize",
            ImageProperty::Dimensions => "System.Image.Dimensions",
            ImageProperty::BitDepth => "System.Image.BitDepth",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    U32(u32),
    Text(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageProperties {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u32,
}

impl ImageProperties {
    pub fn from_info(info: &ImageInfo) -> Self {
        Self {
            width: info.width,
            height: info.height,
            bit_depth: u32::from(info.bits_per_channel) * u32::from(info.channels),
        }
    }

    pub fn from_decoded(image: &DecodedImage) -> Option<Self> {
        let first = image.frames.first()?;
        Some(Self {
            width: first.width,
            height: first.height,
            bit_depth: u32::from(image.bits_per_channel) * u32::from(image.channels),
        })
    }

    pub fn from_frame_set(frames: &FrameSet) -> Self {
        let (width, height) = frames.dimensions();
        Self {
            width,
            height,
            bit_depth: u32::from(frames.bits_per_channel()) * u32::from(frames.channels()),
        }
    }

    pub fn value(&self, property: ImageProperty) -> PropertyValue {
        match property {
            ImageProperty::HorizontalSize => PropertyValue::U32(self.width),
            ImageProperty::VerticalSize => PropertyValue::U32(self.height),
            ImageProperty::Dimensions => {
                PropertyValue::Text(format!("{} x {}", self.width, self.height))
            }
            ImageProperty::BitDepth => PropertyValue::U32(self.bit_depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DecodedFrame;

    fn decoded(channels: u8) -> DecodedImage {
        DecodedImage {
            frames: vec![DecodedFrame {
                width: 640,
                height: 480,
                rgba: Vec::new(),
                delay_ms: 0,
            }],
            loop_count: 0,
            channels,
            bits_per_channel: 8,
        }
    }

    #[test]
    fn test_values() {
        let props = ImageProperties::from_decoded(&decoded(4)).unwrap();
        assert_eq!(
            props.value(ImageProperty::Dimensions),
            PropertyValue::Text("640 x 480".into())
        );
        assert_eq!(props.value(ImageProperty::HorizontalSize), PropertyValue::U32(640));
        assert_eq!(props.value(ImageProperty::VerticalSize), PropertyValue::U32(480));
        assert_eq!(props.value(ImageProperty::BitDepth), PropertyValue::U32(32));
    }

    #[test]
    fn test_gray_bit_depth() {
        let props = ImageProperties::from_decoded(&decoded(1)).unwrap();
        assert_eq!(props.bit_depth, 8);
    }

    #[test]
    fn test_from_header_info() {
        let info = ImageInfo {
            width: 16,
            height: 9,
            channels: 3,
            bits_per_channel: 8,
            frame_count: 1,
            loop_count: 0,
        };
        let props = ImageProperties::from_info(&info);
        assert_eq!(props.value(ImageProperty::Dimensions), PropertyValue::Text("16 x 9".into()));
        assert_eq!(props.bit_depth, 24);
    }

    #[test]
    fn test_no_frames() {
        let mut image = decoded(3);
        image.frames.clear();
        assert!(ImageProperties::from_decoded(&image).is_none());
    }
}
