use std::time::Duration;

use crate::codec::{DecodedImage, FrameCodec};
use crate::error::{CopyError, DecodeError};

/// A decoded frame: RGBA8 pixels, row-major, plus how long it stays visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub delay: Duration,
}

/// Ordered frames of one image together with its loop count.
///
/// Always holds at least one frame. A single frame is a still image and is
/// never animated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSet {
    frames: Vec<Frame>,
    loop_count: u32,
    total_loop_ms: u64,
    channels: u8,
    bits_per_channel: u8,
}

impl FrameSet {
    /// Runs `codec` over `bytes` once and validates what comes back.
    pub fn decode(bytes: &[u8], codec: &dyn FrameCodec) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Truncated);
        }
        let image = codec.decode_all(bytes)?;
        Self::from_decoded(image)
    }

    pub fn from_decoded(image: DecodedImage) -> Result<Self, DecodeError> {
        let frames = image
            .frames
            .into_iter()
            .map(|f| Frame {
                width: f.width,
                height: f.height,
                pixels: f.rgba,
                delay: Duration::from_millis(u64::from(f.delay_ms)),
            })
            .collect();
        Self::validated(frames, image.loop_count, image.channels, image.bits_per_channel)
    }

    /// Builds a set directly from frames, mostly for hosts that decode elsewhere.
    pub fn from_frames(frames: Vec<Frame>, loop_count: u32) -> Result<Self, DecodeError> {
        Self::validated(frames, loop_count, 4, 8)
    }

    fn validated(
        frames: Vec<Frame>,
        loop_count: u32,
        channels: u8,
        bits_per_channel: u8,
    ) -> Result<Self, DecodeError> {
        if frames.is_empty() {
            return Err(DecodeError::Truncated);
        }
        for (index, f) in frames.iter().enumerate() {
            let expected = (f.width as usize)
                .checked_mul(f.height as usize)
                .and_then(|n| n.checked_mul(4));
            if f.width == 0 || f.height == 0 || expected != Some(f.pixels.len()) {
                return Err(DecodeError::Malformed(format!(
                    "frame {index}: {}x{} with {} pixel bytes",
                    f.width,
                    f.height,
                    f.pixels.len()
                )));
            }
        }

        let total_loop_ms = sum_delays_ms(&frames);
        Ok(Self {
            frames,
            loop_count,
            total_loop_ms,
            channels,
            bits_per_channel,
        })
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Never true for a constructed set; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn bits_per_channel(&self) -> u8 {
        self.bits_per_channel
    }

    /// Sum of all frame delays.
    pub fn total_loop_duration(&self) -> Duration {
        Duration::from_millis(self.total_loop_ms)
    }

    pub(crate) fn total_loop_ms(&self) -> u64 {
        self.total_loop_ms
    }

    /// Cumulative delay of every frame strictly before `index`.
    pub fn delay_before(&self, index: usize) -> Duration {
        let before = &self.frames[..index.min(self.frames.len())];
        Duration::from_millis(sum_delays_ms(before))
    }

    /// Shortest frame delay; zero delays count.
    pub fn min_delay(&self) -> Duration {
        self.frames
            .iter()
            .map(|f| f.delay)
            .min()
            .unwrap_or(Duration::ZERO)
    }

    /// First frame dimensions; used for layout and properties.
    pub fn dimensions(&self) -> (u32, u32) {
        let first = &self.frames[0];
        (first.width, first.height)
    }
}

pub(crate) fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn sum_delays_ms(frames: &[Frame]) -> u64 {
    frames
        .iter()
        .map(|f| duration_ms(f.delay))
        .fold(0, u64::saturating_add)
}

/// Sub-rectangle of a frame, in pixels. Negative fields are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Frame {
    /// Copies `rect` (the whole frame when `None`) into `out` as RGBA8 rows
    /// spaced `stride` bytes apart.
    pub fn copy_pixels(
        &self,
        rect: Option<PixelRect>,
        stride: usize,
        out: &mut [u8],
    ) -> Result<(), CopyError> {
        let (x, y, w, h) = match rect {
            None => (0, 0, self.width as usize, self.height as usize),
            Some(r) => {
                let field = |v: i32| usize::try_from(v).map_err(|_| CopyError::InvalidRect);
                (field(r.x)?, field(r.y)?, field(r.width)?, field(r.height)?)
            }
        };
        if x + w > self.width as usize || y + h > self.height as usize {
            return Err(CopyError::InvalidRect);
        }
        if w == 0 || h == 0 {
            return Ok(());
        }

        let row_bytes = w * 4;
        if stride < row_bytes {
            return Err(CopyError::StrideTooSmall);
        }
        let needed = stride * (h - 1) + row_bytes;
        if out.len() < needed {
            return Err(CopyError::BufferTooSmall {
                needed,
                got: out.len(),
            });
        }

        let src_stride = self.width as usize * 4;
        for row in 0..h {
            let src = (y + row) * src_stride + x * 4;
            let dst = row * stride;
            out[dst..dst + row_bytes].copy_from_slice(&self.pixels[src..src + row_bytes]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DecodedFrame;
    use crate::error::CodecError;

    struct Fixed(Result<DecodedImage, CodecError>);

    impl FrameCodec for Fixed {
        fn decode_all(&self, _bytes: &[u8]) -> Result<DecodedImage, CodecError> {
            self.0.clone()
        }
    }

    fn image(delays: &[u32], loop_count: u32) -> DecodedImage {
        DecodedImage {
            frames: delays
                .iter()
                .map(|&delay_ms| DecodedFrame {
                    width: 2,
                    height: 1,
                    rgba: vec![0; 8],
                    delay_ms,
                })
                .collect(),
            loop_count,
            channels: 4,
            bits_per_channel: 8,
        }
    }

    #[test]
    fn test_decode_keeps_delays_and_loop_count() {
        let codec = Fixed(Ok(image(&[40, 0, 60], 3)));
        let set = FrameSet::decode(b"FLIF", &codec).unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.loop_count(), 3);
        assert_eq!(set.frames()[1].delay, Duration::ZERO);
        assert_eq!(set.total_loop_duration(), Duration::from_millis(100));
        assert_eq!(set.min_delay(), Duration::ZERO);
    }

    #[test]
    fn test_empty_input_is_truncated() {
        let codec = Fixed(Ok(image(&[10], 0)));
        assert_eq!(FrameSet::decode(&[], &codec), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_zero_frames_is_truncated() {
        let codec = Fixed(Ok(image(&[], 0)));
        assert_eq!(FrameSet::decode(b"FLIF", &codec), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_codec_errors_are_mapped() {
        let codec = Fixed(Err(CodecError::Malformed("bad header".into())));
        assert_eq!(
            FrameSet::decode(b"FLIF", &codec),
            Err(DecodeError::Malformed("bad header".into()))
        );

        let codec = Fixed(Err(CodecError::Truncated));
        assert_eq!(FrameSet::decode(b"FLIF", &codec), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_pixel_length_mismatch_is_malformed() {
        let mut img = image(&[10, 10], 0);
        img.frames[1].rgba.pop();
        let codec = Fixed(Ok(img));
        assert!(matches!(
            FrameSet::decode(b"FLIF", &codec),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_delay_before() {
        let set = FrameSet::from_decoded(image(&[100, 50, 25], 0)).unwrap();
        assert_eq!(set.delay_before(0), Duration::ZERO);
        assert_eq!(set.delay_before(1), Duration::from_millis(100));
        assert_eq!(set.delay_before(3), Duration::from_millis(175));
    }

    #[test]
    fn test_from_frames_rejects_bad_pixel_buffers() {
        let ok = Frame {
            width: 2,
            height: 1,
            pixels: vec![0; 8],
            delay: Duration::from_millis(10),
        };
        let short = Frame {
            pixels: vec![0; 7],
            ..ok.clone()
        };
        let empty = Frame {
            width: 0,
            pixels: Vec::new(),
            ..ok.clone()
        };

        assert!(matches!(
            FrameSet::from_frames(vec![ok.clone(), short], 0),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            FrameSet::from_frames(vec![empty], 0),
            Err(DecodeError::Malformed(_))
        ));
        assert_eq!(FrameSet::from_frames(Vec::new(), 0), Err(DecodeError::Truncated));
        assert!(FrameSet::from_frames(vec![ok], 0).is_ok());
    }

    #[test]
    fn test_huge_delays_saturate() {
        let frame = |delay| Frame {
            width: 1,
            height: 1,
            pixels: vec![0; 4],
            delay,
        };
        let set = FrameSet::from_frames(
            vec![frame(Duration::MAX), frame(Duration::MAX), frame(Duration::from_millis(5))],
            0,
        )
        .unwrap();

        assert_eq!(set.total_loop_ms(), u64::MAX);
        assert_eq!(set.delay_before(2), Duration::from_millis(u64::MAX));
        assert_eq!(set.delay_before(99), Duration::from_millis(u64::MAX));
    }

    fn gradient(width: u32, height: u32) -> Frame {
        let pixels = (0..width * height)
            .flat_map(|i| [i as u8, 0, 0, 255])
            .collect();
        Frame {
            width,
            height,
            pixels,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_copy_pixels_sub_rect_with_padded_stride() {
        let frame = gradient(3, 3);
        let mut out = vec![0xAA; 12 + 8];
        let rect = PixelRect {
            x: 1,
            y: 1,
            width: 2,
            height: 2,
        };
        frame.copy_pixels(Some(rect), 12, &mut out).unwrap();

        assert_eq!(&out[0..8], &[4, 0, 0, 255, 5, 0, 0, 255]);
        assert_eq!(&out[8..12], &[0xAA; 4]);
        assert_eq!(&out[12..20], &[7, 0, 0, 255, 8, 0, 0, 255]);
    }

    #[test]
    fn test_copy_pixels_whole_frame() {
        let frame = gradient(2, 2);
        let mut out = vec![0; 16];
        frame.copy_pixels(None, 8, &mut out).unwrap();
        assert_eq!(out, frame.pixels);
    }

    #[test]
    fn test_copy_pixels_rejects_bad_arguments() {
        let frame = gradient(2, 2);
        let mut out = vec![0; 16];
        let rect = |x, y, width, height| {
            Some(PixelRect {
                x,
                y,
                width,
                height,
            })
        };

        assert_eq!(frame.copy_pixels(rect(-1, 0, 1, 1), 8, &mut out), Err(CopyError::InvalidRect));
        assert_eq!(frame.copy_pixels(rect(1, 0, 2, 1), 8, &mut out), Err(CopyError::InvalidRect));
        assert_eq!(frame.copy_pixels(None, 4, &mut out), Err(CopyError::StrideTooSmall));
        assert_eq!(
            frame.copy_pixels(None, 8, &mut out[..15]),
            Err(CopyError::BufferTooSmall { needed: 16, got: 15 })
        );
        assert_eq!(frame.copy_pixels(rect(0, 0, 0, 0), 0, &mut []), Ok(()));
    }
}
