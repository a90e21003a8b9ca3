//! Boundary to the external FLIF bit-stream decoder.
//!
//! The rest of the crate only sees [`FrameCodec`]. Two backends exist: the
//! reference decoder DLL loaded at run time on Windows (see
//! `libflif.rs`) and the pure-Rust `flif` crate behind the `flif` cargo
//! feature. [`default_codec`] chains them.

use crate::error::CodecError;

/// One frame as produced by the codec, already expanded to RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub delay_ms: u32,
}

/// Full codec output for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub frames: Vec<DecodedFrame>,
    /// 0 means loop forever.
    pub loop_count: u32,
    /// Channel count of the source stream (1, 3 or 4).
    pub channels: u8,
    pub bits_per_channel: u8,
}

/// Header facts, available without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bits_per_channel: u8,
    pub frame_count: u32,
    /// 0 means loop forever.
    pub loop_count: u32,
}

pub trait FrameCodec {
    fn decode_all(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError>;

    /// Reads only what is needed for [`ImageInfo`]. The default decodes fully.
    fn read_info(&self, bytes: &[u8]) -> Result<ImageInfo, CodecError> {
        info_from_decoded(&self.decode_all(bytes)?)
    }
}

/// Header facts of an already decoded image, taken from its first frame.
pub fn info_from_decoded(image: &DecodedImage) -> Result<ImageInfo, CodecError> {
    let first = image.frames.first().ok_or(CodecError::Truncated)?;
    Ok(ImageInfo {
        width: first.width,
        height: first.height,
        channels: image.channels,
        bits_per_channel: image.bits_per_channel,
        frame_count: u32::try_from(image.frames.len()).unwrap_or(u32::MAX),
        loop_count: image.loop_count,
    })
}

impl<T: FrameCodec + ?Sized> FrameCodec for &T {
    fn decode_all(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        (**self).decode_all(bytes)
    }

    fn read_info(&self, bytes: &[u8]) -> Result<ImageInfo, CodecError> {
        (**self).read_info(bytes)
    }
}

/// "FLIF" magic at offset 0.
pub const FLIF_MAGIC: &[u8; 4] = b"FLIF";

/// Cheap signature check used before handing data to a codec.
pub fn has_flif_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(FLIF_MAGIC)
}

/// Tries each codec in order. A codec that reports
/// [`CodecError::Unsupported`] hands the stream to the next one; any other
/// result is final.
pub struct CodecChain {
    codecs: Vec<Box<dyn FrameCodec>>,
}

impl CodecChain {
    pub fn new(codecs: Vec<Box<dyn FrameCodec>>) -> Self {
        Self { codecs }
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    fn first_supported<T>(
        &self,
        mut attempt: impl FnMut(&dyn FrameCodec) -> Result<T, CodecError>,
    ) -> Result<T, CodecError> {
        let mut last = CodecError::Unsupported("no FLIF decoder available".to_string());
        for codec in &self.codecs {
            match attempt(codec.as_ref()) {
                Err(CodecError::Unsupported(reason)) => {
                    last = CodecError::Unsupported(reason);
                }
                result => return result,
            }
        }
        Err(last)
    }
}

impl FrameCodec for CodecChain {
    fn decode_all(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        self.first_supported(|codec| codec.decode_all(bytes))
    }

    fn read_info(&self, bytes: &[u8]) -> Result<ImageInfo, CodecError> {
        self.first_supported(|codec| codec.read_info(bytes))
    }
}

/// Codec used by the shell handlers: the reference decoder DLL when it can
/// be loaded, then the built-in decoder.
pub fn default_codec() -> Box<dyn FrameCodec> {
    #[allow(unused_mut)]
    let mut codecs: Vec<Box<dyn FrameCodec>> = Vec::new();
    #[cfg(windows)]
    if let Some(lib) = crate::libflif::LibFlif::shared() {
        codecs.push(Box::new(lib));
    }
    #[cfg(feature = "flif")]
    codecs.push(Box::new(FlifCodec));
    Box::new(CodecChain::new(codecs))
}

/// Expands 1/2/3/4-channel 8-bit pixels to RGBA8.
pub fn expand_to_rgba(raw: &[u8], channels: usize) -> Result<Vec<u8>, CodecError> {
    if channels == 0 || raw.len() % channels != 0 {
        return Err(CodecError::Malformed(format!(
            "pixel buffer of {} bytes does not match {} channels",
            raw.len(),
            channels
        )));
    }
    let mut out = Vec::with_capacity(raw.len() / channels * 4);
    match channels {
        1 => {
            for &l in raw {
                out.extend_from_slice(&[l, l, l, 0xFF]);
            }
        }
        2 => {
            for px in raw.chunks_exact(2) {
                out.extend_from_slice(&[px[0], px[0], px[0], px[1]]);
            }
        }
        3 => {
            for px in raw.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 0xFF]);
            }
        }
        4 => out.extend_from_slice(raw),
        n => {
            return Err(CodecError::Unsupported(format!("{n} channels")));
        }
    }
    Ok(out)
}

#[cfg(feature = "flif")]
pub use flif_codec::FlifCodec;

#[cfg(feature = "flif")]
mod flif_codec {
    use super::{DecodedFrame, DecodedImage, FrameCodec, ImageInfo, expand_to_rgba};
    use crate::error::CodecError;
    use flif::components::{BytesPerChannel, ColorSpace};
    use std::io::{Cursor, ErrorKind};

    /// Adapter over the pure-Rust `flif` decoder.
    ///
    /// The decoder reads every header, so [`ImageInfo`] is exact for any
    /// stream, but it only produces pixels for non-interlaced 8-bit stills.
    /// Anything else decodes to [`CodecError::Unsupported`].
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FlifCodec;

    struct Opened<'a> {
        decoder: flif::Decoder<Cursor<&'a [u8]>>,
        info: ImageInfo,
        first_delay_ms: u32,
    }

    impl FlifCodec {
        fn open(bytes: &[u8]) -> Result<Opened<'_>, CodecError> {
            if bytes.len() < super::FLIF_MAGIC.len() {
                return Err(CodecError::Truncated);
            }
            if !super::has_flif_signature(bytes) {
                return Err(CodecError::Malformed("missing FLIF signature".to_string()));
            }

            let decoder = flif::Decoder::new(Cursor::new(bytes)).map_err(map_flif_error)?;
            let flif_info = decoder.info();
            let header = &flif_info.header;
            let second = &flif_info.second_header;

            let bits_per_channel = match header.bytes_per_channel {
                BytesPerChannel::One => 8,
                BytesPerChannel::Two => 16,
                BytesPerChannel::Custom => second.bits_per_pixel.iter().copied().max().unwrap_or(8),
            };
            let channels = match header.channels {
                ColorSpace::Monochrome => 1u8,
                ColorSpace::RGB => 3,
                ColorSpace::RGBA => 4,
            };
            let info = ImageInfo {
                width: header.width,
                height: header.height,
                channels,
                bits_per_channel,
                frame_count: header.num_frames,
                loop_count: second.loops.map_or(0, u32::from),
            };
            if info.width == 0 || info.height == 0 {
                return Err(CodecError::Malformed("zero-sized image".to_string()));
            }
            let first_delay_ms = second
                .frame_delay
                .as_ref()
                .and_then(|delays| delays.first())
                .map_or(0, |&ms| u32::from(ms));

            Ok(Opened {
                decoder,
                info,
                first_delay_ms,
            })
        }
    }

    impl FrameCodec for FlifCodec {
        fn decode_all(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
            let Opened {
                decoder,
                info,
                first_delay_ms,
            } = Self::open(bytes)?;
            if info.frame_count > 1 {
                return Err(CodecError::Unsupported(format!(
                    "animation with {} frames",
                    info.frame_count
                )));
            }
            if info.bits_per_channel != 8 {
                return Err(CodecError::Unsupported(format!(
                    "{} bits per channel",
                    info.bits_per_channel
                )));
            }

            let raw = decoder
                .decode_image()
                .map_err(map_flif_error)?
                .into_raw()
                .into_vec();

            let pixels = info.width as usize * info.height as usize;
            if raw.len() % pixels != 0 {
                return Err(CodecError::Truncated);
            }
            let rgba = expand_to_rgba(&raw, raw.len() / pixels)?;

            Ok(DecodedImage {
                frames: vec![DecodedFrame {
                    width: info.width,
                    height: info.height,
                    rgba,
                    delay_ms: first_delay_ms,
                }],
                loop_count: info.loop_count,
                channels: info.channels,
                bits_per_channel: info.bits_per_channel,
            })
        }

        fn read_info(&self, bytes: &[u8]) -> Result<ImageInfo, CodecError> {
            Self::open(bytes).map(|opened| opened.info)
        }
    }

    fn map_flif_error(err: flif::Error) -> CodecError {
        match err {
            flif::Error::Io(io) if io.kind() == ErrorKind::UnexpectedEof => CodecError::Truncated,
            flif::Error::Unimplemented(..) | flif::Error::UnimplementedTransformation(..) => {
                CodecError::Unsupported(err.to_string())
            }
            err => CodecError::Malformed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_check() {
        assert!(has_flif_signature(b"FLIF\x44\x01"));
        assert!(!has_flif_signature(b"GIF89a"));
        assert!(!has_flif_signature(b"FL"));
    }

    #[test]
    fn test_expand_gray_and_rgb() {
        assert_eq!(expand_to_rgba(&[7, 9], 1).unwrap(), vec![7, 7, 7, 255, 9, 9, 9, 255]);
        assert_eq!(expand_to_rgba(&[1, 2, 3], 3).unwrap(), vec![1, 2, 3, 255]);
        assert_eq!(expand_to_rgba(&[5, 128], 2).unwrap(), vec![5, 5, 5, 128]);
    }

    struct Still;

    impl FrameCodec for Still {
        fn decode_all(&self, _bytes: &[u8]) -> Result<DecodedImage, CodecError> {
            Ok(DecodedImage {
                frames: vec![DecodedFrame {
                    width: 3,
                    height: 2,
                    rgba: vec![0; 24],
                    delay_ms: 0,
                }],
                loop_count: 0,
                channels: 3,
                bits_per_channel: 8,
            })
        }
    }

    #[test]
    fn test_default_read_info_uses_first_frame() {
        let info = Still.read_info(b"").unwrap();
        assert_eq!(
            info,
            ImageInfo {
                width: 3,
                height: 2,
                channels: 3,
                bits_per_channel: 8,
                frame_count: 1,
                loop_count: 0,
            }
        );
    }

    struct Refuses(&'static str);

    impl FrameCodec for Refuses {
        fn decode_all(&self, _bytes: &[u8]) -> Result<DecodedImage, CodecError> {
            Err(CodecError::Unsupported(self.0.to_string()))
        }
    }

    struct Corrupt;

    impl FrameCodec for Corrupt {
        fn decode_all(&self, _bytes: &[u8]) -> Result<DecodedImage, CodecError> {
            Err(CodecError::Malformed("bad tree".to_string()))
        }
    }

    #[test]
    fn test_chain_falls_through_unsupported() {
        let chain = CodecChain::new(vec![Box::new(Refuses("no dll")), Box::new(Still)]);
        let image = chain.decode_all(b"FLIF").unwrap();
        assert_eq!(image.frames.len(), 1);
        assert_eq!(chain.read_info(b"FLIF").unwrap().width, 3);
    }

    #[test]
    fn test_chain_stops_at_corrupt_stream() {
        let chain = CodecChain::new(vec![Box::new(Corrupt), Box::new(Still)]);
        assert_eq!(
            chain.decode_all(b"FLIF"),
            Err(CodecError::Malformed("bad tree".to_string()))
        );
    }

    #[test]
    fn test_chain_reports_last_refusal() {
        let chain = CodecChain::new(vec![Box::new(Refuses("a")), Box::new(Refuses("b"))]);
        assert_eq!(chain.decode_all(b""), Err(CodecError::Unsupported("b".to_string())));

        let empty = CodecChain::new(Vec::new());
        assert!(empty.is_empty());
        assert!(matches!(empty.read_info(b""), Err(CodecError::Unsupported(_))));
    }

    #[test]
    fn test_expand_rejects_ragged_buffer() {
        assert!(matches!(expand_to_rgba(&[1, 2, 3, 4], 3), Err(CodecError::Malformed(_))));
        assert!(matches!(expand_to_rgba(&[0; 10], 5), Err(CodecError::Unsupported(_))));
    }

    #[cfg(feature = "flif")]
    #[test]
    fn test_flif_codec_rejects_short_and_foreign_input() {
        assert_eq!(FlifCodec.decode_all(b""), Err(CodecError::Truncated));
        assert_eq!(FlifCodec.decode_all(b"FL"), Err(CodecError::Truncated));
        assert!(matches!(
            FlifCodec.decode_all(b"\x89PNG\r\n\x1a\n"),
            Err(CodecError::Malformed(_))
        ));
    }
}
