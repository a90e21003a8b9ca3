//! WIC bitmap decoder, so WIC clients (Photos viewer, Paint, anything built on
//! `IWICImagingFactory`) can open FLIF files. Every frame is exposed as a
//! 32bpp RGBA bitmap; container metadata is not.

use crate::DllRef;
use crate::codec::{FLIF_MAGIC, default_codec, has_flif_signature};
use crate::error::{CopyError, DecodeError};
use crate::frames::{Frame, FrameSet, PixelRect};
use crate::keys::{CLSID_FLIF_DECODER, GUID_CONTAINER_FORMAT_FLIF, WIC_PIXEL_FORMAT_RGBA};
use crate::log::log;
use crate::utils::read_stream::read_stream_to_end;
use std::sync::{Arc, Mutex};
use windows::Win32::Foundation::{
    E_INVALIDARG, E_POINTER, E_UNEXPECTED, WINCODEC_ERR_BADHEADER, WINCODEC_ERR_CODECNOTHUMBNAIL,
    WINCODEC_ERR_FRAMEMISSING, WINCODEC_ERR_INSUFFICIENTBUFFER, WINCODEC_ERR_NOTINITIALIZED,
    WINCODEC_ERR_PALETTEUNAVAILABLE, WINCODEC_ERR_UNSUPPORTEDOPERATION,
    WINCODEC_ERR_UNSUPPORTEDPIXELFORMAT, WINCODEC_ERR_WRONGSTATE,
};
use windows::Win32::Graphics::Imaging::{
    CLSID_WICImagingFactory, IWICBitmapDecoder, IWICBitmapDecoder_Impl, IWICBitmapDecoderInfo,
    IWICBitmapFrameDecode, IWICBitmapFrameDecode_Impl, IWICBitmapSource, IWICBitmapSource_Impl,
    IWICColorContext, IWICImagingFactory, IWICMetadataQueryReader, IWICPalette,
    WICBitmapDecoderCapabilityCanDecodeAllImages, WICBitmapDecoderCapabilityCanDecodeSomeImages,
    WICDecodeOptions, WICRect,
};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, CoCreateInstance, ISequentialStream, IStream, STREAM_SEEK_CUR,
    STREAM_SEEK_SET,
};
use windows::core::{Error, GUID, HRESULT, IUnknown, Interface, Ref, Result, implement};

const DPI: f64 = 96.0;

/// Answer to `QueryCapability` for the first bytes of a stream.
fn capability_for(header: &[u8]) -> std::result::Result<u32, HRESULT> {
    if has_flif_signature(header) {
        Ok((WICBitmapDecoderCapabilityCanDecodeAllImages.0
            | WICBitmapDecoderCapabilityCanDecodeSomeImages.0) as u32)
    } else {
        Err(WINCODEC_ERR_BADHEADER)
    }
}

fn decode_hresult(err: &DecodeError) -> HRESULT {
    match err {
        DecodeError::Unsupported(_) => WINCODEC_ERR_UNSUPPORTEDPIXELFORMAT,
        _ => WINCODEC_ERR_BADHEADER,
    }
}

fn copy_hresult(err: &CopyError) -> HRESULT {
    match err {
        CopyError::InvalidRect | CopyError::StrideTooSmall => E_INVALIDARG,
        CopyError::BufferTooSmall { .. } => WINCODEC_ERR_INSUFFICIENTBUFFER,
    }
}

fn pixel_rect(rc: &WICRect) -> PixelRect {
    PixelRect {
        x: rc.X,
        y: rc.Y,
        width: rc.Width,
        height: rc.Height,
    }
}

/// Reads the signature and puts the stream back where it was.
fn peek_header(stream: &IStream) -> Result<Vec<u8>> {
    let mut start = 0u64;
    unsafe { stream.Seek(0, STREAM_SEEK_CUR, Some(&mut start))? };

    let seq: ISequentialStream = stream.cast()?;
    let mut header = [0u8; FLIF_MAGIC.len()];
    let mut read = 0u32;
    let hr = unsafe {
        seq.Read(
            header.as_mut_ptr().cast(),
            header.len() as u32,
            Some(&mut read),
        )
    };
    unsafe { stream.Seek(start as i64, STREAM_SEEK_SET, None)? };
    hr.ok()?;
    Ok(header[..read as usize].to_vec())
}

fn no_color_contexts(pcactualcount: *mut u32) -> Result<()> {
    if pcactualcount.is_null() {
        return Err(Error::from(E_POINTER));
    }
    unsafe { *pcactualcount = 0 };
    Ok(())
}

#[implement(IWICBitmapDecoder)]
pub struct FlifWicDecoder {
    frames: Mutex<Option<Arc<FrameSet>>>,
    _dll: DllRef,
}

impl FlifWicDecoder {
    pub fn new() -> Self {
        Self {
            frames: Mutex::new(None),
            _dll: DllRef::new(),
        }
    }

    fn frame_set(&self) -> Result<Arc<FrameSet>> {
        let frames = self.frames.lock().map_err(|_| Error::from(E_UNEXPECTED))?;
        frames
            .clone()
            .ok_or_else(|| Error::from(WINCODEC_ERR_NOTINITIALIZED))
    }
}

impl IWICBitmapDecoder_Impl for FlifWicDecoder_Impl {
    #[allow(non_snake_case)]
    fn QueryCapability(&self, pistream: Ref<'_, IStream>) -> Result<u32> {
        let stream: &IStream = pistream.ok()?;
        let header = peek_header(stream)?;
        capability_for(&header).map_err(Error::from)
    }

    #[allow(non_snake_case)]
    fn Initialize(&self, pistream: Ref<'_, IStream>, _cacheoptions: WICDecodeOptions) -> Result<()> {
        let mut frames = self.frames.lock().map_err(|_| Error::from(E_UNEXPECTED))?;
        if frames.is_some() {
            return Err(Error::from(WINCODEC_ERR_WRONGSTATE));
        }

        let stream: &IStream = pistream.ok()?;
        let data = read_stream_to_end(stream)?;
        let set = FrameSet::decode(&data, default_codec().as_ref()).map_err(|err| {
            log(format!("FlifWicDecoder::Initialize: {err}"));
            Error::from(decode_hresult(&err))
        })?;

        let (w, h) = set.dimensions();
        log(format!(
            "FlifWicDecoder::Initialize: {w}x{h}, {} frame(s), loop count {}",
            set.len(),
            set.loop_count()
        ));
        *frames = Some(Arc::new(set));
        Ok(())
    }

    #[allow(non_snake_case)]
    fn GetContainerFormat(&self) -> Result<GUID> {
        Ok(GUID::from_u128(GUID_CONTAINER_FORMAT_FLIF))
    }

    #[allow(non_snake_case)]
    fn GetDecoderInfo(&self) -> Result<IWICBitmapDecoderInfo> {
        let factory: IWICImagingFactory = unsafe {
            CoCreateInstance(&CLSID_WICImagingFactory, None::<&IUnknown>, CLSCTX_INPROC_SERVER)?
        };
        let info = unsafe { factory.CreateComponentInfo(&GUID::from_u128(CLSID_FLIF_DECODER))? };
        info.cast()
    }

    #[allow(non_snake_case)]
    fn CopyPalette(&self, _pipalette: Ref<'_, IWICPalette>) -> Result<()> {
        Err(Error::from(WINCODEC_ERR_PALETTEUNAVAILABLE))
    }

    #[allow(non_snake_case)]
    fn GetMetadataQueryReader(&self) -> Result<IWICMetadataQueryReader> {
        Err(Error::from(WINCODEC_ERR_UNSUPPORTEDOPERATION))
    }

    #[allow(non_snake_case)]
    fn GetPreview(&self) -> Result<IWICBitmapSource> {
        Err(Error::from(WINCODEC_ERR_UNSUPPORTEDOPERATION))
    }

    #[allow(non_snake_case)]
    fn GetColorContexts(
        &self,
        _ccount: u32,
        _ppicolorcontexts: *mut Option<IWICColorContext>,
        pcactualcount: *mut u32,
    ) -> Result<()> {
        no_color_contexts(pcactualcount)
    }

    #[allow(non_snake_case)]
    fn GetThumbnail(&self) -> Result<IWICBitmapSource> {
        Err(Error::from(WINCODEC_ERR_CODECNOTHUMBNAIL))
    }

    #[allow(non_snake_case)]
    fn GetFrameCount(&self) -> Result<u32> {
        Ok(self.frame_set()?.len() as u32)
    }

    #[allow(non_snake_case)]
    fn GetFrame(&self, index: u32) -> Result<IWICBitmapFrameDecode> {
        let frames = self.frame_set()?;
        if index as usize >= frames.len() {
            return Err(Error::from(WINCODEC_ERR_FRAMEMISSING));
        }
        Ok(FlifWicFrame::new(frames, index as usize).into())
    }
}

/// One decoded frame, sharing pixels with the decoder that handed it out.
#[implement(IWICBitmapFrameDecode)]
pub struct FlifWicFrame {
    frames: Arc<FrameSet>,
    index: usize,
    _dll: DllRef,
}

impl FlifWicFrame {
    fn new(frames: Arc<FrameSet>, index: usize) -> Self {
        Self {
            frames,
            index,
            _dll: DllRef::new(),
        }
    }

    fn frame(&self) -> Result<&Frame> {
        self.frames
            .frame(self.index)
            .ok_or_else(|| Error::from(WINCODEC_ERR_FRAMEMISSING))
    }
}

impl IWICBitmapSource_Impl for FlifWicFrame_Impl {
    #[allow(non_snake_case)]
    fn GetSize(&self, puiwidth: *mut u32, puiheight: *mut u32) -> Result<()> {
        if puiwidth.is_null() || puiheight.is_null() {
            return Err(Error::from(E_POINTER));
        }
        let frame = self.frame()?;
        unsafe {
            *puiwidth = frame.width;
            *puiheight = frame.height;
        }
        Ok(())
    }

    #[allow(non_snake_case)]
    fn GetPixelFormat(&self) -> Result<GUID> {
        Ok(GUID::from_u128(WIC_PIXEL_FORMAT_RGBA))
    }

    #[allow(non_snake_case)]
    fn GetResolution(&self, pdpix: *mut f64, pdpiy: *mut f64) -> Result<()> {
        if pdpix.is_null() || pdpiy.is_null() {
            return Err(Error::from(E_POINTER));
        }
        unsafe {
            *pdpix = DPI;
            *pdpiy = DPI;
        }
        Ok(())
    }

    #[allow(non_snake_case)]
    fn CopyPalette(&self, _pipalette: Ref<'_, IWICPalette>) -> Result<()> {
        Err(Error::from(WINCODEC_ERR_PALETTEUNAVAILABLE))
    }

    #[allow(non_snake_case)]
    fn CopyPixels(
        &self,
        prc: *const WICRect,
        cbstride: u32,
        cbbuffersize: u32,
        pbbuffer: *mut u8,
    ) -> Result<()> {
        if pbbuffer.is_null() {
            return Err(Error::from(E_INVALIDARG));
        }
        let rect = unsafe { prc.as_ref() }.map(pixel_rect);
        let out = unsafe { std::slice::from_raw_parts_mut(pbbuffer, cbbuffersize as usize) };
        self.frame()?
            .copy_pixels(rect, cbstride as usize, out)
            .map_err(|err| {
                log(format!("FlifWicFrame::CopyPixels: {err}"));
                Error::from(copy_hresult(&err))
            })
    }
}

impl IWICBitmapFrameDecode_Impl for FlifWicFrame_Impl {
    #[allow(non_snake_case)]
    fn GetMetadataQueryReader(&self) -> Result<IWICMetadataQueryReader> {
        Err(Error::from(WINCODEC_ERR_UNSUPPORTEDOPERATION))
    }

    #[allow(non_snake_case)]
    fn GetColorContexts(
        &self,
        _ccount: u32,
        _ppicolorcontexts: *mut Option<IWICColorContext>,
        pcactualcount: *mut u32,
    ) -> Result<()> {
        no_color_contexts(pcactualcount)
    }

    #[allow(non_snake_case)]
    fn GetThumbnail(&self) -> Result<IWICBitmapSource> {
        Err(Error::from(WINCODEC_ERR_CODECNOTHUMBNAIL))
    }
}
