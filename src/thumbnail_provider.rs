use crate::DllRef;
use crate::codec::default_codec;
use crate::frames::FrameSet;
use crate::log::log;
use crate::utils::create_hbitmap_bgra_premul::create_hbitmap_bgra_premul;
use crate::utils::read_stream::read_stream_to_end;
use crate::utils::resize_fit_rgba::resize_fit_rgba;
use crate::utils::rgba_to_bgra_premul::rgba_to_bgra_premul;
use std::sync::{Arc, Mutex, MutexGuard};

use windows_implement::implement;

use windows::Win32::Foundation::{E_FAIL, E_POINTER, E_UNEXPECTED, WINCODEC_ERR_BADHEADER};
use windows::Win32::Graphics::Gdi::HBITMAP;
use windows::Win32::System::Com::{CoTaskMemFree, IStream};
use windows::Win32::UI::Shell::PropertiesSystem::{
    IInitializeWithFile, IInitializeWithFile_Impl, IInitializeWithStream,
    IInitializeWithStream_Impl,
};
use windows::Win32::UI::Shell::{
    IInitializeWithItem, IInitializeWithItem_Impl, IShellItem, IThumbnailProvider,
    IThumbnailProvider_Impl, SIGDN_FILESYSPATH, WTS_ALPHATYPE, WTSAT_ARGB,
};
use windows::core::{Error, Ref, Result};
use windows_core::PCWSTR;

/// Where the image comes from: a path or bytes already pulled from a stream.
#[derive(Default)]
struct ProviderState {
    path_utf8: Option<String>,
    stream_data: Option<Arc<[u8]>>,
}

#[implement(IThumbnailProvider, IInitializeWithItem, IInitializeWithStream, IInitializeWithFile)]
pub struct FlifThumbProvider {
    state: Mutex<ProviderState>,
    _dll: DllRef,
}

impl FlifThumbProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProviderState::default()),
            _dll: DllRef::new(),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, ProviderState>> {
        self.state.lock().map_err(|_| Error::from(E_UNEXPECTED))
    }

    fn set_path(&self, path: String) -> Result<()> {
        log(format!("FlifThumbProvider: path {path}"));
        let mut st = self.state()?;
        st.path_utf8 = Some(path);
        st.stream_data = None;
        Ok(())
    }

    fn load(&self) -> Result<Arc<[u8]>> {
        let (data, path) = {
            let st = self.state()?;
            (st.stream_data.clone(), st.path_utf8.clone())
        };
        if let Some(data) = data {
            return Ok(data);
        }
        let path = path.ok_or_else(|| Error::from(E_FAIL))?;
        let raw = std::fs::read(&path).map_err(|err| {
            log(format!("FlifThumbProvider: cannot read {path}: {err}"));
            Error::from(E_FAIL)
        })?;
        Ok(Arc::from(raw))
    }
}

impl IInitializeWithItem_Impl for FlifThumbProvider_Impl {
    #[allow(non_snake_case)]
    fn Initialize(&self, psi: Ref<'_, IShellItem>, _grf_mode: u32) -> Result<()> {
        let item: &IShellItem = psi.ok()?;
        let path = unsafe {
            let pw = item.GetDisplayName(SIGDN_FILESYSPATH)?;
            if pw.is_null() {
                return Err(Error::from(E_FAIL));
            }
            let s = widestring::U16CStr::from_ptr_str(pw.0).to_string_lossy();
            CoTaskMemFree(Some(pw.0 as _));
            s
        };
        self.set_path(path)
    }
}

impl IInitializeWithFile_Impl for FlifThumbProvider_Impl {
    #[allow(non_snake_case)]
    fn Initialize(&self, psz_file_path: &PCWSTR, _grf_mode: u32) -> Result<()> {
        if psz_file_path.is_null() {
            return Err(Error::from(E_POINTER));
        }
        let path = unsafe { widestring::U16CStr::from_ptr_str(psz_file_path.0).to_string_lossy() };
        self.set_path(path)
    }
}

impl IInitializeWithStream_Impl for FlifThumbProvider_Impl {
    #[allow(non_snake_case)]
    fn Initialize(&self, pstream: Ref<'_, IStream>, _grf_mode: u32) -> Result<()> {
        let stream: &IStream = pstream.ok()?;
        let data = read_stream_to_end(stream)?;
        log(format!("FlifThumbProvider: stream of {} bytes", data.len()));

        let mut st = self.state()?;
        st.path_utf8 = None;
        st.stream_data = Some(Arc::from(data));
        Ok(())
    }
}

impl IThumbnailProvider_Impl for FlifThumbProvider_Impl {
    #[allow(non_snake_case)]
    fn GetThumbnail(&self, cx: u32, phbmp: *mut HBITMAP, pdwalpha: *mut WTS_ALPHATYPE) -> Result<()> {
        if phbmp.is_null() || pdwalpha.is_null() {
            return Err(Error::from(E_POINTER));
        }

        let data = self.load()?;
        let codec = default_codec();
        let frames = FrameSet::decode(&data, codec.as_ref()).map_err(|err| {
            log(format!("FlifThumbProvider: decode failed: {err}"));
            Error::from(WINCODEC_ERR_BADHEADER)
        })?;

        let first = &frames.frames()[0];
        let (tw, th, rgba) = resize_fit_rgba(&first.pixels, first.width, first.height, cx);
        let bgra = rgba_to_bgra_premul(&rgba);
        let hbmp = unsafe { create_hbitmap_bgra_premul(tw as i32, th as i32, &bgra)? };

        log(format!(
            "FlifThumbProvider: {}x{} -> {}x{} (cx={cx})",
            first.width, first.height, tw, th
        ));
        unsafe {
            *phbmp = hbmp;
            *pdwalpha = WTSAT_ARGB;
        }
        Ok(())
    }
}
