use crate::DllRef;
use crate::codec::default_codec;
use crate::error::{DecodeError, SessionError};
use crate::layout::Rect;
use crate::log::log;
use crate::preview_window::{OwnedWindow, Pane, Win32Sink, create_controls, create_pane};
use crate::utils::read_stream::read_stream_to_end;
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::ptr;
use std::rc::Rc;
use windows::Win32::Foundation::{
    COLORREF, E_FAIL, E_NOTIMPL, E_POINTER, E_UNEXPECTED, HWND, RECT, S_FALSE,
    WINCODEC_ERR_BADHEADER, WINCODEC_ERR_UNSUPPORTEDPIXELFORMAT,
};
use windows::Win32::Graphics::Gdi::{InvalidateRect, LOGFONTW};
use windows::Win32::System::Com::IStream;
use windows::Win32::System::Ole::{IObjectWithSite, IObjectWithSite_Impl, IOleWindow, IOleWindow_Impl};
use windows::Win32::UI::Input::KeyboardAndMouse::{GetFocus, SetFocus as set_keyboard_focus};
use windows::Win32::UI::Shell::PropertiesSystem::{IInitializeWithStream, IInitializeWithStream_Impl};
use windows::Win32::UI::Shell::{
    IPreviewHandler, IPreviewHandler_Impl, IPreviewHandlerFrame, IPreviewHandlerVisuals,
    IPreviewHandlerVisuals_Impl,
};
use windows::Win32::UI::WindowsAndMessaging::{
    MSG, SW_SHOW, SWP_NOACTIVATE, SWP_NOZORDER, SetParent, SetWindowPos, ShowWindow,
};
use windows::core::{BOOL, Error, GUID, HRESULT, IUnknown, Interface, Ref, Result, implement};

fn session_hresult(err: &SessionError) -> HRESULT {
    match err {
        SessionError::AlreadyStarted | SessionError::Resource(_) => E_FAIL,
        SessionError::NotInitialized | SessionError::Unloaded | SessionError::Playback(_) => {
            E_UNEXPECTED
        }
        SessionError::Decode(DecodeError::Unsupported(_)) => WINCODEC_ERR_UNSUPPORTEDPIXELFORMAT,
        SessionError::Decode(_) => WINCODEC_ERR_BADHEADER,
    }
}

fn session_error(context: &str, err: SessionError) -> Error {
    log(format!("{context}: {err}"));
    Error::from(session_hresult(&err))
}

#[implement(IObjectWithSite, IPreviewHandler, IOleWindow, IInitializeWithStream, IPreviewHandlerVisuals)]
pub struct FlifPreviewHandler {
    hwnd_parent: Cell<HWND>,
    rc: Cell<RECT>,
    site: RefCell<Option<IUnknown>>,
    frame: RefCell<Option<IPreviewHandlerFrame>>,
    pane: Rc<Pane>,
    window: RefCell<Option<OwnedWindow>>,
    _dll: DllRef,
}

impl FlifPreviewHandler {
    pub fn new() -> Self {
        log("FlifPreviewHandler::new");
        Self {
            hwnd_parent: Cell::new(HWND::default()),
            rc: Cell::new(RECT::default()),
            site: RefCell::new(None),
            frame: RefCell::new(None),
            pane: Rc::new(Pane::new()),
            window: RefCell::new(None),
            _dll: DllRef::new(),
        }
    }

    fn pane_hwnd(&self) -> Option<HWND> {
        self.window.borrow().as_ref().map(OwnedWindow::hwnd)
    }

    /// Moves the pane to the stored rectangle and lays its children out.
    fn place_pane(&self, hwnd: HWND) {
        let rc = self.rc.get();
        let (width, height) = (rc.right - rc.left, rc.bottom - rc.top);
        if let Err(err) = unsafe {
            SetWindowPos(hwnd, None, rc.left, rc.top, width, height, SWP_NOZORDER | SWP_NOACTIVATE)
        } {
            log(format!("  SetWindowPos => ERR: {err:?}"));
        }
        self.pane.relayout(hwnd, width, height);
    }

    fn show_preview(&self) -> Result<()> {
        let parent = self.hwnd_parent.get();
        if parent.is_invalid() {
            log("DoPreview: no parent window");
            return Err(Error::from(E_UNEXPECTED));
        }
        let rc = self.rc.get();

        // Until stored below, dropping `window` tears the pane down again.
        let window = create_pane(parent, rc, &self.pane)?;
        let hwnd = window.hwnd();

        let frame_count = {
            let mut session = self
                .pane
                .session
                .try_borrow_mut()
                .map_err(|_| Error::from(E_UNEXPECTED))?;
            session
                .start(default_codec().as_ref(), Win32Sink::new(hwnd))
                .map_err(|err| session_error("DoPreview", err))?;
            session.frame_set().map_or(0, |f| f.len())
        };
        log(format!("DoPreview: decoded {frame_count} frame(s)"));

        if frame_count > 1 {
            let (button, scrollbar) = match create_controls(hwnd, frame_count) {
                Ok(controls) => controls,
                Err(err) => {
                    if let Some(mut session) = self.pane.take_session() {
                        session.unload();
                    }
                    return Err(session_error(
                        "DoPreview",
                        SessionError::Resource(format!("controls: {err}")),
                    ));
                }
            };
            let mut session = self
                .pane
                .session
                .try_borrow_mut()
                .map_err(|_| Error::from(E_UNEXPECTED))?;
            if let Some(controller) = session.controller_mut() {
                controller.sink_mut().attach_controls(button, scrollbar);
            }
        }

        self.place_pane(hwnd);
        let _ = unsafe { ShowWindow(hwnd, SW_SHOW) };
        *self.window.borrow_mut() = Some(window);
        Ok(())
    }
}

/// https://learn.microsoft.com/en-us/windows/win32/api/propsys/nn-propsys-iinitializewithstream
#[allow(non_snake_case)]
impl IInitializeWithStream_Impl for FlifPreviewHandler_Impl {
    fn Initialize(&self, pStream: Ref<'_, IStream>, grfMode: u32) -> Result<()> {
        let stream: &IStream = pStream.ok()?;
        let bytes = read_stream_to_end(stream)?;
        log(format!("Initialize ({} bytes, grfMode=0x{grfMode:X})", bytes.len()));

        let mut session = self
            .pane
            .session
            .try_borrow_mut()
            .map_err(|_| Error::from(E_UNEXPECTED))?;
        session
            .initialize(bytes)
            .map_err(|err| session_error("Initialize", err))
    }
}

/// https://learn.microsoft.com/en-us/windows/win32/api/shobjidl_core/nn-shobjidl_core-ipreviewhandler
#[allow(non_snake_case)]
impl IPreviewHandler_Impl for FlifPreviewHandler_Impl {
    fn SetWindow(&self, parent: HWND, prc: *const RECT) -> Result<()> {
        if parent.is_invalid() || prc.is_null() {
            log(format!("SetWindow (parent=0x{:X}, prc=NULL)", parent.0 as usize));
            return Err(Error::from(E_POINTER));
        }
        let rc = unsafe { *prc };
        log(format!(
            "SetWindow (parent=0x{:X}, rc=({}, {}, {}, {}))",
            parent.0 as usize, rc.left, rc.top, rc.right, rc.bottom
        ));
        self.hwnd_parent.set(parent);
        self.rc.set(rc);

        if let Some(hwnd) = self.pane_hwnd() {
            if let Err(err) = unsafe { SetParent(hwnd, Some(parent)) } {
                log(format!("  SetParent => ERR: {err:?}"));
            }
            self.place_pane(hwnd);
        }
        Ok(())
    }

    fn SetRect(&self, prc: *const RECT) -> Result<()> {
        if prc.is_null() {
            log("SetRect (prc=NULL)");
            return Err(Error::from(E_POINTER));
        }
        let rc = unsafe { *prc };
        log(format!("SetRect (rc=({}, {}, {}, {}))", rc.left, rc.top, rc.right, rc.bottom));
        self.rc.set(rc);

        match self.pane_hwnd() {
            Some(hwnd) => self.place_pane(hwnd),
            None => {
                if let Ok(mut session) = self.pane.session.try_borrow_mut() {
                    session.set_rect(Rect::from_size(
                        0,
                        0,
                        rc.right - rc.left,
                        rc.bottom - rc.top,
                    ));
                }
            }
        }
        Ok(())
    }

    fn DoPreview(&self) -> Result<()> {
        if self.pane_hwnd().is_some() {
            log("DoPreview: already showing");
            return Err(Error::from(E_FAIL));
        }
        let result = self.show_preview();
        match &result {
            Ok(()) => log("DoPreview: done"),
            Err(err) => log(format!("DoPreview: failed 0x{:08X}", err.code().0)),
        }
        result
    }

    fn Unload(&self) -> Result<()> {
        log("Unload");
        // The old session cancels its timer while the pane still exists.
        match self.pane.take_session() {
            Some(mut session) => session.unload(),
            None => log("  session busy; leaving it to the window teardown"),
        }
        if let Some(window) = self.window.borrow_mut().take() {
            log(format!("  destroying pane 0x{:X}", window.hwnd().0 as usize));
            drop(window);
        }
        Ok(())
    }

    fn SetFocus(&self) -> Result<()> {
        log("SetFocus");
        let target = self.pane_hwnd().map(|hwnd| {
            self.pane
                .session
                .try_borrow()
                .ok()
                .and_then(|s| s.controller().and_then(|c| c.sink().button))
                .unwrap_or(hwnd)
        });
        if let Some(target) = target {
            let _ = unsafe { set_keyboard_focus(Some(target)) };
        }
        Ok(())
    }

    fn QueryFocus(&self) -> Result<HWND> {
        let hwnd = unsafe { GetFocus() };
        log(format!("QueryFocus → 0x{:X}", hwnd.0 as usize));
        Ok(hwnd)
    }

    fn TranslateAccelerator(&self, pmsg: *const MSG) -> Result<()> {
        let message = if pmsg.is_null() { 0 } else { unsafe { ptr::read(pmsg) }.message };
        log(format!("TranslateAccelerator (msg=0x{message:X})"));

        match self.frame.borrow().as_ref() {
            Some(frame) => unsafe { frame.TranslateAccelerator(pmsg) },
            None => Err(Error::from(S_FALSE)),
        }
    }
}

/// Host-provided visual customization (background/text colors, fonts).
#[allow(non_snake_case)]
impl IPreviewHandlerVisuals_Impl for FlifPreviewHandler_Impl {
    fn SetBackgroundColor(&self, color: COLORREF) -> Result<()> {
        log(format!("SetBackgroundColor 0x{:06X}", color.0 & 0x00FF_FFFF));
        self.pane.set_background(color);
        if let Some(hwnd) = self.pane_hwnd() {
            let _ = unsafe { InvalidateRect(Some(hwnd), None, false) };
        }
        Ok(())
    }

    fn SetFont(&self, plf: *const LOGFONTW) -> Result<()> {
        if plf.is_null() {
            log("SetFont(NULL)");
            return Ok(());
        }
        let lf = unsafe { *plf };
        let face_len = lf.lfFaceName.iter().position(|&c| c == 0).unwrap_or(lf.lfFaceName.len());
        log(format!(
            "SetFont height={} weight={} face='{}'",
            lf.lfHeight,
            lf.lfWeight,
            String::from_utf16_lossy(&lf.lfFaceName[..face_len])
        ));
        Ok(())
    }

    fn SetTextColor(&self, color: COLORREF) -> Result<()> {
        log(format!("SetTextColor 0x{:06X}", color.0 & 0x00FF_FFFF));
        Ok(())
    }
}

/// https://learn.microsoft.com/en-us/windows/win32/api/ocidl/nn-ocidl-iobjectwithsite
#[allow(non_snake_case)]
impl IObjectWithSite_Impl for FlifPreviewHandler_Impl {
    fn SetSite(&self, site: Ref<'_, IUnknown>) -> Result<()> {
        let mut slot = self.site.borrow_mut();
        let mut frame_slot = self.frame.borrow_mut();

        match site.cloned() {
            Some(unknown) => {
                log(format!("SetSite (site=0x{:X})", unknown.as_raw() as usize));
                match unknown.cast::<IPreviewHandlerFrame>() {
                    Ok(frame) => *frame_slot = Some(frame),
                    Err(err) => {
                        log(format!("  IPreviewHandlerFrame unavailable (hr=0x{:08X})", err.code().0));
                        frame_slot.take();
                    }
                }
                *slot = Some(unknown);
            }
            None => {
                log("SetSite (site=None)");
                slot.take();
                frame_slot.take();
            }
        }
        Ok(())
    }

    fn GetSite(&self, riid: *const GUID, ppv: *mut *mut c_void) -> Result<()> {
        if riid.is_null() || ppv.is_null() {
            return Err(Error::from(E_POINTER));
        }
        unsafe {
            *ppv = ptr::null_mut();
        }
        match self.site.borrow().as_ref() {
            Some(site) => unsafe { site.query(riid, ppv) }.ok(),
            None => Err(Error::from(E_FAIL)),
        }
    }
}

/// https://learn.microsoft.com/en-us/windows/win32/api/oleidl/nn-oleidl-iolewindow
#[allow(non_snake_case)]
impl IOleWindow_Impl for FlifPreviewHandler_Impl {
    fn GetWindow(&self) -> Result<HWND> {
        Ok(self.pane_hwnd().unwrap_or_else(|| self.hwnd_parent.get()))
    }

    fn ContextSensitiveHelp(&self, fEnterMode: BOOL) -> Result<()> {
        log(format!("ContextSensitiveHelp (fEnterMode={})", fEnterMode.as_bool()));
        Err(E_NOTIMPL.into())
    }
}
