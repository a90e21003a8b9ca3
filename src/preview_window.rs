//! The Win32 pane behind the preview handler: window class, message routing
//! into the [`PreviewSession`], and the GDI [`DisplaySink`].

use crate::dll_export::module_instance;
use crate::frames::Frame;
use crate::layout::{Rect, ScrollRequest, scroll_target};
use crate::log::log;
use crate::playback::DisplaySink;
use crate::session::PreviewSession;
use crate::utils::rgba_to_bgra::rgba_to_bgra_with_bg;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use windows::Win32::Foundation::{
    COLORREF, ERROR_CLASS_ALREADY_EXISTS, GetLastError, HWND, LPARAM, LRESULT, RECT, WPARAM,
};
use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BeginPaint, COLOR_WINDOW, CreateSolidBrush,
    DIB_RGB_COLORS, DeleteObject, EndPaint, ExcludeClipRect, FillRect, GetSysColor,
    GetSysColorBrush, HALFTONE, HBRUSH, HDC, HGDIOBJ, InvalidateRect, PAINTSTRUCT, SRCCOPY,
    SetStretchBltMode, StretchDIBits,
};
use windows::Win32::UI::Controls::SetScrollInfo;
use windows::Win32::UI::WindowsAndMessaging::{
    BN_CLICKED, CS_HREDRAW, CS_VREDRAW, CreateWindowExW, DefWindowProcW, DestroyWindow,
    GetClientRect, GetScrollInfo, HMENU, IDC_ARROW, IsWindow, KillTimer, LoadCursorW,
    RegisterClassExW, SB_CTL, SB_LEFT, SB_LINELEFT, SB_LINERIGHT, SB_PAGELEFT, SB_PAGERIGHT,
    SB_RIGHT, SB_THUMBPOSITION, SB_THUMBTRACK, SCROLLBAR_COMMAND, SCROLLINFO, SIF_ALL, SIF_POS,
    SIF_RANGE, SWP_NOACTIVATE, SWP_NOZORDER, SetTimer, SetWindowPos,
    SetWindowTextW, WINDOW_EX_STYLE, WM_COMMAND, WM_CTLCOLORBTN, WM_CTLCOLORSCROLLBAR,
    WM_ERASEBKGND, WM_HSCROLL, WM_NCDESTROY, WM_PAINT, WM_SIZE, WM_TIMER, WNDCLASS_STYLES,
    WNDCLASSEXW, WS_CHILD, WS_CLIPCHILDREN, WS_TABSTOP, WS_VISIBLE,
};
use windows::core::{Error, PCWSTR, Result, w};

const CLASS_NAME: PCWSTR = w!("FlifPreviewPane");
const PLAYBACK_TIMER_ID: usize = 1;
const PLAY_BUTTON_ID: usize = 100;
const FRAME_SCROLLBAR_ID: usize = 101;

static CLASS_REG: OnceLock<Result<()>> = OnceLock::new();

thread_local! {
    static PANES: RefCell<HashMap<isize, Rc<Pane>>> = RefCell::new(HashMap::new());
}

fn hwnd_key(hwnd: HWND) -> isize {
    hwnd.0 as isize
}

fn loword(w: WPARAM) -> usize {
    w.0 & 0xFFFF
}

fn hiword(w: WPARAM) -> usize {
    (w.0 >> 16) & 0xFFFF
}

fn colorref_rgb(color: COLORREF) -> (u8, u8, u8) {
    (
        (color.0 & 0xFF) as u8,
        ((color.0 >> 8) & 0xFF) as u8,
        ((color.0 >> 16) & 0xFF) as u8,
    )
}

fn pane_for(hwnd: HWND) -> Option<Rc<Pane>> {
    PANES.with(|panes| {
        panes
            .try_borrow()
            .ok()
            .and_then(|map| map.get(&hwnd_key(hwnd)).cloned())
    })
}

fn register_class_once() -> Result<()> {
    CLASS_REG
        .get_or_init(|| unsafe {
            let wc = WNDCLASSEXW {
                cbSize: size_of::<WNDCLASSEXW>() as u32,
                style: WNDCLASS_STYLES(CS_HREDRAW.0 | CS_VREDRAW.0),
                lpfnWndProc: Some(wndproc),
                hInstance: module_instance(),
                hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
                lpszClassName: CLASS_NAME,
                ..Default::default()
            };

            if RegisterClassExW(&wc) != 0 {
                return Ok(());
            }
            let err = GetLastError();
            if err == ERROR_CLASS_ALREADY_EXISTS {
                Ok(())
            } else {
                Err(Error::new(err.to_hresult(), "RegisterClassExW failed"))
            }
        })
        .clone()
}

/// Destroys the window on drop unless the host already did.
pub(crate) struct OwnedWindow(HWND);

impl OwnedWindow {
    pub(crate) fn hwnd(&self) -> HWND {
        self.0
    }
}

impl Drop for OwnedWindow {
    fn drop(&mut self) {
        unsafe {
            if IsWindow(Some(self.0)).as_bool() {
                if let Err(err) = DestroyWindow(self.0) {
                    log(format!("OwnedWindow: DestroyWindow failed: {err:?}"));
                }
            }
        }
    }
}

struct SolidBrush(HBRUSH);

impl Drop for SolidBrush {
    fn drop(&mut self) {
        let _ = unsafe { DeleteObject(HGDIOBJ(self.0.0)) };
    }
}

/// The current frame composited over the background, ready for GDI.
struct FrameBitmap {
    index: usize,
    background: COLORREF,
    width: u32,
    height: u32,
    bgra: Vec<u8>,
}

/// Everything one pane window shares with its preview handler.
pub(crate) struct Pane {
    pub(crate) session: RefCell<PreviewSession<Win32Sink>>,
    background: Cell<Option<COLORREF>>,
    brush: RefCell<Option<SolidBrush>>,
    bitmap: RefCell<Option<FrameBitmap>>,
}

impl Pane {
    pub(crate) fn new() -> Self {
        Self {
            session: RefCell::new(PreviewSession::new()),
            background: Cell::new(None),
            brush: RefCell::new(None),
            bitmap: RefCell::new(None),
        }
    }

    pub(crate) fn set_background(&self, color: COLORREF) {
        self.background.set(Some(color));
        if let Ok(mut brush) = self.brush.try_borrow_mut() {
            brush.take();
        }
        if let Ok(mut bitmap) = self.bitmap.try_borrow_mut() {
            bitmap.take();
        }
    }

    /// Swaps in a fresh session and hands back the old one.
    pub(crate) fn take_session(&self) -> Option<PreviewSession<Win32Sink>> {
        if let Ok(mut bitmap) = self.bitmap.try_borrow_mut() {
            bitmap.take();
        }
        let mut session = self.session.try_borrow_mut().ok()?;
        Some(std::mem::take(&mut *session))
    }

    /// Recomputes the layout for a `width` x `height` pane and moves the
    /// controls into place.
    pub(crate) fn relayout(&self, hwnd: HWND, width: i32, height: i32) {
        let Ok(mut session) = self.session.try_borrow_mut() else {
            return;
        };
        let layout = session.set_rect(Rect::from_size(0, 0, width, height));
        let controls = session
            .controller()
            .map(|c| (c.sink().button, c.sink().scrollbar));
        drop(session);

        if let Some((button, scrollbar)) = controls {
            for (child, rect) in [(button, layout.play_button), (scrollbar, layout.scrollbar)] {
                let (Some(child), Some(rect)) = (child, rect) else {
                    continue;
                };
                if let Err(err) = unsafe {
                    SetWindowPos(
                        child,
                        None,
                        rect.left,
                        rect.top,
                        rect.width(),
                        rect.height(),
                        SWP_NOZORDER | SWP_NOACTIVATE,
                    )
                } {
                    log(format!("Pane::relayout: SetWindowPos failed: {err:?}"));
                }
            }
        }
        let _ = unsafe { InvalidateRect(Some(hwnd), None, false) };
    }

    fn background_color(&self) -> COLORREF {
        self.background
            .get()
            .unwrap_or_else(|| COLORREF(unsafe { GetSysColor(COLOR_WINDOW) }))
    }

    fn background_brush(&self) -> HBRUSH {
        if let Ok(mut slot) = self.brush.try_borrow_mut() {
            if slot.is_none() {
                let brush = unsafe { CreateSolidBrush(self.background_color()) };
                if !brush.is_invalid() {
                    *slot = Some(SolidBrush(brush));
                }
            }
            if let Some(brush) = slot.as_ref() {
                return brush.0;
            }
        }
        unsafe { GetSysColorBrush(COLOR_WINDOW) }
    }

    /// Stretches the current frame into the image rectangle and clips it out
    /// of `hdc` so the background fill leaves it alone.
    fn draw_frame(&self, hdc: HDC) {
        let Ok(session) = self.session.try_borrow() else {
            return;
        };
        let image = session.layout().image;
        if image.is_empty() {
            return;
        }
        let Some((index, frame)) = session.controller().and_then(|c| c.current_frame()) else {
            return;
        };
        let Ok(mut cache) = self.bitmap.try_borrow_mut() else {
            return;
        };

        let background = self.background_color();
        if cache
            .as_ref()
            .is_none_or(|b| b.index != index || b.background != background)
        {
            *cache = Some(FrameBitmap {
                index,
                background,
                width: frame.width,
                height: frame.height,
                bgra: rgba_to_bgra_with_bg(&frame.pixels, colorref_rgb(background)),
            });
        }
        let Some(bitmap) = cache.as_ref() else {
            return;
        };

        let bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: bitmap.width as i32,
                biHeight: -(bitmap.height as i32),
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };
        unsafe {
            SetStretchBltMode(hdc, HALFTONE);
            StretchDIBits(
                hdc,
                image.left,
                image.top,
                image.width(),
                image.height(),
                0,
                0,
                bitmap.width as i32,
                bitmap.height as i32,
                Some(bitmap.bgra.as_ptr() as *const c_void),
                &bmi,
                DIB_RGB_COLORS,
                SRCCOPY,
            );
            ExcludeClipRect(hdc, image.left, image.top, image.right, image.bottom);
        }
    }

    fn paint(&self, hwnd: HWND) {
        let mut ps = PAINTSTRUCT::default();
        let hdc = unsafe { BeginPaint(hwnd, &mut ps) };
        let mut client = RECT::default();
        let _ = unsafe { GetClientRect(hwnd, &mut client) };

        self.draw_frame(hdc);
        let _ = unsafe { FillRect(hdc, &client, self.background_brush()) };
        let _ = unsafe { EndPaint(hwnd, &ps) };
    }

    fn on_timer(&self) {
        let Ok(mut session) = self.session.try_borrow_mut() else {
            return;
        };
        match session.tick(Instant::now()) {
            Ok(resolution) if resolution.animation_finished => {
                log(format!("Pane: animation finished on frame {}", resolution.frame_index));
            }
            Ok(_) => {}
            Err(err) => log(format!("Pane: tick ignored: {err}")),
        }
    }

    fn on_play_clicked(&self) {
        let Ok(mut session) = self.session.try_borrow_mut() else {
            return;
        };
        match session.toggle_play(Instant::now()) {
            Ok(state) => log(format!("Pane: play button -> {state:?}")),
            Err(err) => log(format!("Pane: toggle failed: {err}")),
        }
    }

    fn on_hscroll(&self, w: WPARAM, l: LPARAM) {
        let scrollbar = HWND(l.0 as *mut c_void);
        if scrollbar.is_invalid() {
            return;
        }
        let mut si = SCROLLINFO {
            cbSize: size_of::<SCROLLINFO>() as u32,
            fMask: SIF_ALL,
            ..Default::default()
        };
        if unsafe { GetScrollInfo(scrollbar, SB_CTL, &mut si) }.is_err() {
            return;
        }

        let request = match SCROLLBAR_COMMAND(loword(w) as i32) {
            SB_LINELEFT => ScrollRequest::LineLeft,
            SB_LINERIGHT => ScrollRequest::LineRight,
            SB_PAGELEFT => ScrollRequest::PageLeft,
            SB_PAGERIGHT => ScrollRequest::PageRight,
            SB_LEFT => ScrollRequest::First,
            SB_RIGHT => ScrollRequest::Last,
            SB_THUMBTRACK | SB_THUMBPOSITION => ScrollRequest::Thumb(si.nTrackPos),
            _ => return,
        };
        let target = scroll_target(
            request,
            usize::try_from(si.nPos).unwrap_or(0),
            usize::try_from(si.nMax).unwrap_or(0),
            si.nPage as usize,
        );

        si.fMask = SIF_POS;
        si.nPos = target as i32;
        unsafe { SetScrollInfo(scrollbar, SB_CTL, &si, true) };

        let Ok(mut session) = self.session.try_borrow_mut() else {
            return;
        };
        if let Err(err) = session.scrub(target) {
            log(format!("Pane: scrub to {target} failed: {err}"));
        }
    }
}

/// Creates the hidden pane window for `pane` under `parent`.
pub(crate) fn create_pane(parent: HWND, rc: RECT, pane: &Rc<Pane>) -> Result<OwnedWindow> {
    register_class_once()?;
    let hwnd = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            CLASS_NAME,
            PCWSTR::null(),
            WS_CHILD | WS_CLIPCHILDREN,
            rc.left,
            rc.top,
            rc.right - rc.left,
            rc.bottom - rc.top,
            Some(parent),
            None,
            Some(module_instance()),
            None,
        )?
    };
    PANES.with(|panes| {
        if let Ok(mut map) = panes.try_borrow_mut() {
            map.insert(hwnd_key(hwnd), Rc::clone(pane));
        }
    });
    log(format!("create_pane: 0x{:X} under 0x{:X}", hwnd.0 as usize, parent.0 as usize));
    Ok(OwnedWindow(hwnd))
}

/// Play button and frame scrollbar, created only for animations. Both die
/// with `pane`.
pub(crate) fn create_controls(pane: HWND, frame_count: usize) -> Result<(HWND, HWND)> {
    let instance = module_instance();
    let button = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            w!("BUTTON"),
            w!("Play"),
            WS_CHILD | WS_VISIBLE | WS_TABSTOP,
            0,
            0,
            0,
            0,
            Some(pane),
            Some(HMENU(PLAY_BUTTON_ID as *mut c_void)),
            Some(instance),
            None,
        )?
    };
    let scrollbar = unsafe {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            w!("SCROLLBAR"),
            PCWSTR::null(),
            WS_CHILD | WS_VISIBLE,
            0,
            0,
            0,
            0,
            Some(pane),
            Some(HMENU(FRAME_SCROLLBAR_ID as *mut c_void)),
            Some(instance),
            None,
        )?
    };

    let si = SCROLLINFO {
        cbSize: size_of::<SCROLLINFO>() as u32,
        fMask: SIF_RANGE | SIF_POS,
        nMin: 0,
        nMax: frame_count.saturating_sub(1) as i32,
        nPos: 0,
        ..Default::default()
    };
    unsafe { SetScrollInfo(scrollbar, SB_CTL, &si, false) };
    Ok((button, scrollbar))
}

unsafe extern "system" fn wndproc(hwnd: HWND, msg: u32, w: WPARAM, l: LPARAM) -> LRESULT {
    let pane = pane_for(hwnd);
    match (msg, pane) {
        (WM_TIMER, Some(pane)) if w.0 == PLAYBACK_TIMER_ID => {
            pane.on_timer();
            LRESULT(0)
        }
        (WM_COMMAND, Some(pane))
            if loword(w) == PLAY_BUTTON_ID && hiword(w) == BN_CLICKED as usize =>
        {
            pane.on_play_clicked();
            LRESULT(0)
        }
        (WM_HSCROLL, Some(pane)) => {
            pane.on_hscroll(w, l);
            LRESULT(0)
        }
        (WM_CTLCOLORBTN | WM_CTLCOLORSCROLLBAR, Some(pane)) => {
            LRESULT(pane.background_brush().0 as isize)
        }
        (WM_PAINT, Some(pane)) => {
            pane.paint(hwnd);
            LRESULT(0)
        }
        // WM_PAINT covers every pixel.
        (WM_ERASEBKGND, Some(_)) => LRESULT(1),
        (WM_SIZE, _) => {
            let _ = unsafe { InvalidateRect(Some(hwnd), None, false) };
            unsafe { DefWindowProcW(hwnd, msg, w, l) }
        }
        (WM_NCDESTROY, _) => {
            PANES.with(|panes| {
                if let Ok(mut map) = panes.try_borrow_mut() {
                    map.remove(&hwnd_key(hwnd));
                }
            });
            log(format!("wndproc: WM_NCDESTROY 0x{:X}", hwnd.0 as usize));
            unsafe { DefWindowProcW(hwnd, msg, w, l) }
        }
        _ => unsafe { DefWindowProcW(hwnd, msg, w, l) },
    }
}

/// Drives the pane's timer, play button and scrollbar.
pub(crate) struct Win32Sink {
    pane: HWND,
    pub(crate) button: Option<HWND>,
    pub(crate) scrollbar: Option<HWND>,
}

impl Win32Sink {
    pub(crate) fn new(pane: HWND) -> Self {
        Self {
            pane,
            button: None,
            scrollbar: None,
        }
    }

    pub(crate) fn attach_controls(&mut self, button: HWND, scrollbar: HWND) {
        self.button = Some(button);
        self.scrollbar = Some(scrollbar);
    }
}

impl DisplaySink for Win32Sink {
    fn show_frame(&mut self, _index: usize, _frame: &Frame) {
        let _ = unsafe { InvalidateRect(Some(self.pane), None, false) };
    }

    fn set_scroll_position(&mut self, index: usize) {
        let Some(scrollbar) = self.scrollbar else {
            return;
        };
        let si = SCROLLINFO {
            cbSize: size_of::<SCROLLINFO>() as u32,
            fMask: SIF_POS,
            nPos: index as i32,
            ..Default::default()
        };
        unsafe { SetScrollInfo(scrollbar, SB_CTL, &si, true) };
    }

    fn set_play_pause_icon(&mut self, is_playing: bool) {
        let Some(button) = self.button else {
            return;
        };
        let label = if is_playing { w!("Pause") } else { w!("Play") };
        if let Err(err) = unsafe { SetWindowTextW(button, label) } {
            log(format!("Win32Sink: SetWindowTextW failed: {err:?}"));
        }
    }

    fn arm_timer(&mut self, interval: Duration) {
        let millis = u32::try_from(interval.as_millis()).unwrap_or(u32::MAX);
        let id = unsafe { SetTimer(Some(self.pane), PLAYBACK_TIMER_ID, millis, None) };
        if id == 0 {
            let err = unsafe { GetLastError() };
            log(format!("Win32Sink: SetTimer failed: 0x{:08X}", err.to_hresult().0));
        }
    }

    fn cancel_timer(&mut self) {
        let _ = unsafe { KillTimer(Some(self.pane), PLAYBACK_TIMER_ID) };
    }
}
