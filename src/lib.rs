pub mod clock;
pub mod codec;
pub mod error;
pub mod frames;
pub mod keys;
pub mod layout;
pub mod log;
pub mod playback;
pub mod properties;
pub mod registration;
pub mod session;
pub mod utils;

#[cfg(windows)]
mod class_factory;
#[cfg(windows)]
mod dll_export;
#[cfg(windows)]
pub mod libflif;
#[cfg(windows)]
mod preview_handler;
#[cfg(windows)]
mod preview_window;
#[cfg(windows)]
mod property_handler;
#[cfg(windows)]
mod thumbnail_provider;
#[cfg(windows)]
mod wic_decoder;

#[cfg(not(target_pointer_width = "64"))]
compile_error!("flif-shell-win must be built for 64-bit targets");

use std::sync::atomic::{AtomicU32, Ordering};

pub use clock::{FrameResolution, resolve, timer_interval};
pub use codec::{DecodedFrame, DecodedImage, FrameCodec};
pub use error::{CodecError, CopyError, DecodeError, PlaybackError, SessionError};
pub use frames::{Frame, FrameSet, PixelRect};
pub use playback::{DisplaySink, PlaybackController, PlaybackState};
pub use session::PreviewSession;

/// Live COM objects plus server locks; `DllCanUnloadNow` says yes at zero.
static DLL_LOCK_COUNT: AtomicU32 = AtomicU32::new(0);

pub fn dll_add_ref() -> u32 {
    DLL_LOCK_COUNT.fetch_add(1, Ordering::SeqCst) + 1
}

pub fn dll_release() -> u32 {
    let prev = DLL_LOCK_COUNT
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
        .unwrap_or(0);
    prev.saturating_sub(1)
}

pub fn dll_lock_count() -> u32 {
    DLL_LOCK_COUNT.load(Ordering::SeqCst)
}

pub fn can_unload_now() -> bool {
    dll_lock_count() == 0
}

/// Holds one count on the DLL for as long as it lives.
#[derive(Debug)]
pub struct DllRef(());

impl DllRef {
    pub fn new() -> Self {
        dll_add_ref();
        DllRef(())
    }
}

impl Default for DllRef {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DllRef {
    fn drop(&mut self) {
        dll_release();
    }
}
