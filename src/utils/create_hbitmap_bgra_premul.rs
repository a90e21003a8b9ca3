use core::ffi::c_void;
use core::mem::size_of;
use core::ptr::{copy_nonoverlapping, null_mut};

use windows::Win32::Foundation::{E_FAIL, E_INVALIDARG};
use windows::Win32::Graphics::Gdi::{
    BI_BITFIELDS, BITMAPINFO, BITMAPV5HEADER, CreateDIBSection, DIB_RGB_COLORS, DeleteObject,
    HBITMAP,
};

/// 'sRGB' as a little-endian tag.
const LCS_SRGB: u32 = 0x7352_4742;

/// Top-down 32bpp DIB section holding premultiplied BGRA pixels.
///
/// # Safety
/// Calls into GDI; the returned bitmap belongs to the caller.
pub unsafe fn create_hbitmap_bgra_premul(
    width: i32,
    height: i32,
    pixels_bgra: &[u8],
) -> windows::core::Result<HBITMAP> {
    if width <= 0 || height <= 0 {
        return Err(windows::core::Error::from(E_INVALIDARG));
    }
    let expected = width as usize * height as usize * 4;
    if pixels_bgra.len() != expected {
        return Err(windows::core::Error::from(E_INVALIDARG));
    }

    let v5 = BITMAPV5HEADER {
        bV5Size: size_of::<BITMAPV5HEADER>() as u32,
        bV5Width: width,
        bV5Height: -height,
        bV5Planes: 1,
        bV5BitCount: 32,
        bV5Compression: BI_BITFIELDS,
        bV5RedMask: 0x00FF_0000,
        bV5GreenMask: 0x0000_FF00,
        bV5BlueMask: 0x0000_00FF,
        bV5AlphaMask: 0xFF00_0000,
        bV5CSType: LCS_SRGB,
        ..Default::default()
    };

    let mut bits: *mut c_void = null_mut();
    let hbmp = unsafe {
        CreateDIBSection(
            None,
            &v5 as *const BITMAPV5HEADER as *const BITMAPINFO,
            DIB_RGB_COLORS,
            &mut bits,
            None,
            0,
        )?
    };

    if bits.is_null() {
        unsafe {
            let _ = DeleteObject(hbmp.into());
        }
        return Err(windows::core::Error::from(E_FAIL));
    }

    unsafe { copy_nonoverlapping(pixels_bgra.as_ptr(), bits as *mut u8, expected) };
    Ok(hbmp)
}
