pub mod resize_fit_rgba;
pub mod rgba_to_bgra;
pub mod rgba_to_bgra_premul;

#[cfg(windows)]
pub mod create_hbitmap_bgra_premul;
#[cfg(windows)]
pub mod guid;
#[cfg(windows)]
pub mod read_stream;
