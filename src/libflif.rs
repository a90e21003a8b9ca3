//! Reference FLIF decoder (`libflif_dec.dll` / `libflif.dll`) bound at run
//! time. It decodes everything the format allows: animation, interlacing
//! and 16-bit channels. When neither DLL can be found the built-in decoder is
//! used alone.

use crate::codec::{
    DecodedFrame, DecodedImage, FLIF_MAGIC, FrameCodec, ImageInfo, has_flif_signature,
    info_from_decoded,
};
use crate::error::CodecError;
use crate::log::log;
use std::ffi::c_void;
use std::path::Path;
use std::sync::OnceLock;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::{
    GetProcAddress, LOAD_WITH_ALTERED_SEARCH_PATH, LoadLibraryExW, LoadLibraryW,
};
use windows::core::{HSTRING, PCSTR, s};

const DLL_NAMES: [&str; 2] = ["libflif_dec.dll", "libflif.dll"];

type CreateDecoder = unsafe extern "C" fn() -> *mut c_void;
type DestroyDecoder = unsafe extern "C" fn(*mut c_void);
type DecodeMemory = unsafe extern "C" fn(*mut c_void, *const c_void, usize) -> i32;
type NumImages = unsafe extern "C" fn(*mut c_void) -> usize;
type NumLoops = unsafe extern "C" fn(*mut c_void) -> i32;
type GetImage = unsafe extern "C" fn(*mut c_void, usize) -> *mut c_void;
type ImageU32 = unsafe extern "C" fn(*mut c_void) -> u32;
type ImageU8 = unsafe extern "C" fn(*mut c_void) -> u8;
type ReadRow = unsafe extern "C" fn(*mut c_void, u32, *mut c_void, usize);
type ReadInfo = unsafe extern "C" fn(*const c_void, usize) -> *mut c_void;
type DestroyInfo = unsafe extern "C" fn(*mut c_void);
type InfoUsize = unsafe extern "C" fn(*mut c_void) -> usize;

struct Api {
    create_decoder: CreateDecoder,
    destroy_decoder: DestroyDecoder,
    decode_memory: DecodeMemory,
    num_images: NumImages,
    num_loops: NumLoops,
    get_image: GetImage,
    image_width: ImageU32,
    image_height: ImageU32,
    image_channels: ImageU8,
    image_depth: ImageU8,
    image_frame_delay: ImageU32,
    read_row_rgba8: ReadRow,
    info: Option<InfoApi>,
}

/// Header-only entry points; absent from old builds of the library.
struct InfoApi {
    read_info: ReadInfo,
    destroy_info: DestroyInfo,
    width: ImageU32,
    height: ImageU32,
    channels: ImageU8,
    depth: ImageU8,
    num_images: InfoUsize,
}

/// Loaded library. The module stays mapped for the life of the process.
pub struct LibFlif {
    api: Api,
}

// The library handles are created and destroyed per call; the function table
// itself is immutable.
unsafe impl Send for LibFlif {}
unsafe impl Sync for LibFlif {}

static SHARED: OnceLock<Option<LibFlif>> = OnceLock::new();

unsafe fn symbol<T: Copy>(module: HMODULE, name: PCSTR) -> Option<T> {
    let proc = unsafe { GetProcAddress(module, name) }?;
    debug_assert_eq!(size_of::<T>(), size_of::<usize>());
    Some(unsafe { std::mem::transmute_copy(&proc) })
}

fn load_module() -> Option<HMODULE> {
    let beside_us = crate::dll_export::module_path()
        .and_then(|path| Path::new(&path).parent().map(Path::to_path_buf));
    for name in DLL_NAMES {
        if let Some(dir) = &beside_us {
            let full = HSTRING::from(dir.join(name).as_os_str());
            if let Ok(module) =
                unsafe { LoadLibraryExW(&full, None, LOAD_WITH_ALTERED_SEARCH_PATH) }
            {
                log(format!("libflif: loaded {}", dir.join(name).display()));
                return Some(module);
            }
        }
        if let Ok(module) = unsafe { LoadLibraryW(&HSTRING::from(name)) } {
            log(format!("libflif: loaded {name} from the search path"));
            return Some(module);
        }
    }
    None
}

impl LibFlif {
    /// Process-wide instance, loaded on first use.
    pub fn shared() -> Option<&'static LibFlif> {
        SHARED
            .get_or_init(|| {
                let lib = load_module().and_then(|module| unsafe { Self::bind(module) });
                if lib.is_none() {
                    log("libflif: not available, using the built-in decoder");
                }
                lib
            })
            .as_ref()
    }

    unsafe fn bind(module: HMODULE) -> Option<Self> {
        let info = (|| unsafe {
            Some(InfoApi {
                read_info: symbol(module, s!("flif_read_info_from_memory"))?,
                destroy_info: symbol(module, s!("flif_destroy_info"))?,
                width: symbol(module, s!("flif_info_get_width"))?,
                height: symbol(module, s!("flif_info_get_height"))?,
                channels: symbol(module, s!("flif_info_get_nb_channels"))?,
                depth: symbol(module, s!("flif_info_get_depth"))?,
                num_images: symbol(module, s!("flif_info_num_images"))?,
            })
        })();
        let api = unsafe {
            Api {
                create_decoder: symbol(module, s!("flif_create_decoder"))?,
                destroy_decoder: symbol(module, s!("flif_destroy_decoder"))?,
                decode_memory: symbol(module, s!("flif_decoder_decode_memory"))?,
                num_images: symbol(module, s!("flif_decoder_num_images"))?,
                num_loops: symbol(module, s!("flif_decoder_num_loops"))?,
                get_image: symbol(module, s!("flif_decoder_get_image"))?,
                image_width: symbol(module, s!("flif_image_get_width"))?,
                image_height: symbol(module, s!("flif_image_get_height"))?,
                image_channels: symbol(module, s!("flif_image_get_nb_channels"))?,
                image_depth: symbol(module, s!("flif_image_get_depth"))?,
                image_frame_delay: symbol(module, s!("flif_image_get_frame_delay"))?,
                read_row_rgba8: symbol(module, s!("flif_image_read_row_RGBA8"))?,
                info,
            }
        };
        Some(Self { api })
    }
}

fn check_signature(bytes: &[u8]) -> Result<(), CodecError> {
    if bytes.len() < FLIF_MAGIC.len() {
        return Err(CodecError::Truncated);
    }
    if !has_flif_signature(bytes) {
        return Err(CodecError::Malformed("missing FLIF signature".to_string()));
    }
    Ok(())
}

/// Owns one `FLIF_DECODER*`.
struct DecoderHandle<'a> {
    api: &'a Api,
    raw: *mut c_void,
}

impl<'a> DecoderHandle<'a> {
    fn new(api: &'a Api) -> Result<Self, CodecError> {
        let raw = unsafe { (api.create_decoder)() };
        if raw.is_null() {
            return Err(CodecError::Unsupported("libflif: decoder allocation failed".to_string()));
        }
        Ok(Self { api, raw })
    }
}

impl Drop for DecoderHandle<'_> {
    fn drop(&mut self) {
        unsafe { (self.api.destroy_decoder)(self.raw) };
    }
}

impl FrameCodec for LibFlif {
    fn decode_all(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        check_signature(bytes)?;
        let api = &self.api;
        let decoder = DecoderHandle::new(api)?;

        let ok = unsafe { (api.decode_memory)(decoder.raw, bytes.as_ptr().cast(), bytes.len()) };
        if ok == 0 {
            return Err(CodecError::Malformed("libflif rejected the stream".to_string()));
        }

        let count = unsafe { (api.num_images)(decoder.raw) };
        if count == 0 {
            return Err(CodecError::Truncated);
        }
        let loop_count = u32::try_from(unsafe { (api.num_loops)(decoder.raw) }).unwrap_or(0);

        let mut frames = Vec::with_capacity(count);
        let mut channels = 4;
        let mut bits_per_channel = 8;
        for index in 0..count {
            let image = unsafe { (api.get_image)(decoder.raw, index) };
            if image.is_null() {
                return Err(CodecError::Truncated);
            }
            let (width, height) =
                unsafe { ((api.image_width)(image), (api.image_height)(image)) };
            if width == 0 || height == 0 {
                return Err(CodecError::Malformed(format!("frame {index} has no pixels")));
            }
            if index == 0 {
                channels = unsafe { (api.image_channels)(image) };
                bits_per_channel = unsafe { (api.image_depth)(image) };
            }

            let row_bytes = width as usize * 4;
            let mut rgba = vec![0u8; row_bytes * height as usize];
            for (row, line) in rgba.chunks_exact_mut(row_bytes).enumerate() {
                unsafe {
                    (api.read_row_rgba8)(image, row as u32, line.as_mut_ptr().cast(), row_bytes)
                };
            }

            frames.push(DecodedFrame {
                width,
                height,
                rgba,
                delay_ms: unsafe { (api.image_frame_delay)(image) },
            });
        }

        Ok(DecodedImage {
            frames,
            loop_count,
            channels,
            bits_per_channel,
        })
    }

    fn read_info(&self, bytes: &[u8]) -> Result<ImageInfo, CodecError> {
        let Some(info_api) = &self.api.info else {
            return info_from_decoded(&self.decode_all(bytes)?);
        };
        check_signature(bytes)?;

        let raw = unsafe { (info_api.read_info)(bytes.as_ptr().cast(), bytes.len()) };
        if raw.is_null() {
            return Err(CodecError::Malformed("libflif could not read the header".to_string()));
        }
        let info = unsafe {
            ImageInfo {
                width: (info_api.width)(raw),
                height: (info_api.height)(raw),
                channels: (info_api.channels)(raw),
                bits_per_channel: (info_api.depth)(raw),
                frame_count: u32::try_from((info_api.num_images)(raw)).unwrap_or(u32::MAX),
                // The header-only API does not expose the loop count.
                loop_count: 0,
            }
        };
        unsafe { (info_api.destroy_info)(raw) };
        Ok(info)
    }
}
