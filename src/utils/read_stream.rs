use windows::Win32::Foundation::{E_FAIL, S_FALSE};
use windows::Win32::System::Com::{ISequentialStream, IStream, STREAM_SEEK_SET};
use windows::core::{Error, HRESULT, Interface, Result};

const CHUNK: usize = 8192;

/// Rewinds `stream` and reads it to the end. An empty stream is an error.
pub fn read_stream_to_end(stream: &IStream) -> Result<Vec<u8>> {
    unsafe {
        stream.Seek(0, STREAM_SEEK_SET, None)?;
    }

    let seq: ISequentialStream = stream.cast()?;
    let mut data = Vec::<u8>::new();
    let mut buf = [0u8; CHUNK];

    loop {
        let mut read = 0u32;
        let hr = unsafe { seq.Read(buf.as_mut_ptr() as *mut _, buf.len() as u32, Some(&mut read)) };
        if hr.is_err() {
            return Err(Error::from(hr));
        }
        if read > 0 {
            data.extend_from_slice(&buf[..read as usize]);
        }
        if hr == HRESULT::from(S_FALSE) || read == 0 {
            break;
        }
    }

    if data.is_empty() {
        return Err(Error::from(E_FAIL));
    }
    Ok(data)
}
