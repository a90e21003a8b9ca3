//! Error types shared by the decoder, the playback engine and the preview session.

use thiserror::Error;

/// Failure reported by a [`FrameCodec`](crate::codec::FrameCodec) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("input ended before a complete frame was decoded")]
    Truncated,
    #[error("corrupt stream: {0}")]
    Malformed(String),
    #[error("unsupported stream: {0}")]
    Unsupported(String),
}

/// Why a byte buffer could not be turned into a [`FrameSet`](crate::frames::FrameSet).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated image: no frame could be decoded")]
    Truncated,
    #[error("malformed image: {0}")]
    Malformed(String),
    #[error("unsupported image: {0}")]
    Unsupported(String),
}

impl From<CodecError> for DecodeError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Truncated => DecodeError::Truncated,
            CodecError::Malformed(msg) => DecodeError::Malformed(msg),
            CodecError::Unsupported(msg) => DecodeError::Unsupported(msg),
        }
    }
}

/// Why a frame could not be copied into a caller's buffer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CopyError {
    #[error("copy rectangle lies outside the frame")]
    InvalidRect,
    #[error("stride is smaller than one row of the copy rectangle")]
    StrideTooSmall,
    #[error("buffer holds {got} bytes, {needed} needed")]
    BufferTooSmall { needed: usize, got: usize },
}

/// Contract violations of the playback state machine.
///
/// None of these change controller state; the call is dropped and the error
/// handed back so the host can log it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("playback was already started")]
    AlreadyStarted,
    #[error("playback has not been started")]
    NotStarted,
    #[error("tick received while not playing")]
    NotPlaying,
    #[error("static image cannot be played")]
    StaticImage,
    #[error("frame {index} is out of range (frame count {count})")]
    FrameOutOfRange { index: usize, count: usize },
    #[error("playback session was unloaded")]
    Unloaded,
}

/// Errors surfaced by a preview session to its host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no image data was supplied before start")]
    NotInitialized,
    #[error("preview session already started")]
    AlreadyStarted,
    #[error("preview session was unloaded")]
    Unloaded,
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("failed to create display resource: {0}")]
    Resource(String),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}
