//! One preview pane lifetime: initialize, start once, relayout, unload.

use std::time::Instant;

use crate::clock::FrameResolution;
use crate::codec::FrameCodec;
use crate::error::SessionError;
use crate::frames::FrameSet;
use crate::layout::{PreviewLayout, Rect, compute_layout};
use crate::playback::{DisplaySink, PlaybackController, PlaybackState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Started,
    Unloaded,
}

pub struct PreviewSession<S: DisplaySink> {
    input: Option<Vec<u8>>,
    rect: Rect,
    layout: PreviewLayout,
    controller: Option<PlaybackController<S>>,
    phase: Phase,
}

impl<S: DisplaySink> Default for PreviewSession<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DisplaySink> PreviewSession<S> {
    pub fn new() -> Self {
        Self {
            input: None,
            rect: Rect::default(),
            layout: PreviewLayout::default(),
            controller: None,
            phase: Phase::Idle,
        }
    }

    /// Stores the image bytes. Nothing is decoded until [`start`](Self::start).
    pub fn initialize(&mut self, bytes: Vec<u8>) -> Result<(), SessionError> {
        match self.phase {
            Phase::Idle => {
                self.input = Some(bytes);
                Ok(())
            }
            Phase::Started => Err(SessionError::AlreadyStarted),
            Phase::Unloaded => Err(SessionError::Unloaded),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.input.is_some()
    }

    /// Decodes the stored bytes and shows the first frame.
    ///
    /// Runs at most once. On a decode error `sink` is dropped untouched and
    /// the session never gets playback state.
    pub fn start(&mut self, codec: &dyn FrameCodec, sink: S) -> Result<(), SessionError> {
        match self.phase {
            Phase::Idle => {}
            Phase::Started => return Err(SessionError::AlreadyStarted),
            Phase::Unloaded => return Err(SessionError::Unloaded),
        }
        let bytes = self.input.take().ok_or(SessionError::NotInitialized)?;
        self.phase = Phase::Started;

        let frames = FrameSet::decode(&bytes, codec)?;
        drop(bytes);

        let mut controller = PlaybackController::new(frames, sink);
        controller.start()?;
        self.controller = Some(controller);
        self.relayout();
        Ok(())
    }

    /// New pane rectangle; only the layout changes.
    pub fn set_rect(&mut self, rect: Rect) -> PreviewLayout {
        self.rect = rect;
        self.relayout();
        self.layout
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn layout(&self) -> PreviewLayout {
        self.layout
    }

    pub fn frame_set(&self) -> Option<&FrameSet> {
        self.controller.as_ref().and_then(|c| c.frame_set())
    }

    pub fn controller(&self) -> Option<&PlaybackController<S>> {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> Option<&mut PlaybackController<S>> {
        self.controller.as_mut()
    }

    pub fn state(&self) -> Option<PlaybackState> {
        self.controller.as_ref().map(|c| c.state())
    }

    pub fn toggle_play(&mut self, now: Instant) -> Result<PlaybackState, SessionError> {
        Ok(self.playing_controller()?.toggle_play(now)?)
    }

    pub fn tick(&mut self, now: Instant) -> Result<FrameResolution, SessionError> {
        Ok(self.playing_controller()?.tick(now)?)
    }

    pub fn scrub(&mut self, index: usize) -> Result<(), SessionError> {
        Ok(self.playing_controller()?.scrub(index)?)
    }

    /// Releases frames, timer and input. Safe to call more than once.
    pub fn unload(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            let _ = controller.unload();
        }
        self.input = None;
        self.layout = PreviewLayout::default();
        self.phase = Phase::Unloaded;
    }

    fn playing_controller(&mut self) -> Result<&mut PlaybackController<S>, SessionError> {
        match self.phase {
            Phase::Unloaded => Err(SessionError::Unloaded),
            _ => self
                .controller
                .as_mut()
                .ok_or(SessionError::NotInitialized),
        }
    }

    fn relayout(&mut self) {
        self.layout = match self.frame_set() {
            Some(frames) => compute_layout(
                self.rect.width(),
                self.rect.height(),
                frames.dimensions(),
                frames.is_animated(),
            ),
            None => PreviewLayout::default(),
        };
    }
}
