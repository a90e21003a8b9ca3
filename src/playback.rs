//! Play / pause / stop state machine driving a [`DisplaySink`].
//!
//! All calls come from one UI thread. Time is passed in explicitly so the
//! controller never reads a clock of its own.

use std::time::{Duration, Instant};

use crate::clock::{FrameResolution, resolve, timer_interval};
use crate::error::PlaybackError;
use crate::frames::{Frame, FrameSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Play,
    Pause,
    Stop,
}

/// What the controller needs from the host window.
pub trait DisplaySink {
    /// Make `frame` (index `index`) the visible image.
    fn show_frame(&mut self, index: usize, frame: &Frame);
    fn set_scroll_position(&mut self, index: usize);
    fn set_play_pause_icon(&mut self, is_playing: bool);
    fn arm_timer(&mut self, interval: Duration);
    fn cancel_timer(&mut self);
}

impl<S: DisplaySink + ?Sized> DisplaySink for &mut S {
    fn show_frame(&mut self, index: usize, frame: &Frame) {
        (**self).show_frame(index, frame)
    }
    fn set_scroll_position(&mut self, index: usize) {
        (**self).set_scroll_position(index)
    }
    fn set_play_pause_icon(&mut self, is_playing: bool) {
        (**self).set_play_pause_icon(is_playing)
    }
    fn arm_timer(&mut self, interval: Duration) {
        (**self).arm_timer(interval)
    }
    fn cancel_timer(&mut self) {
        (**self).cancel_timer()
    }
}

/// `play_started_at` expressed as an instant plus an offset, so resuming at
/// an elapsed time larger than the process uptime never underflows.
#[derive(Debug, Clone, Copy)]
struct PlayAnchor {
    resumed_at: Instant,
    offset: Duration,
}

impl PlayAnchor {
    fn elapsed_at(&self, now: Instant) -> Duration {
        self.offset + now.saturating_duration_since(self.resumed_at)
    }
}

pub struct PlaybackController<S: DisplaySink> {
    frames: Option<FrameSet>,
    sink: S,
    state: PlaybackState,
    anchor: Option<PlayAnchor>,
    elapsed_before_pause: Duration,
    current_frame: Option<usize>,
    started: bool,
    timer_armed: bool,
}

impl<S: DisplaySink> PlaybackController<S> {
    pub fn new(frames: FrameSet, sink: S) -> Self {
        Self {
            frames: Some(frames),
            sink,
            state: PlaybackState::Stop,
            anchor: None,
            elapsed_before_pause: Duration::ZERO,
            current_frame: None,
            started: false,
            timer_armed: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_frame_index(&self) -> Option<usize> {
        self.current_frame
    }

    /// Frame currently on screen, if any.
    pub fn current_frame(&self) -> Option<(usize, &Frame)> {
        let index = self.current_frame?;
        let frame = self.frames.as_ref()?.frame(index)?;
        Some((index, frame))
    }

    pub fn frame_set(&self) -> Option<&FrameSet> {
        self.frames.as_ref()
    }

    pub fn elapsed_before_pause(&self) -> Duration {
        self.elapsed_before_pause
    }

    /// Play time at `now`: live while playing, frozen otherwise.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        match self.anchor {
            Some(anchor) => anchor.elapsed_at(now),
            None => self.elapsed_before_pause,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_unloaded(&self) -> bool {
        self.frames.is_none()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Shows frame 0. Playback stays stopped until the first toggle.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        let frames = self.frames.as_ref().ok_or(PlaybackError::Unloaded)?;
        if self.started {
            return Err(PlaybackError::AlreadyStarted);
        }
        self.started = true;
        self.current_frame = Some(0);
        self.sink.show_frame(0, &frames.frames()[0]);
        self.sink.set_scroll_position(0);
        self.sink.set_play_pause_icon(false);
        Ok(())
    }

    /// Play from stop/pause, pause from play. Returns the new state.
    pub fn toggle_play(&mut self, now: Instant) -> Result<PlaybackState, PlaybackError> {
        let frames = self.started_frames()?;
        if !frames.is_animated() {
            return Err(PlaybackError::StaticImage);
        }
        let interval = timer_interval(frames.min_delay());

        match self.state {
            PlaybackState::Play => {
                self.elapsed_before_pause = self.elapsed_at(now);
                self.anchor = None;
                self.state = PlaybackState::Pause;
                self.disarm();
                self.sink.set_play_pause_icon(false);
            }
            PlaybackState::Pause | PlaybackState::Stop => {
                self.anchor = Some(PlayAnchor {
                    resumed_at: now,
                    offset: self.elapsed_before_pause,
                });
                self.elapsed_before_pause = Duration::ZERO;
                self.state = PlaybackState::Play;
                self.sink.arm_timer(interval);
                self.timer_armed = true;
                self.sink.set_play_pause_icon(true);
            }
        }
        Ok(self.state)
    }

    /// Timer callback. Only valid while playing.
    pub fn tick(&mut self, now: Instant) -> Result<FrameResolution, PlaybackError> {
        self.started_frames()?;
        let Some(anchor) = self.anchor.filter(|_| self.state == PlaybackState::Play) else {
            return Err(PlaybackError::NotPlaying);
        };
        let frames = self.frames.as_ref().ok_or(PlaybackError::Unloaded)?;
        let resolution = resolve(frames, anchor.elapsed_at(now));

        if self.current_frame != Some(resolution.frame_index) {
            self.current_frame = Some(resolution.frame_index);
            self.sink
                .show_frame(resolution.frame_index, &frames.frames()[resolution.frame_index]);
            self.sink.set_scroll_position(resolution.frame_index);
        }

        if resolution.animation_finished {
            self.anchor = None;
            // Next play starts over instead of finishing again immediately.
            self.elapsed_before_pause = Duration::ZERO;
            self.state = PlaybackState::Stop;
            self.disarm();
            self.sink.set_play_pause_icon(false);
        }
        Ok(resolution)
    }

    /// Manual seek from the scrollbar. Always ends paused; the scrollbar is
    /// left alone since the user already moved it.
    pub fn scrub(&mut self, index: usize) -> Result<(), PlaybackError> {
        let frames = self.started_frames()?;
        if index >= frames.len() {
            return Err(PlaybackError::FrameOutOfRange {
                index,
                count: frames.len(),
            });
        }
        let resume_at = frames.delay_before(index);

        let was_playing = self.state == PlaybackState::Play;
        self.anchor = None;
        self.state = PlaybackState::Pause;
        self.elapsed_before_pause = resume_at;
        self.current_frame = Some(index);
        if was_playing {
            self.disarm();
            self.sink.set_play_pause_icon(false);
        }
        if let Some(frames) = self.frames.as_ref() {
            self.sink.show_frame(index, &frames.frames()[index]);
        }
        Ok(())
    }

    /// Drops the frames and the timer. Nothing works afterwards.
    pub fn unload(&mut self) -> Result<(), PlaybackError> {
        if self.frames.is_none() {
            return Err(PlaybackError::Unloaded);
        }
        self.disarm();
        self.frames = None;
        self.anchor = None;
        self.current_frame = None;
        self.state = PlaybackState::Stop;
        self.elapsed_before_pause = Duration::ZERO;
        Ok(())
    }

    fn started_frames(&self) -> Result<&FrameSet, PlaybackError> {
        let frames = self.frames.as_ref().ok_or(PlaybackError::Unloaded)?;
        if !self.started {
            return Err(PlaybackError::NotStarted);
        }
        Ok(frames)
    }

    fn disarm(&mut self) {
        if self.timer_armed {
            self.timer_armed = false;
            self.sink.cancel_timer();
        }
    }
}

impl<S: DisplaySink> Drop for PlaybackController<S> {
    fn drop(&mut self) {
        self.disarm();
    }
}
