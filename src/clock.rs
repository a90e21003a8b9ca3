//! Elapsed play time to visible frame.
//!
//! Frame `i` owns the half-open window `[start_i, start_i + delay_i)` inside a
//! loop, so a sample landing exactly on a boundary shows the later frame.

use std::time::Duration;

use crate::frames::{FrameSet, duration_ms};

/// Lower bound for the playback timer.
pub const MIN_TIMER_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameResolution {
    pub frame_index: usize,
    pub animation_finished: bool,
}

impl FrameResolution {
    fn showing(frame_index: usize) -> Self {
        Self {
            frame_index,
            animation_finished: false,
        }
    }

    fn finished(frame_index: usize) -> Self {
        Self {
            frame_index,
            animation_finished: true,
        }
    }
}

/// Resolves which frame is visible `elapsed` after play started at frame 0.
pub fn resolve(frame_set: &FrameSet, elapsed: Duration) -> FrameResolution {
    if !frame_set.is_animated() {
        return FrameResolution::showing(0);
    }

    let total = frame_set.total_loop_ms();
    if total == 0 {
        return FrameResolution::finished(0);
    }

    let elapsed = duration_ms(elapsed);
    let loops_done = elapsed / total;
    let loop_count = u64::from(frame_set.loop_count());
    if loop_count != 0 && loops_done >= loop_count {
        return FrameResolution::finished(frame_set.last_index());
    }

    let position = elapsed % total;
    let mut frame_end = 0u64;
    for (index, frame) in frame_set.frames().iter().enumerate() {
        frame_end = frame_end.saturating_add(duration_ms(frame.delay));
        if position < frame_end {
            return FrameResolution::showing(index);
        }
    }

    // position < total, so the walk above always returns.
    FrameResolution::showing(frame_set.last_index())
}

/// Timer period while playing: half the shortest delay, never below 25 ms.
pub fn timer_interval(min_delay: Duration) -> Duration {
    (min_delay / 2).max(MIN_TIMER_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::Frame;

    fn frames(delays: &[u64], loop_count: u32) -> FrameSet {
        let frames = delays
            .iter()
            .map(|&ms| Frame {
                width: 1,
                height: 1,
                pixels: vec![0; 4],
                delay: Duration::from_millis(ms),
            })
            .collect();
        FrameSet::from_frames(frames, loop_count).unwrap()
    }

    fn at(set: &FrameSet, ms: u64) -> FrameResolution {
        resolve(set, Duration::from_millis(ms))
    }

    #[test]
    fn test_single_frame_never_finishes() {
        let set = frames(&[0], 1);
        for ms in [0, 1, 99, 100_000, u64::MAX / 2] {
            assert_eq!(at(&set, ms), FrameResolution::showing(0));
        }
    }

    #[test]
    fn test_all_zero_delays_finish_immediately() {
        let set = frames(&[0, 0, 0], 0);
        for ms in [0, 5, 1_000] {
            assert_eq!(at(&set, ms), FrameResolution::finished(0));
        }
    }

    #[test]
    fn test_infinite_loop_wraps() {
        let set = frames(&[100, 100, 100], 0);
        assert_eq!(at(&set, 350), at(&set, 50));
        assert_eq!(at(&set, 350), FrameResolution::showing(0));
        assert_eq!(at(&set, 299), FrameResolution::showing(2));
        assert_eq!(at(&set, 3_000_250), FrameResolution::showing(2));
    }

    #[test]
    fn test_finite_loop_freezes_on_last_frame() {
        let set = frames(&[100, 100], 2);
        assert_eq!(at(&set, 399), FrameResolution::showing(1));
        assert_eq!(at(&set, 400), FrameResolution::finished(1));
        assert_eq!(at(&set, 500), FrameResolution::finished(1));
    }

    #[test]
    fn test_boundary_belongs_to_next_frame() {
        let set = frames(&[100, 100], 0);
        assert_eq!(at(&set, 99).frame_index, 0);
        assert_eq!(at(&set, 100).frame_index, 1);
        assert_eq!(at(&set, 200).frame_index, 0);
    }

    #[test]
    fn test_zero_delay_frame_is_skipped() {
        let set = frames(&[50, 0, 50], 0);
        assert_eq!(at(&set, 49).frame_index, 0);
        assert_eq!(at(&set, 50).frame_index, 2);
    }

    #[test]
    fn test_long_animation_does_not_overflow() {
        let long = u64::from(u32::MAX >> 1);
        let set = frames(&[long, long], u32::MAX >> 1);
        let elapsed = long * 2 * u64::from(u32::MAX >> 1);
        assert_eq!(at(&set, elapsed - 1), FrameResolution::showing(1));
        assert_eq!(at(&set, elapsed), FrameResolution::finished(1));
    }

    #[test]
    fn test_saturated_delays_resolve_without_panic() {
        let set = frames(&[u64::MAX, u64::MAX, 10], 0);
        assert_eq!(at(&set, 5), FrameResolution::showing(0));
        assert_eq!(at(&set, u64::MAX - 1), FrameResolution::showing(0));

        let once = frames(&[u64::MAX, u64::MAX, 10], 1);
        assert_eq!(at(&once, u64::MAX), FrameResolution::finished(2));
    }

    #[test]
    fn test_timer_interval() {
        let ms = Duration::from_millis;
        assert_eq!(timer_interval(ms(30)), ms(25));
        assert_eq!(timer_interval(ms(10)), ms(25));
        assert_eq!(timer_interval(ms(200)), ms(100));
        assert_eq!(timer_interval(Duration::ZERO), ms(25));
    }
}
