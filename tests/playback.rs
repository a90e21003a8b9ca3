use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use flif_shell_win::layout::{Rect, compute_layout};
use flif_shell_win::properties::{ImageProperties, ImageProperty, PropertyValue};
use flif_shell_win::{
    CodecError, DecodeError, DecodedFrame, DecodedImage, DisplaySink, Frame, FrameCodec,
    FrameSet, PlaybackController, PlaybackError, PlaybackState, PreviewSession, SessionError,
    resolve, timer_interval,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Show(usize),
    Scroll(usize),
    Icon(bool),
    Arm(Duration),
    Cancel,
}

/// Sink that appends every call to a shared log.
#[derive(Clone, Default)]
struct Journal(Rc<RefCell<Vec<Event>>>);

impl Journal {
    fn events(&self) -> Vec<Event> {
        self.0.borrow().clone()
    }

    fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn shown(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Show(i) => Some(i),
                _ => None,
            })
            .collect()
    }
}

impl DisplaySink for Journal {
    fn show_frame(&mut self, index: usize, frame: &Frame) {
        assert_eq!(frame.pixels.len(), (frame.width * frame.height * 4) as usize);
        self.0.borrow_mut().push(Event::Show(index));
    }
    fn set_scroll_position(&mut self, index: usize) {
        self.0.borrow_mut().push(Event::Scroll(index));
    }
    fn set_play_pause_icon(&mut self, is_playing: bool) {
        self.0.borrow_mut().push(Event::Icon(is_playing));
    }
    fn arm_timer(&mut self, interval: Duration) {
        self.0.borrow_mut().push(Event::Arm(interval));
    }
    fn cancel_timer(&mut self) {
        self.0.borrow_mut().push(Event::Cancel);
    }
}

fn frame(delay_ms: u64) -> Frame {
    Frame {
        width: 2,
        height: 1,
        pixels: vec![0xFF; 8],
        delay: Duration::from_millis(delay_ms),
    }
}

fn set(delays: &[u64], loop_count: u32) -> FrameSet {
    FrameSet::from_frames(delays.iter().map(|&d| frame(d)).collect(), loop_count)
        .expect("non-empty frame list")
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Codec over a toy format: each input byte is one frame, its value the
/// delay in units of 10 ms. A leading 0xEE marks corrupt input.
struct ByteCodec;

impl FrameCodec for ByteCodec {
    fn decode_all(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        if bytes.first() == Some(&0xEE) {
            return Err(CodecError::Malformed("bad header".into()));
        }
        Ok(DecodedImage {
            frames: bytes
                .iter()
                .map(|&b| DecodedFrame {
                    width: 4,
                    height: 3,
                    rgba: vec![0x80; 4 * 3 * 4],
                    delay_ms: u32::from(b) * 10,
                })
                .collect(),
            loop_count: 0,
            channels: 4,
            bits_per_channel: 8,
        })
    }
}

#[test]
fn test_single_frame_never_finishes() {
    let still = set(&[0], 0);
    for elapsed in [0, 1, 99, 100, 10_000, u64::from(u32::MAX)] {
        let r = resolve(&still, ms(elapsed));
        assert_eq!(r.frame_index, 0);
        assert!(!r.animation_finished);
    }
}

#[test]
fn test_zero_delays_finish_on_first_frame() {
    let flat = set(&[0, 0, 0], 0);
    for elapsed in [0, 5, 1_000_000] {
        let r = resolve(&flat, ms(elapsed));
        assert_eq!(r.frame_index, 0);
        assert!(r.animation_finished);
    }
}

#[test]
fn test_infinite_loop_wraps() {
    let frames = set(&[100, 100, 100], 0);
    assert_eq!(resolve(&frames, ms(350)), resolve(&frames, ms(50)));
    assert_eq!(resolve(&frames, ms(350)).frame_index, 0);
    assert_eq!(resolve(&frames, ms(3_000_250)).frame_index, 2);
}

#[test]
fn test_finite_loops_freeze_on_last_frame() {
    let frames = set(&[100, 100], 2);
    let r = resolve(&frames, ms(500));
    assert_eq!(r.frame_index, 1);
    assert!(r.animation_finished);
    assert!(!resolve(&frames, ms(399)).animation_finished);
    assert!(resolve(&frames, ms(400)).animation_finished);
}

#[test]
fn test_boundary_belongs_to_next_frame() {
    let frames = set(&[100, 100], 0);
    assert_eq!(resolve(&frames, ms(99)).frame_index, 0);
    assert_eq!(resolve(&frames, ms(100)).frame_index, 1);
}

#[test]
fn test_long_loops_do_not_overflow() {
    let frames = set(&[u64::from(u32::MAX / 2), u64::from(u32::MAX / 2)], 0);
    let total = u64::from(u32::MAX / 2) * 2;
    let elapsed = total * u64::from(u32::MAX) + 1;
    assert_eq!(resolve(&frames, ms(elapsed)).frame_index, 0);
}

#[test]
fn test_timer_interval_formula() {
    assert_eq!(timer_interval(ms(30)), ms(25));
    assert_eq!(timer_interval(ms(10)), ms(25));
    assert_eq!(timer_interval(ms(200)), ms(100));
}

#[test]
fn test_scrub_then_resume_continues_from_scrubbed_frame() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[100, 100, 100], 0), journal.clone());
    ctl.start().expect("start");

    ctl.scrub(1).expect("scrub");
    assert_eq!(ctl.state(), PlaybackState::Pause);
    assert_eq!(ctl.elapsed_before_pause(), ms(100));

    let t0 = Instant::now();
    assert_eq!(ctl.toggle_play(t0), Ok(PlaybackState::Play));
    let r = ctl.tick(t0).expect("tick");
    assert_eq!(r.frame_index, 1);
    assert_eq!(ctl.current_frame_index(), Some(1));

    let r = ctl.tick(t0 + ms(100)).expect("tick");
    assert_eq!(r.frame_index, 2);
}

#[test]
fn test_scrub_does_not_move_scrollbar() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[100, 100, 100], 0), journal.clone());
    ctl.start().expect("start");
    journal.clear();

    ctl.scrub(2).expect("scrub");
    assert_eq!(journal.events(), vec![Event::Show(2)]);
}

#[test]
fn test_double_toggle_keeps_displayed_frame() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[100, 100, 100], 0), journal.clone());
    ctl.start().expect("start");
    let t0 = Instant::now();

    // From STOP.
    let before = ctl.current_frame_index();
    ctl.toggle_play(t0).expect("play");
    ctl.toggle_play(t0).expect("pause");
    assert_eq!(ctl.current_frame_index(), before);

    // From PLAY, mid-animation.
    ctl.toggle_play(t0).expect("play");
    ctl.tick(t0 + ms(150)).expect("tick");
    let before = ctl.current_frame_index();
    let now = t0 + ms(150);
    ctl.toggle_play(now).expect("pause");
    ctl.toggle_play(now).expect("play");
    assert_eq!(ctl.tick(now).expect("tick").frame_index, 1);
    assert_eq!(ctl.current_frame_index(), before);

    // From PAUSE.
    ctl.toggle_play(now).expect("pause");
    let before = ctl.current_frame_index();
    ctl.toggle_play(now).expect("play");
    ctl.toggle_play(now).expect("pause");
    assert_eq!(ctl.current_frame_index(), before);
}

#[test]
fn test_toggle_pushes_icon_and_timer_only() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[60, 200], 0), journal.clone());
    ctl.start().expect("start");
    journal.clear();

    let t0 = Instant::now();
    ctl.toggle_play(t0).expect("play");
    ctl.toggle_play(t0 + ms(10)).expect("pause");
    assert_eq!(
        journal.events(),
        vec![
            Event::Arm(ms(30)),
            Event::Icon(true),
            Event::Cancel,
            Event::Icon(false),
        ]
    );
}

#[test]
fn test_start_twice_is_rejected() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[100, 100], 0), journal.clone());
    ctl.start().expect("start");
    assert_eq!(
        journal.events(),
        vec![Event::Show(0), Event::Scroll(0), Event::Icon(false)]
    );
    journal.clear();

    assert_eq!(ctl.start(), Err(PlaybackError::AlreadyStarted));
    assert!(journal.events().is_empty());
}

#[test]
fn test_tick_while_stopped_is_rejected() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[100, 100], 0), journal.clone());
    ctl.start().expect("start");
    journal.clear();

    assert_eq!(ctl.tick(Instant::now()), Err(PlaybackError::NotPlaying));
    assert_eq!(ctl.state(), PlaybackState::Stop);
    assert!(journal.events().is_empty());
}

#[test]
fn test_finished_animation_stops_on_last_frame() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[100, 100], 1), journal.clone());
    ctl.start().expect("start");
    let t0 = Instant::now();
    ctl.toggle_play(t0).expect("play");
    journal.clear();

    let r = ctl.tick(t0 + ms(250)).expect("tick");
    assert!(r.animation_finished);
    assert_eq!(ctl.state(), PlaybackState::Stop);
    assert_eq!(ctl.current_frame_index(), Some(1));
    assert_eq!(
        journal.events(),
        vec![
            Event::Show(1),
            Event::Scroll(1),
            Event::Cancel,
            Event::Icon(false)
        ]
    );

    // Playing again starts from the top.
    let t1 = t0 + ms(1_000);
    ctl.toggle_play(t1).expect("replay");
    assert_eq!(ctl.tick(t1).expect("tick").frame_index, 0);
}

#[test]
fn test_unload_cancels_timer_and_is_terminal() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[100, 100], 0), journal.clone());
    ctl.start().expect("start");
    let t0 = Instant::now();
    ctl.toggle_play(t0).expect("play");
    journal.clear();

    ctl.unload().expect("unload");
    assert_eq!(journal.events(), vec![Event::Cancel]);
    assert!(ctl.is_unloaded());

    assert_eq!(ctl.tick(t0), Err(PlaybackError::Unloaded));
    assert_eq!(ctl.toggle_play(t0), Err(PlaybackError::Unloaded));
    assert_eq!(ctl.scrub(0), Err(PlaybackError::Unloaded));
    assert_eq!(ctl.start(), Err(PlaybackError::Unloaded));
    assert_eq!(ctl.unload(), Err(PlaybackError::Unloaded));
    drop(ctl);
    assert_eq!(journal.events(), vec![Event::Cancel]);
}

#[test]
fn test_dropping_a_playing_controller_cancels_timer() {
    let journal = Journal::default();
    let mut ctl = PlaybackController::new(set(&[100, 100], 0), journal.clone());
    ctl.start().expect("start");
    ctl.toggle_play(Instant::now()).expect("play");
    journal.clear();
    drop(ctl);
    assert_eq!(journal.events(), vec![Event::Cancel]);
}

#[test]
fn test_session_plays_decoded_stream() {
    let journal = Journal::default();
    let mut session = PreviewSession::new();
    session.set_rect(Rect::from_size(0, 0, 400, 300));
    session.initialize(vec![10, 10, 10]).expect("initialize");
    session.start(&ByteCodec, journal.clone()).expect("start");

    assert_eq!(session.state(), Some(PlaybackState::Stop));
    assert_eq!(journal.shown(), vec![0]);
    assert!(session.layout().play_button.is_some());

    let t0 = Instant::now();
    session.toggle_play(t0).expect("play");
    session.tick(t0 + ms(120)).expect("tick");
    session.tick(t0 + ms(250)).expect("tick");
    assert_eq!(journal.shown(), vec![0, 1, 2]);

    assert_eq!(
        session.start(&ByteCodec, journal.clone()),
        Err(SessionError::AlreadyStarted)
    );

    session.unload();
    assert_eq!(journal.events().last(), Some(&Event::Cancel));
    assert_eq!(session.tick(t0), Err(SessionError::Unloaded));
}

#[test]
fn test_session_decode_failure_never_touches_sink() {
    let journal = Journal::default();
    let mut session = PreviewSession::new();
    session.initialize(vec![0xEE, 1]).expect("initialize");
    assert!(matches!(
        session.start(&ByteCodec, journal.clone()),
        Err(SessionError::Decode(DecodeError::Malformed(_)))
    ));
    assert!(journal.events().is_empty());
    assert_eq!(session.state(), None);
}

#[test]
fn test_session_requires_data() {
    let mut session: PreviewSession<Journal> = PreviewSession::new();
    assert_eq!(
        session.start(&ByteCodec, Journal::default()),
        Err(SessionError::NotInitialized)
    );
}

#[test]
fn test_layout_keeps_aspect_and_stacks_controls() {
    let layout = compute_layout(500, 500, (400, 200), true);
    let image = layout.image;
    let ratio = f64::from(image.width()) / f64::from(image.height());
    assert!((ratio - 2.0).abs() < 0.02);

    let button = layout.play_button.expect("play button");
    let bar = layout.scrollbar.expect("scrollbar");
    assert!(button.top >= image.bottom);
    assert_eq!(button.top, bar.top);
    assert_eq!(button.left, image.left);
    assert!(bar.left >= button.right);
    assert!(bar.right <= image.right);
}

#[test]
fn test_property_values_from_frames() {
    let frames = FrameSet::decode(&[10], &ByteCodec).expect("decode");
    let props = ImageProperties::from_frame_set(&frames);
    assert_eq!(
        props.value(ImageProperty::Dimensions),
        PropertyValue::Text("4 x 3".to_string())
    );
    assert_eq!(props.value(ImageProperty::BitDepth), PropertyValue::U32(32));
    assert_eq!(props.value(ImageProperty::HorizontalSize), PropertyValue::U32(4));
}
