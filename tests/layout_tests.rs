use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use image::Rgba;
use led_matrix_hub::frame::{self, Frame};
use led_matrix_hub::gesture::GestureEvent;
use led_matrix_hub::layout::{LayoutTimings, PaneLayout};
use led_matrix_hub::pane::Pane;

struct StubPane {
    color: Rgba<u8>,
    enabled: bool,
    keep_awake: bool,
    gestures_seen: Arc<AtomicUsize>,
}

impl StubPane {
    fn new(r: u8) -> Self {
        Self {
            color: Rgba([r, 0, 0, 255]),
            enabled: true,
            keep_awake: false,
            gestures_seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn disabled(r: u8) -> Self {
        Self {
            enabled: false,
            ..Self::new(r)
        }
    }
}

impl Pane for StubPane {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn keep_awake(&self) -> bool {
        self.keep_awake
    }

    fn render(&mut self) -> Result<Frame> {
        Ok(Frame::from_pixel(frame::WIDTH, frame::HEIGHT, self.color))
    }

    fn gesture(&mut self, _gesture: &GestureEvent) {
        self.gestures_seen.fetch_add(1, Ordering::SeqCst);
    }
}

fn instant_timings() -> LayoutTimings {
    LayoutTimings {
        pan_duration: Duration::ZERO,
        wake_transition: Duration::ZERO,
        sleep_transition: Duration::ZERO,
        sleep_timeout: Duration::from_secs(3600),
        force_all_panes: false,
    }
}

#[test]
fn starts_asleep_with_blank_frame() {
    let (mut layout, _wake) = PaneLayout::new(instant_timings());
    layout.add_pane(Box::new(StubPane::new(200)));

    let out = layout.render().unwrap();
    assert!(out.asleep);
    assert!(out.frame.pixels().all(|p| p.0 == [0, 0, 0, 0]));
}

#[test]
fn gesture_while_asleep_wakes_and_signals() {
    let (mut layout, mut wake) = PaneLayout::new(instant_timings());
    layout.add_pane(Box::new(StubPane::new(200)));

    layout.on_gesture(&GestureEvent::Tap);
    assert!(layout.is_awake());
    wake.try_recv().expect("wake signal should be queued");
    // The slot is single-shot; no second token piles up.
    assert!(wake.try_recv().is_err());
}

#[test]
fn stable_render_is_exactly_the_active_pane() {
    let (mut layout, _wake) = PaneLayout::new(instant_timings());
    layout.add_pane(Box::new(StubPane::new(123)));
    layout.wake();

    let out = layout.render().unwrap();
    assert!(!out.asleep);
    assert!(out.frame.pixels().all(|p| p.0 == [123, 0, 0, 255]));
}

#[test]
fn pan_skips_disabled_and_wraps() {
    let (mut layout, _wake) = PaneLayout::new(instant_timings());
    layout.add_pane(Box::new(StubPane::new(0)));
    layout.add_pane(Box::new(StubPane::disabled(1)));
    layout.add_pane(Box::new(StubPane::new(2)));
    layout.wake();
    layout.render().unwrap();

    layout.pan_by(1);
    assert_eq!(layout.target_pane(), 2, "disabled pane 1 must be skipped");
    layout.render().unwrap(); // zero-duration pan completes
    assert_eq!(layout.current_pane(), 2);

    layout.pan_by(1);
    assert_eq!(layout.target_pane(), 0, "pan wraps past the end");
}

#[test]
fn pan_backwards_wraps_the_other_way() {
    let (mut layout, _wake) = PaneLayout::new(instant_timings());
    layout.add_pane(Box::new(StubPane::new(0)));
    layout.add_pane(Box::new(StubPane::new(1)));
    layout.wake();
    layout.render().unwrap();

    layout.pan_by(-1);
    assert_eq!(layout.target_pane(), 1);
}

#[test]
fn pan_with_no_other_enabled_pane_is_a_noop() {
    let (mut layout, _wake) = PaneLayout::new(instant_timings());
    layout.add_pane(Box::new(StubPane::new(0)));
    layout.add_pane(Box::new(StubPane::disabled(1)));
    layout.add_pane(Box::new(StubPane::disabled(2)));
    layout.wake();
    layout.render().unwrap();

    layout.pan_by(1);
    assert_eq!(layout.current_pane(), 0);
    assert_eq!(layout.target_pane(), 0);
}

#[test]
fn force_all_panes_lands_on_disabled_neighbors() {
    let timings = LayoutTimings {
        force_all_panes: true,
        ..instant_timings()
    };
    let (mut layout, _wake) = PaneLayout::new(timings);
    layout.add_pane(Box::new(StubPane::new(0)));
    layout.add_pane(Box::new(StubPane::disabled(1)));
    layout.wake();
    layout.render().unwrap();

    layout.pan_by(1);
    assert_eq!(layout.target_pane(), 1);
}

#[test]
fn gestures_are_not_forwarded_mid_pan() {
    let timings = LayoutTimings {
        pan_duration: Duration::from_secs(60),
        ..instant_timings()
    };
    let (mut layout, _wake) = PaneLayout::new(timings);
    let first = StubPane::new(0);
    let seen_by_first = Arc::clone(&first.gestures_seen);
    layout.add_pane(Box::new(first));
    layout.add_pane(Box::new(StubPane::new(1)));
    layout.wake();
    layout.render().unwrap();

    // Starts a long pan; the same call must not also forward the flick.
    layout.on_gesture(&GestureEvent::FlickEastToWest);
    // And gestures during the pan are swallowed.
    layout.on_gesture(&GestureEvent::Tap);
    assert_eq!(seen_by_first.load(Ordering::SeqCst), 0);
}

#[test]
fn gestures_reach_the_active_pane_when_stable() {
    let (mut layout, _wake) = PaneLayout::new(instant_timings());
    let pane = StubPane::new(0);
    let seen = Arc::clone(&pane.gestures_seen);
    layout.add_pane(Box::new(pane));
    layout.wake();
    layout.render().unwrap();

    layout.on_gesture(&GestureEvent::Tap);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn mid_pan_render_composites_both_panes() {
    let timings = LayoutTimings {
        pan_duration: Duration::from_secs(60),
        ..instant_timings()
    };
    let (mut layout, _wake) = PaneLayout::new(timings);
    layout.add_pane(Box::new(StubPane::new(10)));
    layout.add_pane(Box::new(StubPane::new(20)));
    layout.wake();
    layout.render().unwrap();

    layout.pan_by(1);
    let out = layout.render().unwrap();
    // Offset is still ~0 this early in a long pan, but the pan is in
    // flight, so the frame must come only from current and/or target panes.
    for px in out.frame.pixels() {
        assert!(px.0 == [10, 0, 0, 255] || px.0 == [20, 0, 0, 255]);
    }
}

#[test]
fn fade_scales_rgb_but_never_alpha() {
    let timings = LayoutTimings {
        wake_transition: Duration::from_secs(60),
        ..instant_timings()
    };
    let (mut layout, _wake) = PaneLayout::new(timings);
    layout.add_pane(Box::new(StubPane::new(255)));

    layout.wake();
    let out = layout.render().unwrap();
    // Seconds into a 60s ease-out fade-in the scale is still well below 1.
    for px in out.frame.pixels() {
        assert!(px[0] < 200, "red should be faded, got {}", px[0]);
        assert_eq!(px[3], 255, "alpha must never fade");
    }
}

#[test]
fn sleep_timeout_respects_keep_awake() {
    let timings = LayoutTimings {
        sleep_timeout: Duration::ZERO,
        ..instant_timings()
    };
    let (mut layout, _wake) = PaneLayout::new(timings);
    let mut pane = StubPane::new(0);
    pane.keep_awake = true;
    layout.add_pane(Box::new(pane));
    layout.wake();
    layout.render().unwrap();

    layout.maybe_sleep();
    assert!(layout.is_awake(), "keep-awake pane must suppress sleep");
}

#[test]
fn sleep_timeout_fades_out_and_parks() {
    let timings = LayoutTimings {
        sleep_timeout: Duration::ZERO,
        ..instant_timings()
    };
    let (mut layout, _wake) = PaneLayout::new(timings);
    layout.add_pane(Box::new(StubPane::new(0)));
    layout.wake();
    layout.render().unwrap();

    layout.maybe_sleep();
    assert!(!layout.is_awake());
    // Zero-length fade retires on the next render, which then reports asleep
    // one call later.
    layout.render().unwrap();
    let out = layout.render().unwrap();
    assert!(out.asleep);
}

#[test]
fn removing_the_current_pane_repairs_indices() {
    let (mut layout, _wake) = PaneLayout::new(instant_timings());
    let first = layout.add_pane(Box::new(StubPane::new(1)));
    layout.add_pane(Box::new(StubPane::new(2)));
    layout.wake();
    layout.render().unwrap();

    layout.remove_pane(first);
    assert_eq!(layout.pane_count(), 1);
    let out = layout.render().unwrap();
    assert!(out.frame.pixels().all(|p| p.0 == [2, 0, 0, 255]));
}
