//! The compositor: owns the ordered pane list, the pane-switching state
//! machine, and the wake/sleep fades, and produces one composited frame per
//! render call.
//!
//! The layout is shared between the render loop and the gesture loop behind
//! one mutex; pan and fade transitions are only ever observed atomically.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::frame::{self, Frame};
use crate::gesture::GestureEvent;
use crate::pane::Pane;
use crate::tween::{Tween, ease_out_quint};

/// Locks the shared layout, recovering from a poisoned mutex: a panicked
/// render leaves no broken invariants worth abandoning the display over.
pub fn lock(layout: &Mutex<PaneLayout>) -> MutexGuard<'_, PaneLayout> {
    layout.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transition timing, lifted out of global state so the layout is
/// constructible in tests with arbitrary durations.
#[derive(Debug, Clone)]
pub struct LayoutTimings {
    pub pan_duration: Duration,
    pub wake_transition: Duration,
    pub sleep_transition: Duration,
    pub sleep_timeout: Duration,
    /// Pan onto disabled panes too (debug aid).
    pub force_all_panes: bool,
}

impl Default for LayoutTimings {
    fn default() -> Self {
        Self {
            pan_duration: Duration::from_millis(400),
            wake_transition: Duration::from_millis(600),
            sleep_transition: Duration::from_secs(1),
            sleep_timeout: Duration::from_secs(30),
            force_all_panes: false,
        }
    }
}

/// Stable handle for a pane added to the layout, used to remove it again
/// when e.g. a remote pane disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneId(u64);

/// The output of one render call.
pub struct RenderedFrame {
    pub frame: Frame,
    /// True when the layout is fully asleep; the driver should write this
    /// (blank) frame once and then park on the wake receiver instead of
    /// spin-rendering.
    pub asleep: bool,
}

struct PaneEntry {
    id: PaneId,
    pane: Box<dyn Pane>,
}

pub struct PaneLayout {
    panes: Vec<PaneEntry>,
    current: usize,
    target: usize,
    pan_tween: Option<Tween>,
    fade_tween: Option<Tween>,
    awake: bool,
    last_gesture: Instant,
    next_id: u64,
    wake_tx: mpsc::Sender<()>,
    timings: LayoutTimings,
}

impl PaneLayout {
    /// Builds an empty, asleep layout. The returned receiver fires when a
    /// gesture wakes the layout; the sender side drops wake signals nobody
    /// is waiting for.
    pub fn new(timings: LayoutTimings) -> (Self, mpsc::Receiver<()>) {
        let (wake_tx, wake_rx) = mpsc::channel(1);
        (
            Self {
                panes: Vec::new(),
                current: 0,
                target: 0,
                pan_tween: None,
                fade_tween: None,
                awake: false,
                last_gesture: Instant::now(),
                next_id: 0,
                wake_tx,
                timings,
            },
            wake_rx,
        )
    }

    pub fn add_pane(&mut self, pane: Box<dyn Pane>) -> PaneId {
        let id = PaneId(self.next_id);
        self.next_id += 1;
        self.panes.push(PaneEntry { id, pane });
        id
    }

    /// Drops a pane from rotation. If the pane was current or the pan
    /// target, any in-flight pan is cancelled and the indices are repaired.
    pub fn remove_pane(&mut self, id: PaneId) {
        let Some(idx) = self.panes.iter().position(|e| e.id == id) else {
            return;
        };
        self.panes.remove(idx);
        if self.current == idx || self.target == idx {
            self.pan_tween = None;
        }
        let clamp = |i: usize| {
            let i = if i > idx { i - 1 } else { i };
            i.min(self.panes.len().saturating_sub(1))
        };
        self.current = clamp(self.current);
        self.target = clamp(self.target);
        if self.pan_tween.is_none() {
            self.target = self.current;
        }
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Starts the fade-in, resuming from wherever an in-flight fade got to.
    pub fn wake(&mut self) {
        info!("waking up");
        let current_fade = match &self.fade_tween {
            Some(t) => t.update().0,
            None => 0.0,
        };
        self.awake = true;
        self.fade_tween = Some(Tween::new(
            current_fade,
            1.0,
            Instant::now(),
            self.timings.wake_transition,
            Some(ease_out_quint),
        ));
        // Single-slot, non-blocking: only "is anyone waiting" matters.
        let _ = self.wake_tx.try_send(());
    }

    /// Starts the fade-out towards the asleep state.
    pub fn sleep(&mut self) {
        info!("going to sleep");
        self.awake = false;
        self.fade_tween = Some(Tween::new(
            1.0,
            0.0,
            Instant::now(),
            self.timings.sleep_transition,
            None,
        ));
    }

    /// Called on a watchdog tick: begins the sleep fade once no gesture has
    /// arrived for the configured timeout, unless the active pane insists on
    /// staying awake.
    pub fn maybe_sleep(&mut self) {
        if !self.awake || self.fade_tween.is_some() || self.pan_tween.is_some() {
            return;
        }
        if self.last_gesture.elapsed() <= self.timings.sleep_timeout {
            return;
        }
        if let Some(entry) = self.panes.get(self.current) {
            if entry.pane.keep_awake() {
                return;
            }
        }
        self.sleep();
    }

    /// Dispatches one gesture: wakes the layout if asleep, otherwise pans on
    /// directional flicks, otherwise forwards to the active pane. Gestures
    /// are never forwarded while a fade or pan is in flight.
    pub fn on_gesture(&mut self, gesture: &GestureEvent) {
        self.last_gesture = Instant::now();

        if !self.awake {
            self.wake();
            return;
        }

        if self.fade_tween.is_some() {
            return;
        }

        if let Some(delta) = gesture.pan_delta() {
            debug!(delta, "directional flick, panning");
            self.pan_by(delta);
        }

        if self.pan_tween.is_none() {
            if let Some(entry) = self.panes.get_mut(self.current) {
                entry.pane.gesture(gesture);
            }
        }
    }

    /// Slides to the next enabled pane in the given direction. Disabled
    /// panes are skipped (unless `force_all_panes`); if no other enabled
    /// pane exists this is a logged no-op.
    pub fn pan_by(&mut self, delta: i32) {
        if self.panes.is_empty() {
            return;
        }

        // A pan interrupting a pan restarts from the pane we were heading to.
        self.current = self.target;

        let len = self.panes.len();
        let step = |i: usize| -> usize {
            if delta > 0 {
                (i + 1) % len
            } else {
                (i + len - 1) % len
            }
        };

        let mut target = self.current;
        let mut found = false;
        for _ in 0..len {
            target = step(target);
            if self.panes[target].pane.is_enabled() {
                found = true;
                break;
            }
            if self.timings.force_all_panes {
                debug!(pane = target, "forcing disabled pane into rotation");
                found = true;
                break;
            }
            debug!(pane = target, "skipping disabled pane");
        }

        if !found || target == self.current {
            info!("not panning, nowhere else to go");
            return;
        }

        info!(from = self.current, to = target, "panning");

        self.pan_tween = Some(Tween::new(
            0.0,
            if delta > 0 {
                f64::from(frame::WIDTH)
            } else {
                -f64::from(frame::WIDTH)
            },
            Instant::now(),
            self.timings.pan_duration,
            None,
        ));
        self.target = target;
    }

    /// Composites one output frame, retiring any tween that finished during
    /// this call.
    pub fn render(&mut self) -> Result<RenderedFrame> {
        let mut out = frame::blank();

        if let Some(t) = &self.fade_tween {
            let (_, done) = t.update();
            if done {
                self.fade_tween = None;
            }
        }

        if !self.awake && self.fade_tween.is_none() {
            debug!("asleep, emitting blank frame");
            return Ok(RenderedFrame {
                frame: out,
                asleep: true,
            });
        }

        if self.panes.is_empty() {
            return Ok(RenderedFrame {
                frame: out,
                asleep: false,
            });
        }

        let mut offset = 0i32;
        if let Some(t) = &self.pan_tween {
            let (value, done) = t.update();
            offset = value.floor() as i32;
            if done {
                // The pan tween retires atomically with the index update.
                self.pan_tween = None;
                self.current = self.target;
                offset = 0;
            }
        }

        let current_frame = self.panes[self.current].pane.render()?;
        frame::draw_shifted(&mut out, &current_frame, offset);

        if offset != 0 {
            // Incoming pane slides in from the complementary side.
            let target_frame = self.panes[self.target].pane.render()?;
            let target_offset = if offset < 0 {
                frame::WIDTH as i32 + offset
            } else {
                offset - frame::WIDTH as i32
            };
            frame::draw_shifted(&mut out, &target_frame, target_offset);
        }

        if let Some(t) = &self.fade_tween {
            let (fade, _) = t.update();
            frame::scale_rgb(&mut out, fade);
        }

        Ok(RenderedFrame {
            frame: out,
            asleep: false,
        })
    }

    /// Index of the currently displayed pane.
    pub fn current_pane(&self) -> usize {
        self.current
    }

    /// Index of the pane an in-flight pan is heading to (equal to
    /// [`Self::current_pane`] when stable).
    pub fn target_pane(&self) -> usize {
        self.target
    }
}
