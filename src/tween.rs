//! Time-driven scalar interpolation. Every animated transition in the
//! compositor (pane pans, wake and sleep fades) is one of these.

use std::time::{Duration, Instant};

/// Interpolates from `from` to `to` over `duration`, starting at `start`,
/// optionally shaped by an easing function over `[0, 1]`.
///
/// A tween is stateless beyond its fields: [`Tween::update`] is a pure
/// function of wall-clock time. Once it reports done it keeps returning
/// `(to, true)` forever; callers retire it after observing that.
#[derive(Debug, Clone, Copy)]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    pub start: Instant,
    pub duration: Duration,
    pub ease: Option<fn(f64) -> f64>,
}

impl Tween {
    pub fn new(
        from: f64,
        to: f64,
        start: Instant,
        duration: Duration,
        ease: Option<fn(f64) -> f64>,
    ) -> Self {
        Self {
            from,
            to,
            start,
            duration,
            ease,
        }
    }

    /// Current value and whether the tween has finished, as of now.
    pub fn update(&self) -> (f64, bool) {
        self.update_at(Instant::now())
    }

    /// Same as [`Tween::update`] with an explicit clock, for tests.
    pub fn update_at(&self, now: Instant) -> (f64, bool) {
        let elapsed = now.saturating_duration_since(self.start);
        if elapsed >= self.duration {
            return (self.to, true);
        }
        let mut t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        if let Some(ease) = self.ease {
            t = ease(t);
        }
        let value = (self.to - self.from) * t + self.from;
        // Covers near-zero durations where the lerp already landed on the
        // target before the elapsed check says so.
        (value, value == self.to)
    }
}

/// Decelerating quintic, used for wake fades.
pub fn ease_out_quint(t: f64) -> f64 {
    let u = t - 1.0;
    u * u * u * u * u + 1.0
}
