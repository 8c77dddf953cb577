use serde::{Deserialize, Serialize};

/// One discrete event from the gesture sensor.
///
/// The compositor only interprets the directional flicks (pane switching)
/// and the distinction between idle and everything else (waking, sleep
/// timeout reset); all other variants pass through to the active pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GestureEvent {
    /// Sensor frame with nothing of note in it.
    Idle,
    FlickEastToWest,
    FlickWestToEast,
    Tap,
    DoubleTap,
    /// Rotational "airwheel" motion; delta is the rotation amount since the
    /// previous event, signed by direction.
    AirWheel { delta: i32 },
}

impl GestureEvent {
    /// Whether this event is worth forwarding to a remote pane. Idle sensor
    /// frames arrive continuously and would swamp the connection.
    pub fn is_interesting(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// The pane-switch direction this gesture requests, if any.
    pub fn pan_delta(&self) -> Option<i32> {
        match self {
            Self::FlickEastToWest => Some(1),
            Self::FlickWestToEast => Some(-1),
            _ => None,
        }
    }
}
