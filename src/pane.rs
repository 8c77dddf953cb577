//! The pane capability: one visual page the display can show. The compositor
//! never depends on a concrete pane; clock/weather/media panes in the wider
//! system all come in through this trait, as do remote-forwarded panes.

use anyhow::Result;
use image::Rgba;

use crate::animation::AnimatedImage;
use crate::frame::{self, Frame};
use crate::gesture::GestureEvent;

pub trait Pane: Send {
    /// Whether pan navigation may land on this pane right now.
    fn is_enabled(&self) -> bool;

    /// Panes return true to suppress the idle sleep fade while active
    /// (e.g. while media is playing).
    fn keep_awake(&self) -> bool {
        false
    }

    /// Produces this pane's current 16x16 frame. An error here aborts the
    /// compositor's render call.
    fn render(&mut self) -> Result<Frame>;

    /// A gesture forwarded while this pane is active and stable.
    fn gesture(&mut self, gesture: &GestureEvent);
}

/// Fills the display with a single color. Used as a smoke-test pane and as a
/// building block for status displays.
pub struct ColorPane {
    color: Rgba<u8>,
}

impl ColorPane {
    pub fn new(rgb: [u8; 3]) -> Self {
        Self {
            color: Rgba([rgb[0], rgb[1], rgb[2], 255]),
        }
    }
}

impl Pane for ColorPane {
    fn is_enabled(&self) -> bool {
        true
    }

    fn render(&mut self) -> Result<Frame> {
        Ok(Frame::from_pixel(frame::WIDTH, frame::HEIGHT, self.color))
    }

    fn gesture(&mut self, _gesture: &GestureEvent) {}
}

/// Plays a loaded image or animation.
pub struct ImagePane {
    image: AnimatedImage,
}

impl ImagePane {
    pub fn new(image: AnimatedImage) -> Self {
        Self { image }
    }
}

impl Pane for ImagePane {
    fn is_enabled(&self) -> bool {
        true
    }

    fn render(&mut self) -> Result<Frame> {
        Ok(self.image.next_frame())
    }

    fn gesture(&mut self, _gesture: &GestureEvent) {}
}
