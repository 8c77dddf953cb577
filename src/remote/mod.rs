//! Remote pane forwarding: lets a [`Pane`](crate::pane::Pane)
//! implementation live in another process, with the host pulling frames and
//! pushing gestures over a persistent TCP connection.
//!
//! Messages are postcard-encoded inside length-delimited frames. One
//! `Outgoing` either requests a frame or carries a gesture, never both; each
//! frame request is answered by exactly one `Incoming`.

pub mod host;
pub mod server;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::error::Error;
use crate::frame::{self, Frame};
use crate::gesture::GestureEvent;

/// Host to remote pane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outgoing {
    pub frame_requested: bool,
    pub gesture: Option<GestureEvent>,
}

/// Remote pane to host, sent in reply to a frame request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Incoming {
    pub image: Option<WireFrame>,
    pub err: Option<String>,
    pub keep_awake: bool,
    pub locked: bool,
}

/// A frame flattened for the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl WireFrame {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            pixels: frame.as_raw().clone(),
        }
    }

    /// None unless this is exactly one 16x16 frame with a matching pixel
    /// buffer. The compositor's pixel ops assume display-sized frames, so a
    /// peer claiming any other geometry is rejected here, at the trust
    /// boundary.
    pub fn into_frame(self) -> Option<Frame> {
        if (self.width, self.height) != (frame::WIDTH, frame::HEIGHT) {
            return None;
        }
        Frame::from_raw(self.width, self.height, self.pixels)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteConfig {
    /// How long the host waits for a frame before disconnecting the pane.
    #[serde(default = "RemoteConfig::default_frame_timeout", with = "humantime_serde")]
    pub frame_timeout: Duration,
    /// Pause between redial attempts after a disconnect.
    #[serde(
        default = "RemoteConfig::default_reconnect_backoff",
        with = "humantime_serde"
    )]
    pub reconnect_backoff: Duration,
    /// Addresses of remote panes the host dials, e.g. `"127.0.0.1:3115"`.
    #[serde(default)]
    pub panes: Vec<String>,
}

impl RemoteConfig {
    const fn default_frame_timeout() -> Duration {
        Duration::from_secs(1)
    }

    const fn default_reconnect_backoff() -> Duration {
        Duration::from_millis(500)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            frame_timeout: Self::default_frame_timeout(),
            reconnect_backoff: Self::default_reconnect_backoff(),
            panes: Vec::new(),
        }
    }
}

pub(crate) fn framed(stream: TcpStream) -> Framed<TcpStream, LengthDelimitedCodec> {
    Framed::new(stream, LengthDelimitedCodec::new())
}

pub fn encode<T: Serialize>(msg: &T) -> Result<Bytes, Error> {
    Ok(Bytes::from(postcard::to_stdvec(msg)?))
}

pub fn decode<T: serde::de::DeserializeOwned>(buf: &[u8]) -> Result<T, Error> {
    Ok(postcard::from_bytes(buf)?)
}
