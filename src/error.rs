use thiserror::Error;

/// Library error type for the LED hub core.
#[derive(Debug, Error)]
pub enum Error {
    /// The serial link and the firmware disagree about protocol state.
    /// Continuing would corrupt every subsequent frame, so callers treat
    /// this as fatal.
    #[error("matrix protocol desync: {0}")]
    ProtocolDesync(String),

    /// The remote end of a forwarded pane has gone away.
    #[error("remote pane disconnected")]
    RemoteDisconnected,

    /// The remote pane did not answer a frame request in time.
    #[error("remote pane timed out waiting for a frame")]
    RemoteTimeout,

    /// Wire encoding/decoding of a remote pane message failed.
    #[error("remote message codec error: {0}")]
    Wire(#[from] postcard::Error),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}
