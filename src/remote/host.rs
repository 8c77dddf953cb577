//! Host side of remote pane forwarding: a [`Pane`] adapter backed by a TCP
//! connection, and the connection manager that keeps redialling a remote
//! pane for as long as the process lives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use crossbeam_channel::RecvTimeoutError;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Incoming, Outgoing, RemoteConfig, WireFrame, decode, encode, framed};
use crate::error::Error;
use crate::frame::Frame;
use crate::gesture::GestureEvent;
use crate::layout::{self, PaneLayout};
use crate::pane::Pane;

/// Sent once per second while connected so a silently dead peer is noticed
/// between frame requests.
const PING_INTERVAL: Duration = Duration::from_secs(1);

struct Shared {
    enabled: AtomicBool,
    keep_awake: AtomicBool,
    disconnect_tx: mpsc::Sender<()>,
}

impl Shared {
    fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Marks the pane disabled and signals disconnect. Multiple error paths
    /// race to call this; only the first takes effect.
    fn close(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            let _ = self.disconnect_tx.try_send(());
        }
    }
}

/// A [`Pane`] whose rendering happens in another process.
pub struct RemotePane {
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    frames: crossbeam_channel::Receiver<Incoming>,
    frame_timeout: Duration,
}

/// Owner handle for a spawned [`RemotePane`]; the connection manager uses it
/// to await the (idempotent, single-shot) disconnect signal.
pub struct RemoteHandle {
    shared: Arc<Shared>,
    disconnected: mpsc::Receiver<()>,
}

impl RemoteHandle {
    /// Resolves once the connection is gone, however it died.
    pub async fn disconnected(&mut self) {
        if self.shared.enabled() {
            let _ = self.disconnected.recv().await;
        }
    }

    /// Tears the connection down. Safe to call more than once.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl RemotePane {
    /// Starts the protocol loops for an established connection and returns
    /// the pane adapter plus its owner handle.
    pub fn spawn(stream: TcpStream, frame_timeout: Duration) -> (Self, RemoteHandle) {
        let (disconnect_tx, disconnected) = mpsc::channel(1);
        let shared = Arc::new(Shared {
            enabled: AtomicBool::new(true),
            keep_awake: AtomicBool::new(false),
            disconnect_tx,
        });
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = crossbeam_channel::bounded(1);

        tokio::spawn(run_connection(
            stream,
            outgoing_rx,
            frames_tx,
            Arc::clone(&shared),
        ));
        tokio::spawn(ping(outgoing_tx.clone(), Arc::clone(&shared)));

        (
            Self {
                shared: Arc::clone(&shared),
                outgoing: outgoing_tx,
                frames: frames_rx,
                frame_timeout,
            },
            RemoteHandle {
                shared,
                disconnected,
            },
        )
    }

    fn send(&self, msg: Outgoing) -> Result<(), Error> {
        self.outgoing.send(msg).map_err(|_| {
            self.shared.close();
            Error::RemoteDisconnected
        })
    }
}

impl Pane for RemotePane {
    fn is_enabled(&self) -> bool {
        self.shared.enabled()
    }

    fn keep_awake(&self) -> bool {
        self.shared.keep_awake.load(Ordering::SeqCst)
    }

    fn render(&mut self) -> Result<Frame> {
        if !self.shared.enabled() {
            return Err(Error::RemoteDisconnected.into());
        }

        // A reply to a request that timed out may still be sitting in the
        // slot; it belongs to a stale request.
        while self.frames.try_recv().is_ok() {}

        self.send(Outgoing {
            frame_requested: true,
            gesture: None,
        })?;

        match self.frames.recv_timeout(self.frame_timeout) {
            Ok(msg) => {
                if let Some(err) = msg.err {
                    bail!("remote pane error: {err}");
                }
                match msg.image.and_then(WireFrame::into_frame) {
                    Some(frame) => Ok(frame),
                    // A missing or wrong-size image is a broken peer, not a
                    // broken compositor.
                    None => {
                        warn!("remote pane sent a missing or malformed frame");
                        self.shared.close();
                        Err(Error::RemoteDisconnected.into())
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.shared.close();
                Err(Error::RemoteDisconnected.into())
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("remote pane timed out");
                self.shared.close();
                Err(Error::RemoteTimeout.into())
            }
        }
    }

    fn gesture(&mut self, gesture: &GestureEvent) {
        if !self.shared.enabled() || !gesture.is_interesting() {
            return;
        }
        let _ = self.send(Outgoing {
            frame_requested: false,
            gesture: Some(*gesture),
        });
    }
}

async fn run_connection(
    stream: TcpStream,
    mut outgoing_rx: mpsc::UnboundedReceiver<Outgoing>,
    frames_tx: crossbeam_channel::Sender<Incoming>,
    shared: Arc<Shared>,
) {
    let mut framed = framed(stream);
    loop {
        tokio::select! {
            msg = outgoing_rx.recv() => {
                let Some(msg) = msg else {
                    shared.close();
                    break;
                };
                let bytes = match encode(&msg) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("failed to encode outgoing remote message: {e}");
                        shared.close();
                        break;
                    }
                };
                if let Err(e) = framed.send(bytes).await {
                    debug!("remote pane write failed: {e}");
                    shared.close();
                    break;
                }
            }
            incoming = framed.next() => {
                match incoming {
                    Some(Ok(buf)) => match decode::<Incoming>(&buf) {
                        Ok(msg) => {
                            shared.keep_awake.store(msg.keep_awake, Ordering::SeqCst);
                            if frames_tx.try_send(msg).is_err() {
                                debug!("dropping unconsumed remote frame");
                            }
                        }
                        Err(e) => {
                            warn!("failed to decode incoming remote message: {e}");
                            shared.close();
                            break;
                        }
                    },
                    Some(Err(e)) => {
                        debug!("remote pane read failed: {e}");
                        shared.close();
                        break;
                    }
                    None => {
                        info!("remote pane hung up");
                        shared.close();
                        break;
                    }
                }
            }
        }
        if !shared.enabled() {
            break;
        }
    }
}

async fn ping(outgoing: mpsc::UnboundedSender<Outgoing>, shared: Arc<Shared>) {
    while shared.enabled() {
        if outgoing.send(Outgoing::default()).is_err() {
            break;
        }
        tokio::time::sleep(PING_INTERVAL).await;
    }
}

/// Dials `addr`, keeps the remote pane in the layout while the connection
/// lives, and redials after the configured backoff, forever. The remote
/// process may come back at any time.
pub async fn maintain(
    addr: String,
    layout: Arc<Mutex<PaneLayout>>,
    cfg: RemoteConfig,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            res = TcpStream::connect(&addr) => res,
        };

        match stream {
            Ok(stream) => {
                info!(%addr, "remote pane connected");
                let (pane, mut handle) = RemotePane::spawn(stream, cfg.frame_timeout);
                let id = layout::lock(&layout).add_pane(Box::new(pane));

                tokio::select! {
                    _ = cancel.cancelled() => {
                        handle.close();
                        layout::lock(&layout).remove_pane(id);
                        return Ok(());
                    }
                    _ = handle.disconnected() => {}
                }

                layout::lock(&layout).remove_pane(id);
                info!(%addr, "remote pane disconnected");
            }
            Err(e) => debug!(%addr, "remote pane dial failed: {e}"),
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(cfg.reconnect_backoff) => {}
        }
    }
}
