//! Remote side of pane forwarding: hosts a local [`Pane`] and serves its
//! frames and gesture handling to a connected LED hub.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Incoming, Outgoing, WireFrame, decode, encode, framed};
use crate::pane::Pane;

/// The pane being served, shared between connections.
pub type SharedPane = Arc<Mutex<Box<dyn Pane>>>;

fn lock(pane: &SharedPane) -> MutexGuard<'_, Box<dyn Pane>> {
    pane.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Accepts hub connections and serves `pane` to each until cancelled.
pub async fn serve(listener: TcpListener, pane: SharedPane, cancel: CancellationToken) -> Result<()> {
    info!(addr = ?listener.local_addr().ok(), "serving remote pane");
    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };
        info!(%peer, "led hub connected");
        let pane = Arc::clone(&pane);
        let cancel = cancel.child_token();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, pane, cancel).await {
                warn!(%peer, "remote pane connection ended: {e:#}");
            } else {
                info!(%peer, "led hub disconnected");
            }
        });
    }
}

/// Decodes one message at a time: gestures are dispatched to the pane, frame
/// requests are answered with a render plus the pane's current keep-awake
/// state. EOF or a decode error closes the connection.
pub async fn handle_connection(
    stream: TcpStream,
    pane: SharedPane,
    cancel: CancellationToken,
) -> Result<()> {
    let mut framed = framed(stream);
    loop {
        let buf = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = framed.next() => match next {
                Some(Ok(buf)) => buf,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
        };

        let msg: Outgoing = match decode(&buf) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("undecodable message from led hub, closing: {e}");
                return Err(e.into());
            }
        };

        if let Some(gesture) = msg.gesture {
            lock(&pane).gesture(&gesture);
        }

        if msg.frame_requested {
            let render_pane = Arc::clone(&pane);
            let reply = task::spawn_blocking(move || {
                let mut pane = lock(&render_pane);
                let keep_awake = pane.keep_awake();
                match pane.render() {
                    Ok(frame) => Incoming {
                        image: Some(WireFrame::from_frame(&frame)),
                        err: None,
                        keep_awake,
                        locked: false,
                    },
                    Err(e) => {
                        debug!("served pane returned an error: {e:#}");
                        Incoming {
                            image: None,
                            err: Some(format!("{e:#}")),
                            keep_awake,
                            locked: false,
                        }
                    }
                }
            })
            .await?;
            framed.send(encode(&reply)?).await?;
        }
    }
}
