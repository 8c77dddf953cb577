//! The render-producer loop: pulls composited frames from the layout and
//! pushes them down the matrix serial link, parking while the display is
//! asleep.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::layout::{self, PaneLayout};
use crate::matrix::{self, MatrixLink};

pub async fn run(
    layout: Arc<Mutex<PaneLayout>>,
    mut link: Box<dyn MatrixLink>,
    mut wake_rx: mpsc::Receiver<()>,
    write_timeout: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let layout_ref = Arc::clone(&layout);
        let worker = task::spawn_blocking(move || -> Result<(Box<dyn MatrixLink>, bool)> {
            let rendered = layout::lock(&layout_ref).render()?;
            matrix::write_frame(&rendered.frame, link.as_mut())?;
            Ok((link, rendered.asleep))
        });

        // A wedged hardware link is unrecoverable; bound the whole
        // render-write-ack round trip.
        let (returned, asleep) = match timeout(write_timeout, worker).await {
            Ok(joined) => joined.context("render worker panicked")??,
            Err(_) => bail!(
                "timed out writing to LED matrix after {}",
                humantime::format_duration(write_timeout)
            ),
        };
        link = returned;

        if asleep {
            debug!("display asleep, waiting for a wake gesture");
            tokio::select! {
                _ = cancel.cancelled() => break,
                woke = wake_rx.recv() => {
                    if woke.is_none() {
                        break;
                    }
                    info!("display woke up");
                }
            }
        }
    }
    Ok(())
}
