//! The gesture-consumer loop, plus a fake gesture source for running
//! without the sensor attached.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::gesture::GestureEvent;
use crate::layout::{self, PaneLayout};

pub async fn run(
    layout: Arc<Mutex<PaneLayout>>,
    mut gestures: mpsc::Receiver<GestureEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            gesture = gestures.recv() => {
                let Some(gesture) = gesture else { break };
                trace!(?gesture, "gesture received");
                layout::lock(&layout).on_gesture(&gesture);
            }
        }
    }
    Ok(())
}

/// Emits a directional flick every few seconds so the pane rotation can be
/// exercised with no gesture sensor present.
pub async fn run_fake_source(
    gestures: mpsc::Sender<GestureEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    info!("fake gesture source enabled");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                let gesture = if rand::random_bool(0.5) {
                    GestureEvent::FlickEastToWest
                } else {
                    GestureEvent::FlickWestToEast
                };
                if gestures.send(gesture).await.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
