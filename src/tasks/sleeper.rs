//! The idle watchdog: nudges the layout towards sleep when no gesture has
//! arrived for the configured timeout.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::layout::{self, PaneLayout};

const TICK: Duration = Duration::from_millis(50);

pub async fn run(layout: Arc<Mutex<PaneLayout>>, cancel: CancellationToken) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(TICK) => {
                layout::lock(&layout).maybe_sleep();
            }
        }
    }
    Ok(())
}
