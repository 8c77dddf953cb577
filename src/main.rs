//! Binary entrypoint for the LED matrix hub.
//!
//! Wires the configured panes into the compositor, opens the matrix link
//! (or its mock fallback), and runs the render/gesture/sleep loops until
//! ctrl-c or a fatal hardware error.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use led_matrix_hub::config::Configuration;
use led_matrix_hub::layout::PaneLayout;
use led_matrix_hub::tasks::{gestures, renderer, sleeper};
use led_matrix_hub::{frame, matrix, remote};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "led-matrix-hub", about = "16x16 LED matrix compositor")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("led_matrix_hub={level}").parse().expect("static directive"));
    fmt().with_env_filter(filter).with_target(true).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    cfg.validate().context("validating configuration")?;
    info!(
        panes = cfg.panes.len(),
        remote_panes = cfg.remote.panes.len(),
        sleep_timeout = %humantime::format_duration(cfg.sleep_timeout),
        "configuration loaded"
    );

    // Opening the port retries at two baud rates with pauses; keep that off
    // the runtime threads. A blank frame proves the link before any pane
    // renders.
    let matrix_cfg = cfg.matrix.clone();
    let link = tokio::task::spawn_blocking(move || {
        let mut link = matrix::connect(&matrix_cfg);
        matrix::write_frame(&frame::blank(), link.as_mut())?;
        Ok::<_, led_matrix_hub::error::Error>(link)
    })
    .await
    .context("matrix connect worker panicked")?
    .context("bringing up the LED matrix link")?;

    let (mut layout, mut wake_rx) = PaneLayout::new(cfg.layout_timings());
    for pane in cfg.build_panes()? {
        layout.add_pane(pane);
    }
    // Start visible; drain the wake token the initial wake() queued.
    layout.wake();
    let _ = wake_rx.try_recv();

    let layout = Arc::new(Mutex::new(layout));
    let cancel = CancellationToken::new();
    let (gesture_tx, gesture_rx) = mpsc::channel(32);

    let mut tasks = JoinSet::new();
    tasks.spawn(renderer::run(
        Arc::clone(&layout),
        link,
        wake_rx,
        cfg.write_timeout,
        cancel.clone(),
    ));
    tasks.spawn(gestures::run(
        Arc::clone(&layout),
        gesture_rx,
        cancel.clone(),
    ));
    tasks.spawn(sleeper::run(Arc::clone(&layout), cancel.clone()));
    for addr in &cfg.remote.panes {
        tasks.spawn(remote::host::maintain(
            addr.clone(),
            Arc::clone(&layout),
            cfg.remote.clone(),
            cancel.clone(),
        ));
    }
    if cfg.fake_gestures {
        tasks.spawn(gestures::run_fake_source(gesture_tx.clone(), cancel.clone()));
    }

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
            Ok(())
        }
        Some(joined) = tasks.join_next() => {
            joined.context("task panicked").and_then(|res| res)
        }
    };
    cancel.cancel();

    while let Some(joined) = tasks.join_next().await {
        joined.context("task panicked")??;
    }

    result
}
