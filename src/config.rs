use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::animation::AnimatedImage;
use crate::layout::LayoutTimings;
use crate::matrix::MatrixConfig;
use crate::pane::{ColorPane, ImagePane, Pane};
use crate::remote::RemoteConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Configuration {
    #[serde(default)]
    pub matrix: MatrixConfig,

    #[serde(default = "Configuration::default_pan_duration", with = "humantime_serde")]
    pub pan_duration: Duration,
    #[serde(
        default = "Configuration::default_wake_transition",
        with = "humantime_serde"
    )]
    pub wake_transition: Duration,
    #[serde(
        default = "Configuration::default_sleep_transition",
        with = "humantime_serde"
    )]
    pub sleep_transition: Duration,
    #[serde(default = "Configuration::default_sleep_timeout", with = "humantime_serde")]
    pub sleep_timeout: Duration,

    /// Pan onto disabled panes too (debug aid).
    #[serde(default)]
    pub force_all_panes: bool,

    /// Generate periodic flick gestures when no sensor is attached.
    #[serde(default)]
    pub fake_gestures: bool,

    /// Upper bound on one render-write-ack round trip; exceeding it means
    /// the hardware link is wedged and the process exits.
    #[serde(default = "Configuration::default_write_timeout", with = "humantime_serde")]
    pub write_timeout: Duration,

    #[serde(default)]
    pub remote: RemoteConfig,

    /// The local panes to put in rotation, in pan order.
    #[serde(default)]
    pub panes: Vec<PaneConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PaneConfig {
    /// A solid color fill.
    Color { color: [u8; 3] },
    /// A still image or animation loaded from disk.
    Image { path: PathBuf },
}

impl Configuration {
    const fn default_pan_duration() -> Duration {
        Duration::from_millis(400)
    }

    const fn default_wake_transition() -> Duration {
        Duration::from_millis(600)
    }

    const fn default_sleep_transition() -> Duration {
        Duration::from_secs(1)
    }

    const fn default_sleep_timeout() -> Duration {
        Duration::from_secs(30)
    }

    const fn default_write_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        serde_yaml::from_reader(file).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.matrix.baud_rate >= 2, "matrix baud-rate must be at least 2");
        ensure!(
            !self.remote.frame_timeout.is_zero(),
            "remote frame-timeout must be non-zero"
        );
        ensure!(
            !self.write_timeout.is_zero(),
            "write-timeout must be non-zero"
        );
        for pane in &self.panes {
            if let PaneConfig::Image { path } = pane {
                ensure!(path.exists(), "pane image not found: {}", path.display());
            }
        }
        Ok(())
    }

    pub fn layout_timings(&self) -> LayoutTimings {
        LayoutTimings {
            pan_duration: self.pan_duration,
            wake_transition: self.wake_transition,
            sleep_transition: self.sleep_transition,
            sleep_timeout: self.sleep_timeout,
            force_all_panes: self.force_all_panes,
        }
    }

    /// Instantiates the configured local panes.
    pub fn build_panes(&self) -> Result<Vec<Box<dyn Pane>>> {
        self.panes
            .iter()
            .map(|pane| -> Result<Box<dyn Pane>> {
                match pane {
                    PaneConfig::Color { color } => Ok(Box::new(ColorPane::new(*color))),
                    PaneConfig::Image { path } => {
                        Ok(Box::new(ImagePane::new(AnimatedImage::load(path)?)))
                    }
                }
            })
            .collect()
    }
}
