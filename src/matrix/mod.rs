//! Wire encoding and the write/ack handshake for the LED matrix serial link.
//!
//! The device wants 768 bytes of gamma-corrected RGB per frame, with the two
//! physical half-panels interleaved row by row and each row's bytes reversed
//! to match the strip wiring, bracketed by write/swap commands and answered
//! with a one-byte ack.

mod mock;

pub use mock::MockMatrix;

use std::io::{Read, Write};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::frame::Frame;

pub const CMD_WRITE_BUFFER: u8 = 0x01;
pub const CMD_SWAP_BUFFERS: u8 = 0x02;
/// The ack the firmware sends after swapping buffers.
pub const FRAME_ACK: u8 = b'F';
/// 16x16 pixels, 3 bytes each.
pub const PAYLOAD_LEN: usize = 768;

const ROW_BYTES: usize = 16 * 3;

/// How long to wait for the firmware's init banner after opening the port.
const INIT_BANNER_TIMEOUT: Duration = Duration::from_secs(3);

/// Anything the encoder can drive: the real serial port or the mock.
pub trait MatrixLink: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> MatrixLink for T {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatrixConfig {
    #[serde(default = "MatrixConfig::default_device")]
    pub device: String,
    /// Tried first; on failure the opener retries at half this rate.
    #[serde(default = "MatrixConfig::default_baud_rate")]
    pub baud_rate: u32,
}

impl MatrixConfig {
    fn default_device() -> String {
        "/dev/tty.ledmatrix".into()
    }

    const fn default_baud_rate() -> u32 {
        230_400
    }
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            device: Self::default_device(),
            baud_rate: Self::default_baud_rate(),
        }
    }
}

/// Perceptual brightness curve for cheap LEDs: `adjust[v] = 2^(v/R) - 1`
/// with `R = 255 * log10(2) / log10(255)`, precomputed once.
static LED_ADJUST: LazyLock<[u8; 256]> = LazyLock::new(|| {
    let r = 255.0 * 2f64.log10() / 255f64.log10();
    let mut table = [0u8; 256];
    for (value, adjusted) in table.iter_mut().enumerate() {
        *adjusted = (2f64.powf(value as f64 / r) - 1.0).floor() as u8;
    }
    table
});

/// Converts a composited frame into the device's 768-byte wire payload:
/// gamma per channel, alpha dropped, rows emitted in the order
/// `8,0,9,1,...,15,7`, each emitted row byte-reversed end to end.
pub fn encode(frame: &Frame) -> [u8; PAYLOAD_LEN] {
    let mut rgb = [0u8; PAYLOAD_LEN];
    for (i, px) in frame.pixels().enumerate() {
        rgb[i * 3] = LED_ADJUST[px[0] as usize];
        rgb[i * 3 + 1] = LED_ADJUST[px[1] as usize];
        rgb[i * 3 + 2] = LED_ADJUST[px[2] as usize];
    }
    reorder(&rgb)
}

/// The row-interleave plus per-row byte-reversal, separated from the gamma
/// step so the transform stays a pure bijection on 768-byte buffers.
pub fn reorder(payload: &[u8; PAYLOAD_LEN]) -> [u8; PAYLOAD_LEN] {
    let mut out = [0u8; PAYLOAD_LEN];
    let mut cursor = 0;
    for pair in 0..8 {
        for src_row in [pair + 8, pair] {
            let row = &payload[src_row * ROW_BYTES..(src_row + 1) * ROW_BYTES];
            for (dst, &src) in out[cursor..cursor + ROW_BYTES].iter_mut().zip(row.iter().rev()) {
                *dst = src;
            }
            cursor += ROW_BYTES;
        }
    }
    out
}

/// Writes one frame and completes the swap handshake. Any short write, IO
/// error, or wrong ack byte is a protocol desync; the caller decides that
/// this is fatal.
pub fn write_frame(frame: &Frame, link: &mut dyn MatrixLink) -> Result<(), Error> {
    let payload = encode(frame);

    link.write_all(&[CMD_WRITE_BUFFER])
        .map_err(|e| Error::ProtocolDesync(format!("writing buffer command: {e}")))?;
    link.write_all(&payload)
        .map_err(|e| Error::ProtocolDesync(format!("writing frame payload: {e}")))?;
    link.write_all(&[CMD_SWAP_BUFFERS])
        .map_err(|e| Error::ProtocolDesync(format!("writing swap command: {e}")))?;

    let mut ack = [0u8; 1];
    link.read_exact(&mut ack)
        .map_err(|e| Error::ProtocolDesync(format!("reading swap ack: {e}")))?;
    if ack[0] != FRAME_ACK {
        return Err(Error::ProtocolDesync(format!(
            "expected ack {:?}, got 0x{:02x}",
            FRAME_ACK as char, ack[0]
        )));
    }
    Ok(())
}

/// Opens the serial link, trying the configured baud rate and then half of
/// it across a few increasingly spaced attempts. When the hardware never
/// answers, falls back to the mock device so the rest of the system (and
/// headless test rigs) keeps running.
pub fn connect(cfg: &MatrixConfig) -> Box<dyn MatrixLink> {
    for pause in [1u64, 2, 4] {
        for baud in [cfg.baud_rate, cfg.baud_rate / 2] {
            match open_at(&cfg.device, baud) {
                Ok(link) => return link,
                Err(e) => {
                    warn!(device = %cfg.device, baud, "LED matrix connection failed: {e:#}");
                }
            }
            thread::sleep(Duration::from_secs(pause));
        }
    }
    error!("failed to connect to LED matrix, falling back to a mock connection");
    Box::new(MockMatrix::new())
}

fn open_at(device: &str, baud: u32) -> anyhow::Result<Box<dyn MatrixLink>> {
    info!(device, baud, "connecting to LED matrix");
    let mut port = serialport::new(device, baud)
        .timeout(Duration::from_millis(200))
        .open()
        .with_context(|| format!("opening {device}"))?;

    // The firmware prints a banner line containing "LED" after reset; not
    // seeing it means we are at the wrong rate or talking to the wrong
    // device.
    let banner = read_banner(port.as_mut())?;
    if !banner.contains("LED") {
        bail!("bad init string {banner:?}");
    }
    info!(banner = banner.trim(), "LED matrix ready");
    Ok(Box::new(port))
}

fn read_banner(port: &mut dyn serialport::SerialPort) -> anyhow::Result<String> {
    let deadline = Instant::now() + INIT_BANNER_TIMEOUT;
    let mut banner = Vec::new();
    let mut byte = [0u8; 1];
    while Instant::now() < deadline {
        match port.read(&mut byte) {
            Ok(1) => {
                if byte[0] == b'\n' {
                    return Ok(String::from_utf8_lossy(&banner).into_owned());
                }
                banner.push(byte[0]);
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => return Err(e.into()),
        }
    }
    bail!("timeout waiting for LED matrix init string")
}

/// The gamma lookup table, exposed for tests and diagnostics.
pub fn gamma_table() -> &'static [u8; 256] {
    &LED_ADJUST
}
