//! Still images and multi-frame animations with per-frame delays.
//!
//! Playback pacing lives on a dedicated scheduler thread per animation. The
//! scheduler is the only writer of the playback position; render threads only
//! read it. Frames whose delay is long are paced by sleeping; frames whose
//! delay is below [`ADJUST_DELAY_UNDER`] are instead held for a counted
//! number of render calls, so short delays survive render-loop jitter while
//! long delays stay synchronized across animations.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use crossbeam_channel::{Receiver, Sender, bounded};
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;

use crate::frame::{self, Frame};

/// Approximate frame rate of the render loop.
const FPS: u64 = 30;

/// How long one render call holds the display.
const FRAME_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / FPS);

/// Delays at or above this are slept; shorter ones are counted in render
/// calls instead.
const ADJUST_DELAY_UNDER: Duration = Duration::from_millis(300);

/// Loop forever.
pub const LOOP_FOREVER: i32 = -1;

/// A decoded image: either a single still frame or an animation with
/// per-frame delays and a loop count.
pub struct AnimatedImage {
    shared: Arc<Shared>,
    /// Rendezvous channel: each render call offers one tick; the scheduler
    /// consumes ticks only while it is counting render calls for a short
    /// delay. Offers nobody is waiting for are dropped.
    frame_request: Sender<()>,
    scheduler: Mutex<Option<Scheduler>>,
    started: AtomicBool,
    stop: Arc<AtomicBool>,
}

struct Shared {
    frames: Vec<Frame>,
    delays: Vec<Duration>,
    pos: AtomicUsize,
}

struct Scheduler {
    cursor: PlaybackCursor,
    requests: Receiver<()>,
}

/// Pure playback position state: where we are, and how the last frame is
/// handled when we get there.
#[derive(Debug, Clone)]
pub(crate) struct PlaybackCursor {
    pub(crate) pos: usize,
    len: usize,
    remaining_loops: i32,
}

impl PlaybackCursor {
    fn new(len: usize, remaining_loops: i32) -> Self {
        Self {
            pos: 0,
            len,
            remaining_loops,
        }
    }

    /// Moves past the current frame. Returns false when the final frame is
    /// to be held forever (loop count exhausted).
    pub(crate) fn advance(&mut self) -> bool {
        if self.pos + 1 < self.len {
            self.pos += 1;
            return true;
        }
        match self.remaining_loops {
            LOOP_FOREVER => {
                self.pos = 0;
                true
            }
            n if n > 0 => {
                self.remaining_loops = n - 1;
                self.pos = 0;
                true
            }
            _ => false,
        }
    }
}

impl AnimatedImage {
    /// Builds an animation from decoded frames. `remaining_loops` follows the
    /// GIF convention: [`LOOP_FOREVER`] loops forever, `0` holds the last
    /// frame once reached, positive counts are extra passes.
    pub fn new(frames: Vec<Frame>, delays: Vec<Duration>, remaining_loops: i32) -> Result<Self> {
        ensure!(!frames.is_empty(), "animation needs at least one frame");
        ensure!(
            frames.len() == delays.len(),
            "frame/delay count mismatch: {} frames, {} delays",
            frames.len(),
            delays.len()
        );
        for f in &frames {
            ensure!(
                f.dimensions() == (frame::WIDTH, frame::HEIGHT),
                "frame is {}x{}, display is {}x{}",
                f.width(),
                f.height(),
                frame::WIDTH,
                frame::HEIGHT
            );
        }
        let (frame_request, requests) = bounded(0);
        Ok(Self {
            scheduler: Mutex::new(Some(Scheduler {
                cursor: PlaybackCursor::new(frames.len(), remaining_loops),
                requests,
            })),
            shared: Arc::new(Shared {
                frames,
                delays,
                pos: AtomicUsize::new(0),
            }),
            frame_request,
            started: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The degenerate single-frame case; both accessors always return the
    /// frame and no scheduler ever runs.
    pub fn still(frame: Frame) -> Self {
        Self::new(vec![frame], vec![Duration::ZERO], 0)
            .unwrap_or_else(|_| unreachable!("single frame is always valid"))
    }

    /// Loads a PNG/JPEG as a still, or a GIF as an animation with the GIF's
    /// own per-frame delays. Animated GIFs loop forever.
    pub fn load(path: &Path) -> Result<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("gif") => Self::load_gif(path),
            Some("png" | "jpg" | "jpeg") => Self::load_still(path),
            _ => bail!("unknown image format: {}", path.display()),
        }
    }

    fn load_still(path: &Path) -> Result<Self> {
        let img = image::ImageReader::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("decoding {}", path.display()))?;
        Ok(Self::still(img.to_rgba8()))
    }

    fn load_gif(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let decoder = GifDecoder::new(BufReader::new(file))
            .with_context(|| format!("decoding {}", path.display()))?;
        let mut frames = Vec::new();
        let mut delays = Vec::new();
        for decoded in decoder
            .into_frames()
            .collect_frames()
            .with_context(|| format!("collecting frames of {}", path.display()))?
        {
            let (numer, denom) = decoded.delay().numer_denom_ms();
            delays.push(Duration::from_secs_f64(
                f64::from(numer) / f64::from(denom.max(1)) / 1000.0,
            ));
            frames.push(decoded.into_buffer());
        }
        Self::new(frames, delays, LOOP_FOREVER)
    }

    /// The frame at the current playback position. Starts the playback
    /// scheduler on first use and offers it one render tick.
    pub fn next_frame(&self) -> Frame {
        let pos = self
            .shared
            .pos
            .load(Ordering::Acquire)
            .min(self.shared.frames.len() - 1);
        let frame = self.shared.frames[pos].clone();

        if self.shared.frames.len() > 1 {
            self.start();
            let _ = self.frame_request.try_send(());
        }

        frame
    }

    /// Maps `position` in `[0, 1]` onto the frame index range. With `blend`,
    /// a position between two frames alpha-composites the later frame over
    /// the earlier one, weighted by the fractional index. Independent of
    /// playback state.
    pub fn position_frame(&self, position: f64, blend: bool) -> Frame {
        let frames = &self.shared.frames;
        if frames.len() == 1 {
            return frames[0].clone();
        }
        let span = (frames.len() - 1) as f64;
        let relative = (position * span).clamp(0.0, span);
        let earlier = relative.floor() as usize;
        let later = relative.ceil() as usize;
        let weight = relative.fract();
        if !blend || earlier == later {
            return frames[earlier].clone();
        }
        frame::blend_over(&frames[earlier], &frames[later], weight)
    }

    fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(mut scheduler) = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        let stop = Arc::clone(&self.stop);
        thread::spawn(move || {
            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let delay = shared.delays[scheduler.cursor.pos];
                if delay < ADJUST_DELAY_UNDER {
                    // Rounded to the nearest render call, at least one.
                    let ticks = ((delay.as_secs_f64() / FRAME_INTERVAL.as_secs_f64()) + 0.5)
                        .floor()
                        .max(1.0) as u64;
                    for _ in 0..ticks {
                        if scheduler.requests.recv().is_err() {
                            return;
                        }
                    }
                } else {
                    // At these durations nobody notices +-1 render call.
                    thread::sleep(delay);
                }
                if !scheduler.cursor.advance() {
                    // Loop count exhausted: the last frame shows forever.
                    break;
                }
                shared.pos.store(scheduler.cursor.pos, Ordering::Release);
            }
        });
    }

    /// Number of frames in the source.
    pub fn frame_count(&self) -> usize {
        self.shared.frames.len()
    }
}

impl Drop for AnimatedImage {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
