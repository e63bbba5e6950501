// crates/vidfx-media/src/engine.rs
//
// FrameEngine: batch frame buffering, effect application, and clock-driven
// frame selection for effect playback.
//
// The engine runs entirely on the host loop. `next_frame()` is pull-based:
// the host asks "what should be on screen now", the engine maps the clock
// position to a frame index and reloads the buffer window synchronously
// when the index falls outside it. The reload is the dominant latency on
// seek and effect change; batching a whole second of frames amortizes the
// per-seek cost of re-positioning the decoder.

use std::path::Path;

use anyhow::Result;

use vidfx_core::clock::PlaybackClock;
use vidfx_core::effect::EffectKind;

use crate::decode::VideoSource;
use crate::effects::{self, EffectCache};
use crate::frame::Frame;

/// Decodable frame stream. Implemented by `VideoSource`; the seam exists so
/// window arithmetic can be exercised against a synthetic source.
pub trait FrameSource {
    fn fps(&self) -> f64;
    fn total_frames(&self) -> u64;
    /// Natural (unscaled) width and height.
    fn natural_size(&self) -> (u32, u32);
    /// Decode `count` frames starting at `start`, scaled to `out_w`×`out_h`
    /// packed RGB. May return fewer near EOF.
    fn read_batch(&mut self, start: u64, count: usize, out_w: u32, out_h: u32) -> Result<Vec<Frame>>;
}

/// Frames reloaded start this many frames before the requested index, to
/// mask reload latency at window boundaries. A smoothing heuristic, not a
/// gapless-playback guarantee.
const SEEK_BACK_PAD: u64 = 5;

// ── FrameBuffer ───────────────────────────────────────────────────────────────

/// Contiguous window of effect-applied frames `[start, start + len)`.
struct FrameBuffer {
    start:  u64,
    frames: Vec<Frame>,
}

impl FrameBuffer {
    fn empty() -> Self {
        Self { start: 0, frames: Vec::new() }
    }

    fn contains(&self, idx: u64) -> bool {
        idx >= self.start && idx < self.start + self.frames.len() as u64
    }

    fn get(&self, idx: u64) -> Option<&Frame> {
        if self.contains(idx) {
            self.frames.get((idx - self.start) as usize)
        } else {
            None
        }
    }
}

// ── FPS meter ─────────────────────────────────────────────────────────────────

/// Measured display rate: counts emitted frames over wall intervals of at
/// least one second, then reports count/interval and resets.
struct FpsMeter {
    count:        u32,
    window_start: std::time::Instant,
    measured:     f64,
}

impl FpsMeter {
    fn new() -> Self {
        Self { count: 0, window_start: std::time::Instant::now(), measured: 0.0 }
    }

    fn reset(&mut self) {
        self.count = 0;
        self.window_start = std::time::Instant::now();
        self.measured = 0.0;
    }

    fn tick(&mut self) {
        self.count += 1;
        let secs = self.window_start.elapsed().as_secs_f64();
        if secs >= 1.0 {
            self.measured = self.count as f64 / secs;
            self.count = 0;
            self.window_start = std::time::Instant::now();
        }
    }
}

// ── FrameEngine ───────────────────────────────────────────────────────────────

pub struct FrameEngine<S: FrameSource> {
    source:      S,
    buffer:      FrameBuffer,
    clock:       PlaybackClock,
    effect:      EffectKind,
    cache:       EffectCache,
    /// Aspect-preserving output size within the display area.
    out_w:       u32,
    out_h:       u32,
    batch_size:  usize,
    current_idx: u64,
    fps_meter:   FpsMeter,
}

impl FrameEngine<VideoSource> {
    /// Open `path` and eagerly buffer the first batch scaled into
    /// `display_w`×`display_h`.
    pub fn load(path: &Path, display_w: u32, display_h: u32) -> Result<Self> {
        Self::from_source(VideoSource::open(path)?, display_w, display_h)
    }
}

impl<S: FrameSource> FrameEngine<S> {
    pub fn from_source(source: S, display_w: u32, display_h: u32) -> Result<Self> {
        let (src_w, src_h) = source.natural_size();
        let scale = (display_w as f64 / src_w as f64)
            .min(display_h as f64 / src_h as f64);
        let out_w = ((src_w as f64 * scale) as u32).max(2);
        let out_h = ((src_h as f64 * scale) as u32).max(2);

        // One second of frames per window.
        let batch_size = (source.fps().round() as usize).max(1);

        let mut engine = Self {
            source,
            buffer:      FrameBuffer::empty(),
            clock:       PlaybackClock::new(),
            effect:      EffectKind::None,
            cache:       EffectCache::new(),
            out_w,
            out_h,
            batch_size,
            current_idx: 0,
            fps_meter:   FpsMeter::new(),
        };
        engine.load_window(0)?;
        Ok(engine)
    }

    pub fn fps(&self) -> f64 {
        self.source.fps()
    }

    pub fn total_frames(&self) -> u64 {
        self.source.total_frames()
    }

    pub fn duration_ms(&self) -> f64 {
        let fps = self.source.fps();
        if fps <= 0.0 {
            0.0
        } else {
            self.source.total_frames() as f64 * 1000.0 / fps
        }
    }

    /// Frames-per-second actually emitted, measured over ≥1 s intervals.
    pub fn measured_fps(&self) -> f64 {
        self.fps_meter.measured
    }

    /// Current clock position in milliseconds.
    pub fn current_position_ms(&self) -> f64 {
        self.clock.elapsed_ms()
    }

    pub fn effect(&self) -> EffectKind {
        self.effect
    }

    /// Select the effect for future window loads. The current buffer is
    /// left untouched; call `reload_buffer()` to re-process it.
    pub fn set_effect(&mut self, kind: EffectKind) {
        self.effect = kind;
    }

    /// Rebuild the window at its current start, with the current effect
    /// and output size.
    pub fn reload_buffer(&mut self) -> Result<()> {
        self.load_window(self.buffer.start)
    }

    fn load_window(&mut self, start: u64) -> Result<()> {
        let raw = self.source.read_batch(start, self.batch_size, self.out_w, self.out_h)?;
        let frames = raw.into_iter()
            .map(|f| effects::apply(self.effect, f, &mut self.cache))
            .collect();
        self.buffer = FrameBuffer { start, frames };
        Ok(())
    }

    /// The frame that should be on screen now, per the playback clock.
    /// Returns `Ok(None)` at end of stream. Reloads the window (with the
    /// backward pad) when the clock has moved outside it.
    pub fn next_frame(&mut self) -> Result<Option<&Frame>> {
        let desired = (self.clock.elapsed_ms() * self.source.fps() / 1000.0).floor()
            .max(0.0) as u64;
        if desired >= self.source.total_frames() {
            return Ok(None);
        }
        if !self.buffer.contains(desired) {
            self.load_window(desired.saturating_sub(SEEK_BACK_PAD))?;
        }
        self.current_idx = desired;
        self.fps_meter.tick();
        Ok(self.buffer.get(desired))
    }

    /// The last-displayed frame, without advancing the clock. Reloads the
    /// window if the frame has been evicted.
    pub fn current_frame(&mut self) -> Result<Option<&Frame>> {
        if !self.buffer.contains(self.current_idx) {
            self.load_window(self.current_idx.saturating_sub(SEEK_BACK_PAD))?;
        }
        Ok(self.buffer.get(self.current_idx))
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn start(&mut self) {
        self.fps_meter.reset();
        self.clock.start();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn resume(&mut self) {
        self.clock.resume();
    }

    /// Halt playback, rewind the clock, and reset the displayed index.
    pub fn stop(&mut self) {
        self.clock.stop();
        self.current_idx = 0;
        self.fps_meter.reset();
    }

    /// Jump to `ms` (clamped to the media duration), reload the window
    /// around the target frame, and rebase the clock so elapsed-time
    /// queries continue from `ms` whether running or paused.
    pub fn seek_to_time(&mut self, ms: f64) -> Result<()> {
        let ms = ms.clamp(0.0, self.duration_ms());
        // Seeking to the exact end floors to total_frames; pin to the last frame.
        let target = ((ms * self.source.fps() / 1000.0).floor().max(0.0) as u64)
            .min(self.source.total_frames().saturating_sub(1));
        self.load_window(target.saturating_sub(SEEK_BACK_PAD))?;
        self.clock.seek_ms(ms);
        self.current_idx = target;
        Ok(())
    }

    /// Delay before the host should call `next_frame()` again. Self-corrects
    /// against drift: the next frame's deadline minus the elapsed time,
    /// clamped to `[1, frame_interval]` so cadence never busy-waits.
    pub fn next_delay_ms(&self) -> u64 {
        let fps = self.source.fps();
        if fps <= 0.0 {
            return 1;
        }
        let interval = 1000.0 / fps;
        let deadline = (self.current_idx + 1) as f64 * interval;
        let remaining = deadline - self.clock.elapsed_ms();
        remaining.clamp(1.0, interval) as u64
    }

    #[cfg(test)]
    fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
