// crates/vidfx-core/src/clock.rs
//
// The playback clock that drives frame selection during effect playback.
//
// The clock carries two fields whose meaning depends on `running`:
//   - `base_ms`  — elapsed milliseconds at the moment `origin` was anchored
//                  (while running), or the full elapsed time (while paused).
//   - `origin`   — wall-clock anchor; meaningful only while running.
//
// Every transition recomputes one of the two so that `elapsed_ms()` is
// continuous across it: pausing folds the wall delta into `base_ms`,
// resuming re-anchors `origin`, seeking overwrites `base_ms` outright.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PlaybackClock {
    running: bool,
    base_ms: f64,
    origin:  Instant,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            running: false,
            base_ms: 0.0,
            origin:  Instant::now(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Elapsed playback time in milliseconds.
    ///
    /// Monotonically non-decreasing while running; frozen while paused.
    pub fn elapsed_ms(&self) -> f64 {
        if self.running {
            self.base_ms + self.origin.elapsed().as_secs_f64() * 1000.0
        } else {
            self.base_ms
        }
    }

    /// Start (or resume) from the current offset.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.origin = Instant::now();
        }
    }

    pub fn pause(&mut self) {
        if self.running {
            self.base_ms = self.elapsed_ms();
            self.running = false;
        }
    }

    pub fn resume(&mut self) {
        self.start();
    }

    /// Halt and rewind to zero.
    pub fn stop(&mut self) {
        self.running = false;
        self.base_ms = 0.0;
    }

    /// Jump to `ms`. Works in both states: while running the origin is
    /// re-anchored so the very next `elapsed_ms()` reads `ms` and keeps
    /// counting from there.
    pub fn seek_ms(&mut self, ms: f64) {
        self.base_ms = ms.max(0.0);
        self.origin = Instant::now();
    }
}
