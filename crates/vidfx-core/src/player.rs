// crates/vidfx-core/src/player.rs
//
// Abstraction over a direct media player backend. The orchestrator drives
// two instances of this (rendering player + audio-only player) plus the
// buffered frame engine; keeping it a trait lets playback logic be tested
// without any real playback backend.

/// Video stream parameters reported by a player backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoTrack {
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
}

impl VideoTrack {
    pub fn fps(&self) -> f64 {
        if self.frame_rate_den == 0 {
            0.0
        } else {
            self.frame_rate_num as f64 / self.frame_rate_den as f64
        }
    }
}

/// A direct playback backend: owns its own decode/render loop and exposes
/// transport controls plus a millisecond position.
///
/// Implementations must make `time_ms`/`set_time_ms` usable while paused as
/// well as while playing; `set_volume` takes 0..=100.
pub trait MediaPlayer {
    type Error: std::fmt::Display;

    fn load(&mut self, path: &std::path::Path) -> Result<(), Self::Error>;
    fn play(&mut self) -> Result<(), Self::Error>;
    fn pause(&mut self);
    fn stop(&mut self);
    fn is_playing(&self) -> bool;

    /// Current playback position in milliseconds.
    fn time_ms(&self) -> i64;
    fn set_time_ms(&mut self, ms: i64);
    /// Total media length in milliseconds, or -1 when unknown.
    fn length_ms(&self) -> i64;

    /// Volume in percent, 0..=100. Out-of-range values are clamped.
    fn set_volume(&mut self, volume: u8);

    fn video_tracks(&self) -> Vec<VideoTrack>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_fps() {
        let t = VideoTrack { frame_rate_num: 30000, frame_rate_den: 1001 };
        assert!((t.fps() - 29.97).abs() < 0.01);
        let z = VideoTrack { frame_rate_num: 30, frame_rate_den: 0 };
        assert_eq!(z.fps(), 0.0);
    }
}
