// crates/vidfx-media/src/orchestrator.rs
//
// Two-state playback orchestrator.
//
// Direct mode hands the file to the external media player, which renders
// audio and video itself. Buffered mode mutes the direct player and runs
// the frame engine for video while a second, audio-only player instance
// carries the soundtrack. Every mode switch goes through one transition
// table and owns the handoff of position and running flag, so there is no
// flag-checking scattered across call sites.

use anyhow::{anyhow, Result};

use vidfx_core::effect::EffectKind;
use vidfx_core::player::MediaPlayer;

use crate::engine::{FrameEngine, FrameSource};
use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// External player renders everything; no effect applied.
    Direct,
    /// Frame engine renders effect-processed video; audio player carries sound.
    Buffered,
}

/// The single source of mode truth: effect selection decides the mode.
pub fn mode_for_effect(effect: EffectKind) -> PlaybackMode {
    if effect.is_none() {
        PlaybackMode::Direct
    } else {
        PlaybackMode::Buffered
    }
}

pub struct Orchestrator<P: MediaPlayer, S: FrameSource> {
    /// Direct playback instance (video + audio).
    player: P,
    /// Audio-only instance used while the engine renders video.
    audio:  P,
    engine: Option<FrameEngine<S>>,
    mode:   PlaybackMode,
    effect: EffectKind,
}

impl<P: MediaPlayer, S: FrameSource> Orchestrator<P, S> {
    pub fn new(player: P, audio: P) -> Self {
        Self {
            player,
            audio,
            engine: None,
            mode:   PlaybackMode::Direct,
            effect: EffectKind::None,
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn effect(&self) -> EffectKind {
        self.effect
    }

    /// Attach the frame engine for the loaded file. Loading resets to
    /// direct playback; the engine is only driven after an effect is set.
    pub fn attach_engine(&mut self, engine: FrameEngine<S>) {
        self.engine = Some(engine);
        self.mode = PlaybackMode::Direct;
        self.effect = EffectKind::None;
        self.audio.set_volume(100);
    }

    /// Select `effect` for live playback, switching modes as needed. The
    /// handoff keeps position and running state continuous.
    pub fn set_effect(&mut self, effect: EffectKind) -> Result<()> {
        let target = mode_for_effect(effect);

        match (self.mode, target) {
            (PlaybackMode::Direct, PlaybackMode::Buffered) => {
                self.enter_buffered(effect)?;
            }
            (PlaybackMode::Buffered, PlaybackMode::Direct) => {
                self.enter_direct()?;
            }
            (PlaybackMode::Buffered, PlaybackMode::Buffered) => {
                // Same mode, different effect: reprocess the window in place.
                let engine = self.engine_mut()?;
                engine.set_effect(effect);
                engine.reload_buffer()?;
            }
            (PlaybackMode::Direct, PlaybackMode::Direct) => {}
        }

        self.effect = effect;
        Ok(())
    }

    /// Direct → Buffered: freeze the direct player, carry its position and
    /// running flag into the engine + audio player pair.
    fn enter_buffered(&mut self, effect: EffectKind) -> Result<()> {
        // Resolve the engine before touching the player so a missing engine
        // leaves direct playback undisturbed.
        let engine = self.engine.as_mut()
            .ok_or_else(|| anyhow!("no media loaded"))?;

        let pos_ms  = self.player.time_ms().max(0);
        let running = self.player.is_playing();
        self.player.pause();

        engine.set_effect(effect);
        engine.seek_to_time(pos_ms as f64)?;

        self.audio.set_time_ms(pos_ms);
        if running {
            self.audio.play().map_err(|e| anyhow!("audio play: {e}"))?;
            engine.start();
        }

        self.mode = PlaybackMode::Buffered;
        Ok(())
    }

    /// Buffered → Direct: halt the engine and audio player, hand position
    /// and running flag back to the direct player.
    fn enter_direct(&mut self) -> Result<()> {
        let engine  = self.engine_mut()?;
        let running = engine.is_running();
        let pos_ms  = engine.current_position_ms();
        engine.pause();

        self.audio.stop();

        self.player.set_time_ms(pos_ms as i64);
        if running {
            self.player.play().map_err(|e| anyhow!("player play: {e}"))?;
        }

        self.mode = PlaybackMode::Direct;
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        match self.mode {
            PlaybackMode::Direct => {
                self.player.play().map_err(|e| anyhow!("player play: {e}"))?;
            }
            PlaybackMode::Buffered => {
                self.audio.play().map_err(|e| anyhow!("audio play: {e}"))?;
                self.engine_mut()?.start();
            }
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        match self.mode {
            PlaybackMode::Direct   => self.player.pause(),
            PlaybackMode::Buffered => {
                self.audio.pause();
                self.engine_mut()?.pause();
            }
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        match self.mode {
            PlaybackMode::Direct   => self.player.stop(),
            PlaybackMode::Buffered => {
                self.audio.stop();
                self.engine_mut()?.stop();
            }
        }
        Ok(())
    }

    pub fn seek_ms(&mut self, ms: i64) -> Result<()> {
        match self.mode {
            PlaybackMode::Direct => self.player.set_time_ms(ms),
            PlaybackMode::Buffered => {
                self.audio.set_time_ms(ms);
                self.engine_mut()?.seek_to_time(ms as f64)?;
            }
        }
        Ok(())
    }

    pub fn position_ms(&self) -> i64 {
        match self.mode {
            PlaybackMode::Direct   => self.player.time_ms(),
            PlaybackMode::Buffered => self.engine.as_ref()
                .map(|e| e.current_position_ms() as i64)
                .unwrap_or(0),
        }
    }

    /// One buffered-mode step: the frame that belongs on screen now plus
    /// the delay before the next step. Returns None in direct mode (the
    /// external player renders) or at end of stream.
    pub fn tick(&mut self) -> Result<Option<(Frame, u64)>> {
        if self.mode != PlaybackMode::Buffered {
            return Ok(None);
        }
        let engine = self.engine_mut()?;
        let frame = engine.next_frame()?.cloned();
        let delay = engine.next_delay_ms();
        Ok(frame.map(|f| (f, delay)))
    }

    fn engine_mut(&mut self) -> Result<&mut FrameEngine<S>> {
        self.engine.as_mut().ok_or_else(|| anyhow!("no media loaded"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use vidfx_core::player::VideoTrack;

    #[test]
    fn effect_decides_mode() {
        assert_eq!(mode_for_effect(EffectKind::None), PlaybackMode::Direct);
        for kind in EffectKind::ALL.into_iter().filter(|k| !k.is_none()) {
            assert_eq!(mode_for_effect(kind), PlaybackMode::Buffered);
        }
    }

    // ── Fakes ────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FakeState {
        playing: bool,
        time_ms: i64,
        volume:  u8,
        calls:   Vec<&'static str>,
    }

    #[derive(Clone, Default)]
    struct FakePlayer(Rc<RefCell<FakeState>>);

    impl MediaPlayer for FakePlayer {
        type Error = String;

        fn load(&mut self, _path: &std::path::Path) -> Result<(), String> {
            self.0.borrow_mut().calls.push("load");
            Ok(())
        }
        fn play(&mut self) -> Result<(), String> {
            let mut s = self.0.borrow_mut();
            s.playing = true;
            s.calls.push("play");
            Ok(())
        }
        fn pause(&mut self) {
            let mut s = self.0.borrow_mut();
            s.playing = false;
            s.calls.push("pause");
        }
        fn stop(&mut self) {
            let mut s = self.0.borrow_mut();
            s.playing = false;
            s.time_ms = 0;
            s.calls.push("stop");
        }
        fn is_playing(&self) -> bool { self.0.borrow().playing }
        fn time_ms(&self) -> i64 { self.0.borrow().time_ms }
        fn set_time_ms(&mut self, ms: i64) { self.0.borrow_mut().time_ms = ms; }
        fn length_ms(&self) -> i64 { 10_000 }
        fn set_volume(&mut self, volume: u8) { self.0.borrow_mut().volume = volume.min(100); }
        fn video_tracks(&self) -> Vec<VideoTrack> {
            vec![VideoTrack { frame_rate_num: 30, frame_rate_den: 1 }]
        }
    }

    struct SyntheticSource {
        total: u64,
    }

    impl FrameSource for SyntheticSource {
        fn fps(&self) -> f64 { 30.0 }
        fn total_frames(&self) -> u64 { self.total }
        fn natural_size(&self) -> (u32, u32) { (4, 4) }
        fn read_batch(
            &mut self, start: u64, count: usize, out_w: u32, out_h: u32,
        ) -> Result<Vec<Frame>> {
            let end = (start + count as u64).min(self.total);
            Ok((start..end)
                .map(|_| Frame::new_rgb(out_w, out_h, vec![128; (out_w * out_h * 3) as usize]))
                .collect())
        }
    }

    fn orchestrator() -> (Orchestrator<FakePlayer, SyntheticSource>, FakePlayer, FakePlayer) {
        let player = FakePlayer::default();
        let audio  = FakePlayer::default();
        let mut orch = Orchestrator::new(player.clone(), audio.clone());
        let engine = FrameEngine::from_source(SyntheticSource { total: 300 }, 4, 4).unwrap();
        orch.attach_engine(engine);
        (orch, player, audio)
    }

    #[test]
    fn direct_to_buffered_hands_off_position_and_running() {
        let (mut orch, player, audio) = orchestrator();
        player.0.borrow_mut().time_ms = 2_000;
        player.0.borrow_mut().playing = true;

        orch.set_effect(EffectKind::Negative).unwrap();
        assert_eq!(orch.mode(), PlaybackMode::Buffered);
        // Direct player frozen; audio instance picked up position and play.
        assert!(!player.0.borrow().playing);
        assert_eq!(audio.0.borrow().time_ms, 2_000);
        assert!(audio.0.borrow().playing);
        assert!((orch.position_ms() - 2_000).abs() < 50);
    }

    #[test]
    fn missing_engine_leaves_direct_playback_untouched() {
        let player = FakePlayer::default();
        let audio  = FakePlayer::default();
        let mut orch: Orchestrator<FakePlayer, SyntheticSource> =
            Orchestrator::new(player.clone(), audio.clone());
        player.0.borrow_mut().playing = true;

        assert!(orch.set_effect(EffectKind::Sepia).is_err());
        assert_eq!(orch.mode(), PlaybackMode::Direct);
        assert!(player.0.borrow().playing);
        assert!(player.0.borrow().calls.is_empty());
    }

    #[test]
    fn buffered_to_direct_hands_position_back() {
        let (mut orch, player, audio) = orchestrator();
        orch.set_effect(EffectKind::Sepia).unwrap();
        orch.seek_ms(4_000).unwrap();

        orch.set_effect(EffectKind::None).unwrap();
        assert_eq!(orch.mode(), PlaybackMode::Direct);
        assert!(!audio.0.borrow().playing);
        assert!((player.0.borrow().time_ms - 4_000).abs() < 50);
        // Was paused before the switch, so the direct player stays paused.
        assert!(!player.0.borrow().playing);
    }

    #[test]
    fn effect_change_within_buffered_keeps_mode() {
        let (mut orch, _, _) = orchestrator();
        orch.set_effect(EffectKind::Sepia).unwrap();
        orch.set_effect(EffectKind::Vignette).unwrap();
        assert_eq!(orch.mode(), PlaybackMode::Buffered);
        assert_eq!(orch.effect(), EffectKind::Vignette);
    }

    #[test]
    fn tick_is_inert_in_direct_mode() {
        let (mut orch, _, _) = orchestrator();
        assert!(orch.tick().unwrap().is_none());
        orch.set_effect(EffectKind::Posterize).unwrap();
        orch.play().unwrap();
        let (frame, delay) = orch.tick().unwrap().unwrap();
        assert_eq!(frame.width, 4);
        assert!((1..=34).contains(&delay));
    }
}
