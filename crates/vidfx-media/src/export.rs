// crates/vidfx-media/src/export.rs
//
// ExportQueue: strictly-sequential background queue of effect-export jobs.
//
// Exactly one job is Processing at any time. The worker thread never
// touches job state — it sends ExportUpdate messages over a bounded
// channel, and the host applies them in `poll()` on its own loop. When a
// job reaches a terminal state it is dropped from the queue and the next
// Queued job is promoted.
//
// Cancellation is cooperative: each job has an Arc<AtomicBool> keyed by
// job id; the worker polls it once per encoded frame (and once per packet
// during fallback audio extraction), so a cancel lands within one frame's
// processing time, not instantly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use uuid::Uuid;

use vidfx_core::effect::EffectKind;
use vidfx_core::media_types::{ExportStatus, ExportUpdate};

use crate::decode::VideoSource;
use crate::effects::{self, EffectCache};
use crate::encode::SilentEncoder;
use crate::engine::FrameSource;
use crate::remux::{self, RemuxConfig, RemuxOutcome};

/// Fraction of the progress bar covered by frame encoding; the remaining
/// 25% belongs to the remux phase.
const ENCODE_PROGRESS_SPAN: f64 = 75.0;

/// Cooperative yield cadence: sleep briefly every this many frames so the
/// worker never starves the host loop.
const YIELD_EVERY_FRAMES: u64 = 30;

// ── Job ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExportJob {
    pub id:       Uuid,
    pub input:    PathBuf,
    pub output:   PathBuf,
    pub temp:     PathBuf,
    pub effect:   EffectKind,
    pub status:   ExportStatus,
    pub progress: u8,
}

// ── Queue ─────────────────────────────────────────────────────────────────────

pub struct ExportQueue {
    jobs:       Vec<ExportJob>,
    tx:         Sender<ExportUpdate>,
    rx:         Receiver<ExportUpdate>,
    /// Per-job cancel flags, keyed by job id so cancellation is targeted.
    cancels:    Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>,
    output_dir: PathBuf,
    remux_cfg:  RemuxConfig,
    /// Id of the job currently Processing, if any.
    active:     Option<Uuid>,
}

impl ExportQueue {
    pub fn new(output_dir: &Path, remux_cfg: RemuxConfig) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("create export dir '{}'", output_dir.display()))?;
        let (tx, rx) = bounded(512);
        Ok(Self {
            jobs:       Vec::new(),
            tx,
            rx,
            cancels:    Arc::new(Mutex::new(HashMap::new())),
            output_dir: output_dir.to_path_buf(),
            remux_cfg,
            active:     None,
        })
    }

    pub fn jobs(&self) -> &[ExportJob] {
        &self.jobs
    }

    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty()
    }

    /// `{effect}_{stem}{ext}` inside the export directory.
    pub fn output_path_for(&self, input: &Path, effect: EffectKind) -> PathBuf {
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let ext  = input.extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        self.output_dir.join(format!("{}_{stem}{ext}", effect.id()))
    }

    /// Queue an export of `input` with `effect`. Returns the new job's id,
    /// or None when the request is rejected: a no-op effect, or a job with
    /// the same resolved output path already queued.
    pub fn enqueue(&mut self, input: &Path, effect: EffectKind) -> Option<Uuid> {
        if effect.is_none() {
            eprintln!("[export] refusing export with no effect selected");
            return None;
        }
        let output = self.output_path_for(input, effect);
        if self.jobs.iter().any(|j| j.output == output) {
            eprintln!("[export] duplicate job for '{}' ignored", output.display());
            return None;
        }

        let file_name = output.file_name().unwrap_or_default().to_string_lossy();
        let temp = self.output_dir.join(format!("temp_{file_name}"));

        let job = ExportJob {
            id:       Uuid::new_v4(),
            input:    input.to_path_buf(),
            output,
            temp,
            effect,
            status:   ExportStatus::Queued,
            progress: 0,
        };
        let id = job.id;
        self.jobs.push(job);
        self.promote_next();
        Some(id)
    }

    /// Request cancellation of one job. Queued jobs terminate immediately;
    /// a Processing job flips to Cancelling and the worker observes the
    /// flag at its next frame.
    pub fn cancel(&mut self, id: Uuid) {
        if let Some(flag) = self.cancels.lock().unwrap_or_else(|e| e.into_inner()).get(&id) {
            flag.store(true, Ordering::Relaxed);
        }
        if let Some(job) = self.jobs.iter_mut().find(|j| j.id == id) {
            match job.status {
                ExportStatus::Queued     => job.status = ExportStatus::Cancelled,
                ExportStatus::Processing
                | ExportStatus::MergingAudio => job.status = ExportStatus::Cancelling,
                _ => {}
            }
        }
    }

    pub fn cancel_all(&mut self) {
        let ids: Vec<Uuid> = self.jobs.iter().map(|j| j.id).collect();
        for id in ids {
            self.cancel(id);
        }
    }

    /// Drain worker updates, apply them to job state, drop terminal jobs,
    /// and promote the next Queued job. Returns the drained updates so the
    /// host can render them.
    pub fn poll(&mut self) -> Vec<ExportUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.rx.try_recv() {
            self.apply(&update);
            updates.push(update);
        }

        let cancels = Arc::clone(&self.cancels);
        let mut active = self.active;
        self.jobs.retain(|job| {
            if job.status.is_terminal() {
                cancels.lock().unwrap_or_else(|e| e.into_inner()).remove(&job.id);
                if active == Some(job.id) {
                    active = None;
                }
                false
            } else {
                true
            }
        });
        self.active = active;

        self.promote_next();
        updates
    }

    fn apply(&mut self, update: &ExportUpdate) {
        match update {
            ExportUpdate::Progress { job_id, percent } => {
                if let Some(job) = self.jobs.iter_mut().find(|j| j.id == *job_id) {
                    job.progress = *percent;
                }
            }
            ExportUpdate::Status { job_id, status } => {
                if let Some(job) = self.jobs.iter_mut().find(|j| j.id == *job_id) {
                    // A host-side Cancelling is only superseded by a
                    // terminal state from the worker.
                    if job.status == ExportStatus::Cancelling && !status.is_terminal() {
                        return;
                    }
                    job.status = status.clone();
                }
            }
        }
    }

    /// Start the first Queued job when nothing is Processing. One worker
    /// thread per job, spawned only at promotion (strict FIFO serial).
    fn promote_next(&mut self) {
        if self.active.is_some() {
            return;
        }
        let Some(job) = self.jobs.iter_mut()
            .find(|j| j.status == ExportStatus::Queued)
        else {
            return;
        };

        job.status = ExportStatus::Processing;
        self.active = Some(job.id);

        let cancel = Arc::new(AtomicBool::new(false));
        // Register before spawning so cancel() cannot miss the flag.
        self.cancels.lock().unwrap_or_else(|e| e.into_inner())
            .insert(job.id, Arc::clone(&cancel));

        let job_id    = job.id;
        let input     = job.input.clone();
        let temp      = job.temp.clone();
        let output    = job.output.clone();
        let effect    = job.effect;
        let tx        = self.tx.clone();
        let remux_cfg = self.remux_cfg.clone();

        thread::spawn(move || {
            run_job(job_id, &input, &temp, &output, effect, &cancel, &remux_cfg, &tx);
        });
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

/// Process one export job end to end. Runs on its own thread; all state
/// changes travel back over `tx`.
fn run_job(
    job_id:    Uuid,
    input:     &Path,
    temp:      &Path,
    output:    &Path,
    effect:    EffectKind,
    cancel:    &Arc<AtomicBool>,
    remux_cfg: &RemuxConfig,
    tx:        &Sender<ExportUpdate>,
) {
    let send_status = |status: ExportStatus| {
        let _ = tx.send(ExportUpdate::Status { job_id, status });
    };

    match encode_silent(job_id, input, temp, effect, cancel, tx) {
        Ok(EncodeResult::Done) => {}
        Ok(EncodeResult::Cancelled) => {
            remove_if_exists(temp);
            send_status(ExportStatus::Cancelled);
            return;
        }
        Err(msg) => {
            remove_if_exists(temp);
            send_status(ExportStatus::Failed(msg));
            return;
        }
    }

    send_status(ExportStatus::MergingAudio);
    let _ = tx.send(ExportUpdate::Progress { job_id, percent: ENCODE_PROGRESS_SPAN as u8 });

    let outcome = remux::remux(remux_cfg, temp, input, output, cancel);
    remove_if_exists(temp);

    match outcome {
        Ok(RemuxOutcome::Full) => {
            let _ = tx.send(ExportUpdate::Progress { job_id, percent: 100 });
            send_status(ExportStatus::Completed);
        }
        Ok(RemuxOutcome::VideoOnly) => {
            let _ = tx.send(ExportUpdate::Progress { job_id, percent: 100 });
            send_status(ExportStatus::CompletedWithoutAudio);
        }
        Ok(RemuxOutcome::Cancelled) => {
            remove_if_exists(output);
            send_status(ExportStatus::Cancelled);
        }
        Err(msg) => {
            remove_if_exists(output);
            send_status(ExportStatus::Failed(msg));
        }
    }
}

enum EncodeResult {
    Done,
    Cancelled,
}

/// Decode `input` at native size, apply `effect` per frame, and encode the
/// silent video to `temp`. Progress covers 0..=75; updates are sent only
/// when the integer percentage changes.
fn encode_silent(
    job_id: Uuid,
    input:  &Path,
    temp:   &Path,
    effect: EffectKind,
    cancel: &Arc<AtomicBool>,
    tx:     &Sender<ExportUpdate>,
) -> Result<EncodeResult, String> {
    let mut source = VideoSource::open(input)
        .map_err(|e| format!("open source: {e}"))?;

    let (width, height) = source.natural_size();
    let (fps_num, fps_den) = source.fps_rational();
    let total = source.total_frames().max(1);

    let mut encoder = SilentEncoder::create(temp, width, height, fps_num, fps_den)?;

    let mut cache = EffectCache::new();
    let mut done: u64 = 0;
    let mut last_percent: u8 = 0;

    while let Some((_, frame)) = source.next_frame_scaled(width, height) {
        if cancel.load(Ordering::Relaxed) {
            return Ok(EncodeResult::Cancelled);
        }

        let processed = effects::apply(effect, frame, &mut cache);
        encoder.write_frame(&processed)?;
        done += 1;

        let percent = ((done as f64 / total as f64) * ENCODE_PROGRESS_SPAN)
            .floor()
            .min(ENCODE_PROGRESS_SPAN) as u8;
        if percent != last_percent {
            last_percent = percent;
            let _ = tx.send(ExportUpdate::Progress { job_id, percent });
        }

        if done % YIELD_EVERY_FRAMES == 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    encoder.finish()?;
    eprintln!("[export] silent encode done ({done} frames) → {}", temp.display());
    Ok(EncodeResult::Done)
}

fn remove_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(())                                             => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => eprintln!("[export] could not remove '{}': {e}", path.display()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_queue(dir: &Path) -> ExportQueue {
        // A bogus transcoder path keeps tests off any real ffmpeg CLI.
        let cfg = RemuxConfig { ffmpeg_bin: "/nonexistent/vidfx-test-ffmpeg".into() };
        ExportQueue::new(dir, cfg).unwrap()
    }

    fn wait_for_terminal(queue: &mut ExportQueue, id: Uuid) -> ExportStatus {
        for _ in 0..500 {
            for update in queue.poll() {
                if let ExportUpdate::Status { job_id, status } = update {
                    if job_id == id && status.is_terminal() {
                        return status;
                    }
                }
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("job {id} never reached a terminal state");
    }

    #[test]
    fn output_naming() {
        let dir = tempfile::tempdir().unwrap();
        let queue = test_queue(dir.path());
        let out = queue.output_path_for(Path::new("/videos/clip.mp4"), EffectKind::Sepia);
        assert_eq!(out, dir.path().join("sepia_clip.mp4"));
    }

    #[test]
    fn none_effect_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = test_queue(dir.path());
        assert!(queue.enqueue(Path::new("/videos/clip.mp4"), EffectKind::None).is_none());
        assert!(queue.is_idle());
    }

    #[test]
    fn duplicate_output_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = test_queue(dir.path());
        let first  = queue.enqueue(Path::new("/videos/missing.mp4"), EffectKind::Sepia);
        let second = queue.enqueue(Path::new("/videos/missing.mp4"), EffectKind::Sepia);
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(queue.jobs().len(), 1);
        // Same input, different effect → different output path, accepted.
        let third = queue.enqueue(Path::new("/videos/missing.mp4"), EffectKind::Negative);
        assert!(third.is_some());
    }

    #[test]
    fn unopenable_source_fails_job_and_unblocks_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = test_queue(dir.path());
        let id = queue.enqueue(Path::new("/videos/does-not-exist.mp4"), EffectKind::Grayscale)
            .unwrap();
        let status = wait_for_terminal(&mut queue, id);
        assert!(matches!(status, ExportStatus::Failed(_)));
        // Terminal job removed; queue idle again.
        queue.poll();
        assert!(queue.is_idle());
    }

    #[test]
    fn queued_job_cancels_without_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut queue = test_queue(dir.path());
        // First job occupies the Processing slot (and will fail eventually).
        let _first = queue.enqueue(Path::new("/videos/a.mp4"), EffectKind::Sepia).unwrap();
        let second = queue.enqueue(Path::new("/videos/b.mp4"), EffectKind::Sepia).unwrap();

        queue.cancel(second);
        let job = queue.jobs().iter().find(|j| j.id == second).unwrap();
        assert_eq!(job.status, ExportStatus::Cancelled);
        queue.poll();
        assert!(!queue.jobs().iter().any(|j| j.id == second));
    }
}
