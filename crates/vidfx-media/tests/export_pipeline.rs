// End-to-end export: a tiny synthetic source runs through the full
// pipeline with the external transcoder forced unavailable, so the job
// must finish via the video-only fallback.

use std::path::Path;
use std::thread;
use std::time::Duration;

use vidfx_core::effect::EffectKind;
use vidfx_core::media_types::ExportStatus;
use vidfx_media::encode::SilentEncoder;
use vidfx_media::export::ExportQueue;
use vidfx_media::frame::Frame;
use vidfx_media::remux::RemuxConfig;
use vidfx_media::ExportUpdate;

/// Write a 64×48 video of `frames` moving-gradient frames at `fps`.
fn write_synthetic_source(path: &Path, frames: u32, fps: u32) {
    let (w, h) = (64u32, 48u32);
    let mut encoder = SilentEncoder::create(path, w, h, fps, 1).unwrap();
    for i in 0..frames {
        let data: Vec<u8> = (0..w as usize * h as usize)
            .flat_map(|px| {
                let v = ((px as u32 + i * 17) % 256) as u8;
                [v, v / 2, 255 - v]
            })
            .collect();
        encoder.write_frame(&Frame::new_rgb(w, h, data)).unwrap();
    }
    encoder.finish().unwrap();
}

#[test]
fn sepia_export_falls_back_to_video_only() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("clip.mp4");
    write_synthetic_source(&source, 10, 2);

    let exports = dir.path().join("exports");
    let cfg = RemuxConfig { ffmpeg_bin: "/nonexistent/vidfx-test-ffmpeg".into() };
    let mut queue = ExportQueue::new(&exports, cfg).unwrap();

    let id = queue.enqueue(&source, EffectKind::Sepia).unwrap();

    let mut terminal = None;
    'outer: for _ in 0..1_000 {
        for update in queue.poll() {
            if let vidfx_media::ExportUpdate::Status { job_id, status } = update {
                if job_id == id && status.is_terminal() {
                    terminal = Some(status);
                    break 'outer;
                }
            }
        }
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(terminal, Some(ExportStatus::CompletedWithoutAudio));

    // Final output in place, named {effect}_{stem}{ext}.
    let output = exports.join("sepia_clip.mp4");
    assert!(output.exists());
    assert!(std::fs::metadata(&output).unwrap().len() > 0);

    // No temp files left behind.
    let leftovers: Vec<_> = std::fs::read_dir(&exports).unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("temp_"))
        .collect();
    assert!(leftovers.is_empty(), "leftover temp files: {leftovers:?}");

    queue.poll();
    assert!(queue.is_idle());
}

#[test]
fn cancel_during_encode_cleans_up_and_promotes_next() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("clip.mp4");
    // Long enough that the worker is still encoding when the first
    // progress update reaches the host.
    write_synthetic_source(&source, 450, 30);

    let exports = dir.path().join("exports");
    let cfg = RemuxConfig { ffmpeg_bin: "/nonexistent/vidfx-test-ffmpeg".into() };
    let mut queue = ExportQueue::new(&exports, cfg).unwrap();

    let first  = queue.enqueue(&source, EffectKind::Negative).unwrap();
    let second = queue.enqueue(&source, EffectKind::Grayscale).unwrap();

    let mut cancelled = false;
    let mut first_terminal  = None;
    let mut second_terminal = None;
    for _ in 0..5_000 {
        for update in queue.poll() {
            match update {
                // Cancel the first job at its first mid-encode progress report.
                ExportUpdate::Progress { job_id, .. } if job_id == first && !cancelled => {
                    queue.cancel(first);
                    cancelled = true;
                    let job = queue.jobs().iter().find(|j| j.id == first).unwrap();
                    assert_eq!(job.status, ExportStatus::Cancelling);
                }
                ExportUpdate::Status { job_id, status } if status.is_terminal() => {
                    if job_id == first {
                        first_terminal = Some(status);
                    } else if job_id == second {
                        second_terminal = Some(status);
                    }
                }
                _ => {}
            }
        }
        if first_terminal.is_some() && second_terminal.is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(first_terminal, Some(ExportStatus::Cancelled));
    assert_eq!(second_terminal, Some(ExportStatus::CompletedWithoutAudio));

    // The cancelled job left nothing behind; the promoted job finished.
    assert!(!exports.join("negative_clip.mp4").exists());
    assert!(exports.join("grayscale_clip.mp4").exists());
    let leftovers: Vec<_> = std::fs::read_dir(&exports).unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("temp_"))
        .collect();
    assert!(leftovers.is_empty(), "leftover temp files: {leftovers:?}");

    queue.poll();
    assert!(queue.is_idle());
}
