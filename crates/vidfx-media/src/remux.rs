// crates/vidfx-media/src/remux.rs
//
// Audio remux step for exports. Primary strategy: spawn the external
// `ffmpeg` CLI to copy the silent video stream and attach the original
// file's audio track. Fallback (tool missing or non-zero exit): extract
// the audio in-process to a temp WAV, then copy the silent video to the
// output path as a video-only result. Neither tier may wedge the queue.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::{self, ExtractOutcome};

/// How the external transcoder is invoked. Tests point `ffmpeg_bin` at a
/// nonexistent binary to force the fallback path.
#[derive(Debug, Clone)]
pub struct RemuxConfig {
    pub ffmpeg_bin: String,
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self { ffmpeg_bin: "ffmpeg".into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemuxOutcome {
    /// Primary path succeeded: output has video and audio.
    Full,
    /// Fallback path: output is the silent video copied as-is.
    VideoOnly,
    /// Cancellation observed during fallback audio extraction.
    Cancelled,
}

/// True when `ffmpeg_bin` resolves to a runnable transcoder.
pub fn transcoder_available(cfg: &RemuxConfig) -> bool {
    Command::new(&cfg.ffmpeg_bin)
        .arg("-version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Argument list for the primary remux invocation: video copied from the
/// silent file, audio re-encoded to AAC from the original, trimmed to the
/// shorter stream, existing output overwritten.
pub fn primary_args(silent: &Path, original: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(), silent.as_os_str().to_owned(),
        "-i".into(), original.as_os_str().to_owned(),
        "-c:v".into(), "copy".into(),
        "-c:a".into(), "aac".into(),
        "-map".into(), "0:v:0".into(),
        "-map".into(), "1:a:0".into(),
        "-shortest".into(),
        output.as_os_str().to_owned(),
        "-y".into(),
    ]
}

/// Merge `silent` with the audio track of `original` into `output`.
///
/// The caller owns deletion of `silent` — it is removed whether remux
/// succeeds or fails, so it is not touched here.
pub fn remux(
    cfg:      &RemuxConfig,
    silent:   &Path,
    original: &Path,
    output:   &Path,
    cancel:   &Arc<AtomicBool>,
) -> Result<RemuxOutcome, String> {
    if transcoder_available(cfg) {
        let result = Command::new(&cfg.ffmpeg_bin)
            .args(primary_args(silent, original, output))
            .output();
        match result {
            Ok(out) if out.status.success() => {
                eprintln!("[remux] audio merged → {}", output.display());
                return Ok(RemuxOutcome::Full);
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                eprintln!(
                    "[remux] transcoder exited {} — falling back to video-only\n{}",
                    out.status,
                    stderr.lines().rev().take(4).collect::<Vec<_>>().join("\n"),
                );
            }
            Err(e) => {
                eprintln!("[remux] transcoder failed to spawn ({e}) — falling back");
            }
        }
    } else {
        eprintln!(
            "[remux] '{}' not available — falling back to video-only",
            cfg.ffmpeg_bin,
        );
    }

    fallback(silent, original, output, cancel)
}

/// Video-only fallback. The audio extraction is best-effort: its product
/// is discarded (nothing in this tier can mux it back), but it runs with
/// cancellation polling so a cancel during a long extraction still lands
/// promptly.
fn fallback(
    silent:   &Path,
    original: &Path,
    output:   &Path,
    cancel:   &Arc<AtomicBool>,
) -> Result<RemuxOutcome, String> {
    let wav = std::env::temp_dir().join(format!(
        "vidfx_audio_{}.wav",
        uuid::Uuid::new_v4(),
    ));
    match audio::extract_to_wav(original, &wav, cancel) {
        Ok(ExtractOutcome::Cancelled) => {
            audio::cleanup_audio_temp(&wav);
            return Ok(RemuxOutcome::Cancelled);
        }
        Ok(ExtractOutcome::Done(bytes)) => {
            eprintln!("[remux] extracted {bytes} bytes of PCM (unused in video-only fallback)");
        }
        Err(e) => {
            eprintln!("[remux] fallback audio extraction failed: {e}");
        }
    }
    audio::cleanup_audio_temp(&wav);

    if cancel.load(Ordering::Relaxed) {
        return Ok(RemuxOutcome::Cancelled);
    }

    std::fs::copy(silent, output)
        .map_err(|e| format!("copy silent video to '{}': {e}", output.display()))?;
    eprintln!("[remux] video-only output written → {}", output.display());
    Ok(RemuxOutcome::VideoOnly)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn primary_args_layout() {
        let args = primary_args(
            Path::new("/tmp/temp_clip.mp4"),
            Path::new("/videos/clip.mp4"),
            Path::new("/videos/exports/sepia_clip.mp4"),
        );
        let rendered: Vec<String> = args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(rendered, vec![
            "-i", "/tmp/temp_clip.mp4",
            "-i", "/videos/clip.mp4",
            "-c:v", "copy",
            "-c:a", "aac",
            "-map", "0:v:0",
            "-map", "1:a:0",
            "-shortest",
            "/videos/exports/sepia_clip.mp4",
            "-y",
        ]);
    }

    #[test]
    fn missing_transcoder_is_detected() {
        let cfg = RemuxConfig {
            ffmpeg_bin: PathBuf::from("/nonexistent/vidfx-no-such-bin")
                .to_string_lossy().into_owned(),
        };
        assert!(!transcoder_available(&cfg));
    }
}
