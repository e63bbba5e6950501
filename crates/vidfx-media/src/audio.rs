// crates/vidfx-media/src/audio.rs
//
// In-process audio extraction for the remux fallback path, plus temp file
// cleanup. Decodes with the statically-linked ffmpeg-the-third rather than
// a child process, so it works even when the external transcoder that the
// primary remux path needs is missing.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::input;
use ffmpeg::format::sample::{Sample, Type as SampleType};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Output sample rate for extracted WAV files.
const OUT_RATE: u32 = 44_100;

/// Output format: packed (interleaved) f32 le. WAV format tag 3 = IEEE_FLOAT.
const OUT_FMT: Sample = Sample::F32(SampleType::Packed);

const OUT_LAYOUT: ChannelLayout = ChannelLayout::STEREO;

// ── Public API ────────────────────────────────────────────────────────────────

pub enum ExtractOutcome {
    /// Extraction finished; total bytes written (header + PCM).
    Done(u64),
    /// The cancel flag was observed mid-extraction; `dst` was not written.
    Cancelled,
}

/// Decode audio from `src`, resample to 44100 Hz stereo f32le, and write a
/// WAV file to `dst`. The cancel flag is polled once per demuxed packet so
/// a job cancel lands within one packet's worth of work.
pub fn extract_to_wav(
    src:    &Path,
    dst:    &Path,
    cancel: &Arc<AtomicBool>,
) -> Result<ExtractOutcome, String> {
    ffmpeg::init().map_err(|e| format!("ffmpeg init: {e}"))?;

    let mut ictx = input(&src).map_err(|e| format!("open: {e}"))?;

    let audio_stream_idx = ictx
        .streams()
        .best(MediaType::Audio)
        .ok_or_else(|| "no audio stream".to_string())?
        .index();

    let stream = ictx.stream(audio_stream_idx)
        .ok_or_else(|| "audio stream vanished".to_string())?;
    let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| format!("codec context: {e}"))?;
    let mut decoder = dec_ctx.decoder().audio()
        .map_err(|e| format!("audio decoder: {e}"))?;

    // The resampler is built lazily on the first decoded frame so we know
    // the real source format/layout/rate before constructing the SwrContext.
    let mut resampler: Option<resampling::Context> = None;
    let mut pcm: Vec<f32> = Vec::new();

    for result in ictx.packets() {
        if cancel.load(Ordering::Relaxed) {
            return Ok(ExtractOutcome::Cancelled);
        }
        let (stream, packet) = match result {
            Ok(p)  => p,
            Err(_) => continue,
        };
        if stream.index() != audio_stream_idx { continue; }
        if decoder.send_packet(&packet).is_err() { continue; }

        let mut frame = AudioFrame::empty();
        while decoder.receive_frame(&mut frame).is_ok() {
            append_resampled(&frame, &mut resampler, &mut pcm)?;
        }
    }

    // Flush decoder
    let _ = decoder.send_eof();
    let mut frame = AudioFrame::empty();
    while decoder.receive_frame(&mut frame).is_ok() {
        append_resampled(&frame, &mut resampler, &mut pcm)?;
    }

    if pcm.is_empty() {
        return Err("no audio samples decoded".into());
    }

    let bytes = write_wav(dst, &pcm).map_err(|e| format!("write WAV: {e}"))?;
    Ok(ExtractOutcome::Done(bytes))
}

/// Delete a temp WAV created by the fallback extraction. Only touches
/// files matching the `vidfx_audio_*.wav` pattern in the OS temp dir.
pub fn cleanup_audio_temp(path: &Path) {
    let in_temp = path.parent()
        .map(|p| p == std::env::temp_dir())
        .unwrap_or(false);
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    if in_temp && name.starts_with("vidfx_audio_") && name.ends_with(".wav") {
        match std::fs::remove_file(path) {
            Ok(())                                                     => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound         => {}
            Err(e) => eprintln!("[audio] cleanup_audio_temp: {e}"),
        }
    }
}

// ── Internal implementation ───────────────────────────────────────────────────

/// Resample `frame` to OUT_FMT/OUT_LAYOUT/OUT_RATE and append the resulting
/// interleaved f32 samples to `out`. Builds `resampler` on first call.
fn append_resampled(
    frame:     &AudioFrame,
    resampler: &mut Option<resampling::Context>,
    out:       &mut Vec<f32>,
) -> Result<(), String> {
    let src_channels = frame.ch_layout().channels();
    let needs_resample = frame.format() != OUT_FMT
        || frame.rate()                != OUT_RATE
        || src_channels                != 2;

    if needs_resample {
        // Mono sources must be declared as MONO so swr doesn't misinterpret
        // the channel count.
        let made = match resampler {
            Some(_) => Ok(()),
            None => {
                let src_layout = if src_channels >= 2 {
                    frame.ch_layout()
                } else {
                    ChannelLayout::MONO
                };
                resampling::Context::get2(
                    frame.format(), src_layout,  frame.rate(),
                    OUT_FMT,        OUT_LAYOUT,  OUT_RATE,
                )
                .map(|ctx| { *resampler = Some(ctx); })
                .map_err(|e| format!("create audio resampler: {e}"))
            }
        };
        made?;

        if let Some(rs) = resampler {
            let mut resampled = AudioFrame::empty();
            if rs.run(frame, &mut resampled).is_ok() && resampled.samples() > 0 {
                append_packed_f32(&resampled, out);
            }
        }
    } else {
        append_packed_f32(frame, out);
    }

    Ok(())
}

/// Copy the packed f32 samples from `frame` into `out`.
/// OUT_FMT is Packed (interleaved), so all channel data is in plane 0.
fn append_packed_f32(frame: &AudioFrame, out: &mut Vec<f32>) {
    let data = frame.data(0);
    out.extend(
        data.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
    );
}

/// Write interleaved stereo f32le PCM to a WAV file at `path`.
/// Returns total bytes written (header + data).
///
/// WAV layout:
///   RIFF  <file_size - 8>  WAVE
///   fmt   16  <format=3 IEEE_FLOAT>  <channels=2>  <rate=44100>
///             <byte_rate=352800>  <block_align=8>  <bits=32>
///   data  <data_size>  <samples…>
fn write_wav(path: &Path, samples: &[f32]) -> std::io::Result<u64> {
    const CHANNELS:     u16 = 2;
    const BITS:         u16 = 32;
    const FORMAT_FLOAT: u16 = 3;   // IEEE_FLOAT
    const BLOCK_ALIGN:  u16 = CHANNELS * (BITS / 8); // 8

    let data_size = (samples.len() * 4) as u32;
    let byte_rate = OUT_RATE * BLOCK_ALIGN as u32;

    let mut file = std::fs::File::create(path)?;
    let mut w    = std::io::BufWriter::new(&mut file);

    // RIFF header
    w.write_all(b"RIFF")?;
    w.write_all(&(36u32 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    // fmt  chunk
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;          // chunk size
    w.write_all(&FORMAT_FLOAT.to_le_bytes())?;
    w.write_all(&CHANNELS.to_le_bytes())?;
    w.write_all(&OUT_RATE.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&BLOCK_ALIGN.to_le_bytes())?;
    w.write_all(&BITS.to_le_bytes())?;

    // data chunk
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for s in samples {
        w.write_all(&s.to_le_bytes())?;
    }
    w.flush()?;

    Ok((44 + data_size) as u64)
}
