// src/main.rs
//
// vidfx CLI: effect playback and export without a windowing toolkit.
// The export loop is the same host-side pattern a GUI would use — enqueue,
// then drain ExportQueue::poll() on every tick.

mod paths;

use std::collections::HashMap;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use vidfx_core::effect::EffectKind;
use vidfx_core::helpers::time::{format_clock, format_duration};
use vidfx_media::engine::{FrameEngine, FrameSource};
use vidfx_media::export::ExportQueue;
use vidfx_media::remux::RemuxConfig;
use vidfx_media::{ExportUpdate, VideoSource};

#[derive(Parser)]
#[command(name = "vidfx", about = "Video effect playback and export", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode one or more videos with a pixel effect, keeping the
    /// original audio when the external transcoder is available.
    Export {
        /// Source video file(s); each becomes one queued job.
        inputs: Vec<PathBuf>,
        /// Effect to apply (see `vidfx effects`).
        #[arg(short, long)]
        effect: EffectKind,
        /// Output directory for finished exports.
        #[arg(long, default_value_os_t = paths::default_exports_dir())]
        out_dir: PathBuf,
        /// External transcoder binary used for the audio remux.
        #[arg(long, default_value = "ffmpeg")]
        ffmpeg: String,
    },
    /// Print stream parameters for a video file.
    Probe {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List the available effects.
    Effects {
        #[arg(long)]
        json: bool,
    },
    /// Decode and effect-process a file in real time, reporting the
    /// measured frame rate. Headless dry run of the playback engine.
    Play {
        input: PathBuf,
        #[arg(short, long, default_value = "none")]
        effect: EffectKind,
        /// Display-area size the frames are scaled into.
        #[arg(long, default_value_t = 960)]
        width: u32,
        #[arg(long, default_value_t = 540)]
        height: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Export { inputs, effect, out_dir, ffmpeg } => {
            run_export(&inputs, effect, &out_dir, ffmpeg)
        }
        Command::Probe { input, json } => run_probe(&input, json),
        Command::Effects { json }      => run_effects(json),
        Command::Play { input, effect, width, height } => {
            run_play(&input, effect, width, height)
        }
    }
}

// ── export ────────────────────────────────────────────────────────────────────

fn run_export(
    inputs:  &[PathBuf],
    effect:  EffectKind,
    out_dir: &PathBuf,
    ffmpeg:  String,
) -> Result<()> {
    if inputs.is_empty() {
        bail!("no input files given");
    }
    if effect.is_none() {
        bail!("pick an effect to export with (see `vidfx effects`)");
    }

    let cfg = RemuxConfig { ffmpeg_bin: ffmpeg };
    let mut queue = ExportQueue::new(out_dir, cfg)?;

    let mut names: HashMap<Uuid, String> = HashMap::new();
    for input in inputs {
        match queue.enqueue(input, effect) {
            Some(id) => {
                let name = input.file_name().unwrap_or_default()
                    .to_string_lossy().into_owned();
                println!("queued  {name}");
                names.insert(id, name);
            }
            None => println!("skipped {} (duplicate)", input.display()),
        }
    }

    while !queue.is_idle() {
        for update in queue.poll() {
            match update {
                ExportUpdate::Progress { job_id, percent } => {
                    if let Some(name) = names.get(&job_id) {
                        print!("\r{name}: {percent}%  ");
                        use std::io::Write;
                        let _ = std::io::stdout().flush();
                    }
                }
                ExportUpdate::Status { job_id, status } => {
                    if status.is_terminal() {
                        if let Some(name) = names.get(&job_id) {
                            println!("\r{name}: {}        ", status.label());
                        }
                    }
                }
            }
        }
        thread::sleep(Duration::from_millis(50));
    }
    Ok(())
}

// ── probe ─────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ProbeReport {
    path:         PathBuf,
    width:        u32,
    height:       u32,
    fps:          f64,
    total_frames: u64,
    duration_ms:  u64,
}

fn run_probe(input: &PathBuf, json: bool) -> Result<()> {
    let source = VideoSource::open(input)?;
    let (width, height) = source.natural_size();
    let fps = source.fps();
    let total_frames = source.total_frames();
    let duration_ms = if fps > 0.0 {
        (total_frames as f64 * 1000.0 / fps) as u64
    } else {
        0
    };

    let report = ProbeReport {
        path: input.clone(),
        width, height, fps, total_frames, duration_ms,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.path.display());
        println!("  size:     {}x{}", report.width, report.height);
        println!("  fps:      {:.3}", report.fps);
        println!("  frames:   {}", report.total_frames);
        println!("  duration: {}", format_duration(report.duration_ms as f64 / 1000.0));
    }
    Ok(())
}

// ── effects ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EffectEntry {
    id:    EffectKind,
    label: &'static str,
}

fn run_effects(json: bool) -> Result<()> {
    let entries: Vec<EffectEntry> = EffectKind::ALL.into_iter()
        .map(|kind| EffectEntry { id: kind, label: kind.label() })
        .collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{:<10} {}", entry.id.id(), entry.label);
        }
    }
    Ok(())
}

// ── play ──────────────────────────────────────────────────────────────────────

fn run_play(input: &PathBuf, effect: EffectKind, width: u32, height: u32) -> Result<()> {
    let mut engine = FrameEngine::load(input, width, height)?;
    engine.set_effect(effect);
    engine.reload_buffer()?;

    let duration = engine.duration_ms();
    println!(
        "playing {} ({} frames @ {:.2} fps, effect: {})",
        input.display(),
        engine.total_frames(),
        engine.fps(),
        effect.id(),
    );

    engine.start();
    let mut last_report = Instant::now();
    loop {
        if engine.next_frame()?.is_none() {
            break;
        }
        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            println!(
                "  {} / {}  ({:.1} fps)",
                format_clock(engine.current_position_ms() as i64),
                format_clock(duration as i64),
                engine.measured_fps(),
            );
        }
        thread::sleep(Duration::from_millis(engine.next_delay_ms()));
    }
    engine.stop();
    println!("done");
    Ok(())
}
