// crates/vidfx-media/src/decode.rs
//
// VideoSource: stateful per-file decoder used by both the playback engine
// (batch reads scaled to the display) and the export pipeline (full-size
// sequential reads). Avoids re-open/seek on every frame: sequential reads
// reuse the open demuxer, and only a backward jump forces a re-open.

use std::path::{Path, PathBuf};

use anyhow::Result;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};

use crate::engine::FrameSource;
use crate::frame::Frame;

pub struct VideoSource {
    pub path:     PathBuf,
    ictx:         ffmpeg::format::context::Input,
    decoder:      ffmpeg::decoder::video::Video,
    video_idx:    usize,
    tb_num:       i32,
    tb_den:       i32,
    fps_num:      u32,
    fps_den:      u32,
    total:        u64,
    src_w:        u32,
    src_h:        u32,
    /// Index the next sequential decode is expected to produce.
    next_idx:     u64,
    /// Scaler cached per output size; rebuilt when the target changes.
    scaler:       Option<(u32, u32, SwsContext)>,
}

impl VideoSource {
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init()?;
        let ictx = input(&path)?;
        let video_idx = ictx.streams().best(Type::Video)
            .ok_or_else(|| anyhow::anyhow!("no video stream in '{}'", path.display()))?
            .index();

        let (tb_num, tb_den, fps_num, fps_den, stream_frames, stream_dur) = {
            let stream = ictx.stream(video_idx)
                .ok_or_else(|| anyhow::anyhow!("video stream vanished"))?;
            let tb  = stream.time_base();
            let fr  = stream.avg_frame_rate();
            let (num, den) = if fr.numerator() > 0 && fr.denominator() > 0 {
                (fr.numerator() as u32, fr.denominator() as u32)
            } else {
                (30, 1)
            };
            (
                tb.numerator(), tb.denominator(),
                num, den,
                stream.frames().max(0) as u64,
                stream.duration(),
            )
        };

        // Second context for decoder params (avoids borrow conflict with ictx).
        let ictx2   = input(&path)?;
        let stream2 = ictx2.stream(video_idx)
            .ok_or_else(|| anyhow::anyhow!("video stream vanished"))?;
        let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream2.parameters())?;
        let decoder = dec_ctx.decoder().video()?;

        let fps = fps_num as f64 / fps_den as f64;

        // nb_frames is absent from some containers; estimate from duration.
        let total = if stream_frames > 0 {
            stream_frames
        } else if stream_dur > 0 {
            let secs = stream_dur as f64 * tb_num as f64 / tb_den as f64;
            (secs * fps).round() as u64
        } else {
            let secs = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
            (secs.max(0.0) * fps).round() as u64
        };

        let (src_w, src_h) = (decoder.width(), decoder.height());
        if src_w == 0 || src_h == 0 {
            anyhow::bail!("zero-sized video in '{}'", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            ictx, decoder, video_idx,
            tb_num, tb_den, fps_num, fps_den,
            total, src_w, src_h,
            next_idx: 0,
            scaler: None,
        })
    }

    pub fn fps_rational(&self) -> (u32, u32) {
        (self.fps_num, self.fps_den)
    }

    pub fn width(&self)  -> u32 { self.src_w }
    pub fn height(&self) -> u32 { self.src_h }

    /// Position the demuxer so the next sequential decode yields `idx`.
    /// Backward jumps re-open the input; forward jumps within the stream
    /// just decode through (the packet loop discards pre-target frames).
    fn seek_to_frame(&mut self, idx: u64) -> Result<()> {
        if idx < self.next_idx {
            let mut ictx = input(&self.path)?;
            let secs    = idx as f64 / self.fps();
            let seek_ts = (secs * self.tb_den as f64 / self.tb_num as f64) as i64;
            // Backward-bounded seek lands on the nearest preceding keyframe.
            let _ = ictx.seek(seek_ts, ..=seek_ts);

            let ictx2   = input(&self.path)?;
            let stream2 = ictx2.stream(self.video_idx)
                .ok_or_else(|| anyhow::anyhow!("video stream vanished"))?;
            let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream2.parameters())?;
            self.decoder = dec_ctx.decoder().video()?;
            self.ictx    = ictx;
            // The keyframe we landed on is at or before idx; the caller's
            // decode loop skips forward to the exact frame.
            self.next_idx = 0;
        }
        Ok(())
    }

    /// Decode the next frame, scaled to `out_w`×`out_h` packed RGB.
    /// Returns `(frame_index, frame)` or None at EOF.
    pub fn next_frame_scaled(&mut self, out_w: u32, out_h: u32) -> Option<(u64, Frame)> {
        let rebuild = match &self.scaler {
            Some((w, h, _)) => (*w, *h) != (out_w, out_h),
            None            => true,
        };
        if rebuild {
            let sc = SwsContext::get(
                self.decoder.format(), self.src_w, self.src_h,
                Pixel::RGB24, out_w, out_h, Flags::BILINEAR,
            ).ok()?;
            self.scaler = Some((out_w, out_h, sc));
        }

        // Locals so no &self method call overlaps the packet iterator's
        // borrow of ictx.
        let fps       = self.fps();
        let tb_num    = self.tb_num;
        let tb_den    = self.tb_den;
        let video_idx = self.video_idx;

        for (stream, packet) in self.ictx.packets().flatten() {
            if stream.index() != video_idx { continue; }
            if self.decoder.send_packet(&packet).is_err() { continue; }
            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let idx = match decoded.pts() {
                    Some(pts) => {
                        let secs = pts as f64 * tb_num as f64 / tb_den as f64;
                        (secs * fps).round().max(0.0) as u64
                    }
                    None => self.next_idx,
                };
                self.next_idx = idx + 1;

                let (_, _, scaler) = self.scaler.as_mut()?;
                let mut out = ffmpeg::util::frame::video::Video::empty();
                if scaler.run(&decoded, &mut out).is_err() { return None; }
                let stride = out.stride(0);
                let raw    = out.data(0);
                let data: Vec<u8> = (0..out_h as usize)
                    .flat_map(|row| {
                        let s = row * stride;
                        &raw[s..s + out_w as usize * 3]
                    })
                    .copied()
                    .collect();
                return Some((idx, Frame::new_rgb(out_w, out_h, data)));
            }
        }
        None
    }
}

impl FrameSource for VideoSource {
    fn fps(&self) -> f64 {
        self.fps_num as f64 / self.fps_den.max(1) as f64
    }

    fn total_frames(&self) -> u64 {
        self.total
    }

    fn natural_size(&self) -> (u32, u32) {
        (self.src_w, self.src_h)
    }

    /// Decode `count` frames starting at `start`, scaled to the given size.
    /// May return fewer frames near EOF.
    fn read_batch(&mut self, start: u64, count: usize, out_w: u32, out_h: u32) -> Result<Vec<Frame>> {
        self.seek_to_frame(start)?;
        let mut frames = Vec::with_capacity(count);
        while frames.len() < count {
            match self.next_frame_scaled(out_w, out_h) {
                Some((idx, frame)) => {
                    // Discard pre-target frames from the keyframe-aligned seek.
                    if idx < start { continue; }
                    frames.push(frame);
                }
                None => break,
            }
        }
        Ok(frames)
    }
}
