// crates/vidfx-media/src/encode.rs
//
// SilentEncoder: single-stream MP4 video encode used by the export
// pipeline. Audio is deliberately absent — the remux step re-attaches the
// original track afterwards.
//
// Stream layout in the output MP4:
//   Stream 0 — MPEG-4 part 2 video (YUV420P), always built into libavcodec
//              so exports work without an optional x264 build.
//
// PTS strategy: monotonically increasing frame counter in units of
// fps_den/fps_num; no source timestamps survive into the output.
//
// Errors are Strings: every failure on this path ends up verbatim in a
// job's Failed status message.

use std::path::{Path, PathBuf};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::{output as open_output, Pixel};
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use crate::frame::{Channels, Frame};

pub struct SilentEncoder {
    octx:      ffmpeg::format::context::Output,
    encoder:   ffmpeg::encoder::Video,
    scaler:    ScaleCtx,
    /// Source frame dimensions accepted by `write_frame`.
    src_w:     u32,
    src_h:     u32,
    /// Encoded dimensions (source aligned down to even for YUV420P).
    enc_w:     u32,
    enc_h:     u32,
    frame_tb:  Rational,
    ost_tb:    Rational,
    frame_idx: i64,
    path:      PathBuf,
}

impl SilentEncoder {
    /// Open `path` for writing and set up a video-only encode at the given
    /// resolution and frame rate.
    pub fn create(
        path:    &Path,
        width:   u32,
        height:  u32,
        fps_num: u32,
        fps_den: u32,
    ) -> Result<Self, String> {
        ffmpeg::init().map_err(|e| format!("ffmpeg init: {e}"))?;

        if width == 0 || height == 0 {
            return Err(format!("invalid output size {width}x{height}"));
        }
        if fps_num == 0 || fps_den == 0 {
            return Err(format!("invalid frame rate {fps_num}/{fps_den}"));
        }

        // YUV420P needs even dimensions; align down.
        let enc_w = (width & !1).max(2);
        let enc_h = (height & !1).max(2);

        let mut octx = open_output(&path)
            .map_err(|e| format!("could not open output '{}': {e}", path.display()))?;

        let frame_tb = Rational::new(fps_den as i32, fps_num as i32);

        let mpeg4 = encoder::find(CodecId::MPEG4)
            .ok_or_else(|| "MPEG-4 encoder not found".to_string())?;

        let mut ost = octx.add_stream(mpeg4)
            .map_err(|e| format!("add video stream: {e}"))?;
        ost.set_time_base(frame_tb);

        let enc_ctx = codec::context::Context::new_with_codec(mpeg4);
        let mut video_enc = enc_ctx.encoder().video()
            .map_err(|e| format!("create video encoder context: {e}"))?;

        video_enc.set_width(enc_w);
        video_enc.set_height(enc_h);
        video_enc.set_format(Pixel::YUV420P);
        video_enc.set_time_base(frame_tb);
        video_enc.set_frame_rate(Some(Rational::new(fps_num as i32, fps_den as i32)));
        video_enc.set_bit_rate(((enc_w * enc_h * 8) as usize).max(1_000_000));

        let mut video_encoder = video_enc.open_as_with(mpeg4, ffmpeg::Dictionary::new())
            .map_err(|e| format!("open MPEG-4 encoder: {e}"))?;

        video_encoder.set_aspect_ratio(Rational::new(1, 1));

        // Copy encoder params into the stream's codecpar so the muxer has
        // resolution, format, and codec-private data. set_parameters()
        // requires AsPtr<AVCodecParameters>, which encoder::Video does not
        // implement, so go through FFI.
        unsafe {
            let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                (**(*octx.as_mut_ptr()).streams.add(0)).codecpar,
                video_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
            );
            if ret < 0 {
                return Err(format!("avcodec_parameters_from_context failed: {ret}"));
            }
        }

        octx.write_header()
            .map_err(|e| format!("write output header: {e}"))?;

        let ost_tb = octx.stream(0)
            .map(|s| s.time_base())
            .unwrap_or(frame_tb);

        let scaler = ScaleCtx::get(
            Pixel::RGB24, width, height,
            Pixel::YUV420P, enc_w, enc_h,
            ScaleFlags::BILINEAR,
        ).map_err(|e| format!("create swscale context: {e}"))?;

        Ok(Self {
            octx,
            encoder: video_encoder,
            scaler,
            src_w: width,
            src_h: height,
            enc_w,
            enc_h,
            frame_tb,
            ost_tb,
            frame_idx: 0,
            path: path.to_path_buf(),
        })
    }

    pub fn width(&self)  -> u32 { self.enc_w }
    pub fn height(&self) -> u32 { self.enc_h }

    /// Encode one frame. Gray frames are expanded to RGB first; dimensions
    /// must match the size given at `create`.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), String> {
        if (frame.width, frame.height) != (self.src_w, self.src_h) {
            return Err(format!(
                "frame size {}x{} does not match encoder {}x{}",
                frame.width, frame.height, self.src_w, self.src_h,
            ));
        }

        let expanded;
        let rgb: &Frame = match frame.channels {
            Channels::Rgb  => frame,
            Channels::Gray => {
                expanded = frame.clone().into_rgb();
                &expanded
            }
        };

        // Pack our tight rows into an AVFrame, honoring its stride.
        let mut src = VideoFrame::new(Pixel::RGB24, self.src_w, self.src_h);
        {
            let stride = src.stride(0);
            let row_bytes = self.src_w as usize * 3;
            let dst = src.data_mut(0);
            for row in 0..self.src_h as usize {
                dst[row * stride..row * stride + row_bytes]
                    .copy_from_slice(&rgb.data[row * row_bytes..(row + 1) * row_bytes]);
            }
        }

        let mut yuv = VideoFrame::empty();
        self.scaler.run(&src, &mut yuv)
            .map_err(|e| format!("scale frame to YUV420P: {e}"))?;
        yuv.set_pts(Some(self.frame_idx));
        unsafe {
            (*yuv.as_mut_ptr()).sample_aspect_ratio =
                ffmpeg::ffi::AVRational { num: 1, den: 1 };
        }

        self.encoder.send_frame(&yuv)
            .map_err(|e| format!("send frame to encoder: {e}"))?;
        self.drain_packets()?;

        self.frame_idx += 1;
        Ok(())
    }

    fn drain_packets(&mut self) -> Result<(), String> {
        let mut pkt = Packet::empty();
        while self.encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(0);
            pkt.rescale_ts(self.frame_tb, self.ost_tb);
            pkt.write_interleaved(&mut self.octx)
                .map_err(|e| format!("write video packet: {e}"))?;
        }
        Ok(())
    }

    /// Flush the encoder and finalize the container.
    pub fn finish(mut self) -> Result<(), String> {
        self.encoder.send_eof()
            .map_err(|e| format!("send EOF to encoder: {e}"))?;
        self.drain_packets()?;
        self.octx.write_trailer()
            .map_err(|e| format!("write trailer: {e}"))?;
        eprintln!("[encode] silent video finished → {}", self.path.display());
        Ok(())
    }
}
