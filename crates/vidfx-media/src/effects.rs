// crates/vidfx-media/src/effects.rs
//
// Pixel effect transforms over a single `Frame`.
//
// `apply` is a total function: a transform that fails internally is logged
// and the input frame passes through unchanged, so one bad frame never
// interrupts playback or an export.
//
// EffectCache holds the size-dependent artifacts (currently only the
// vignette mask). It is owned by whoever drives the effect pipeline and is
// cleared wholesale when a new file loads.

use std::sync::OnceLock;

use rayon::prelude::*;

use vidfx_core::effect::EffectKind;

use crate::frame::{Channels, Frame};

// ── Cache ─────────────────────────────────────────────────────────────────────

/// Size-keyed precomputed artifacts for the active effect.
///
/// One entry per artifact kind is enough: only one effect is active at a
/// time, and a size change invalidates the old mask anyway.
#[derive(Default)]
pub struct EffectCache {
    /// Vignette attenuation mask, keyed by the (rows, cols) it was built for.
    vignette: Option<((u32, u32), Vec<f32>)>,
    /// How many times the vignette mask has been rebuilt. Test hook for the
    /// reuse invariant; also handy in logs.
    pub mask_builds: u64,
}

impl EffectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all cached artifacts. Called on file load.
    pub fn clear(&mut self) {
        self.vignette = None;
    }

    /// Return the vignette mask for `(rows, cols)`, rebuilding only when the
    /// size differs from the cached one.
    fn vignette_mask(&mut self, rows: u32, cols: u32) -> &[f32] {
        let stale = match &self.vignette {
            Some((key, _)) => *key != (rows, cols),
            None           => true,
        };
        if stale {
            self.vignette = Some(((rows, cols), build_vignette_mask(rows, cols)));
            self.mask_builds += 1;
        }
        match &self.vignette {
            Some((_, mask)) => mask,
            None            => unreachable!(),
        }
    }
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Apply `kind` to `frame`. `EffectKind::None` is a move-through with no
/// copy or allocation. Never fails outward: internal errors are logged and
/// the input frame is returned unchanged.
pub fn apply(kind: EffectKind, frame: Frame, cache: &mut EffectCache) -> Frame {
    if kind.is_none() {
        return frame;
    }
    match transform(kind, &frame, cache) {
        Ok(out) => out,
        Err(e) => {
            eprintln!("[effects] {kind} failed ({e}) — passing frame through");
            frame
        }
    }
}

fn transform(kind: EffectKind, frame: &Frame, cache: &mut EffectCache) -> Result<Frame, String> {
    match kind {
        EffectKind::None      => Ok(frame.clone()),
        EffectKind::Grayscale => Ok(grayscale(frame)),
        EffectKind::Negative  => Ok(negative(frame)),
        EffectKind::Sepia     => sepia(frame),
        EffectKind::Posterize => Ok(posterize(frame)),
        EffectKind::Vignette  => Ok(vignette(frame, cache)),
    }
}

// ── Transforms ────────────────────────────────────────────────────────────────

/// Luminance-weighted reduction to a single channel. Gray input is already
/// reduced and passes through.
fn grayscale(frame: &Frame) -> Frame {
    match frame.channels {
        Channels::Gray => frame.clone(),
        Channels::Rgb => {
            let data: Vec<u8> = frame.data.chunks_exact(3)
                .map(|px| {
                    let y = 0.299 * px[0] as f32
                          + 0.587 * px[1] as f32
                          + 0.114 * px[2] as f32;
                    y.round().min(255.0) as u8
                })
                .collect();
            Frame::new_gray(frame.width, frame.height, data)
        }
    }
}

/// Channel-wise `255 - v`, shape-preserving.
fn negative(frame: &Frame) -> Frame {
    let mut out = frame.clone();
    for v in &mut out.data {
        *v = 255 - *v;
    }
    out
}

/// Sepia color-matrix row vectors, applied to (R, G, B) per output channel.
const SEPIA_R: [f32; 3] = [0.393, 0.769, 0.189];
const SEPIA_G: [f32; 3] = [0.349, 0.686, 0.168];
const SEPIA_B: [f32; 3] = [0.272, 0.534, 0.131];

fn sepia(frame: &Frame) -> Result<Frame, String> {
    if frame.channels != Channels::Rgb {
        return Err("sepia requires a 3-channel frame".into());
    }
    let mut out = frame.clone();
    out.data.par_chunks_exact_mut(3).for_each(|px| {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        px[0] = (SEPIA_R[0] * r + SEPIA_R[1] * g + SEPIA_R[2] * b).clamp(0.0, 255.0) as u8;
        px[1] = (SEPIA_G[0] * r + SEPIA_G[1] * g + SEPIA_G[2] * b).clamp(0.0, 255.0) as u8;
        px[2] = (SEPIA_B[0] * r + SEPIA_B[1] * g + SEPIA_B[2] * b).clamp(0.0, 255.0) as u8;
    });
    Ok(out)
}

/// 256-entry posterize table: each value snapped to one of 5 evenly spaced
/// levels (step = 255/5 = 51). Shared across all channels and frames.
fn posterize_lut() -> &'static [u8; 256] {
    static LUT: OnceLock<[u8; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut lut = [0u8; 256];
        for (v, slot) in lut.iter_mut().enumerate() {
            *slot = ((v as f32 / 51.0).round() * 51.0) as u8;
        }
        lut
    })
}

fn posterize(frame: &Frame) -> Frame {
    let lut = posterize_lut();
    let mut out = frame.clone();
    for v in &mut out.data {
        *v = lut[*v as usize];
    }
    out
}

/// Radial attenuation mask: 1.0 at the center falling linearly to 0 at the
/// corner distance. Row-major, one f32 per pixel.
fn build_vignette_mask(rows: u32, cols: u32) -> Vec<f32> {
    let cy = rows as f32 / 2.0;
    let cx = cols as f32 / 2.0;
    let max_dist = (cy * cy + cx * cx).sqrt().max(f32::EPSILON);

    let mut mask = Vec::with_capacity(rows as usize * cols as usize);
    for r in 0..rows {
        for c in 0..cols {
            let dy = r as f32 - cy;
            let dx = c as f32 - cx;
            let dist = (dy * dy + dx * dx).sqrt();
            mask.push((1.0 - dist / max_dist).clamp(0.0, 1.0));
        }
    }
    mask
}

fn vignette(frame: &Frame, cache: &mut EffectCache) -> Frame {
    let mask = cache.vignette_mask(frame.height, frame.width);
    let ch = frame.channels.count();
    let mut out = frame.clone();
    out.data.par_chunks_exact_mut(ch)
        .zip(mask.par_iter())
        .for_each(|(px, &m)| {
            for v in px {
                *v = (*v as f32 * m) as u8;
            }
        });
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(w: u32, h: u32, fill: u8) -> Frame {
        Frame::new_rgb(w, h, vec![fill; w as usize * h as usize * 3])
    }

    #[test]
    fn none_is_move_through() {
        let f = rgb_frame(4, 4, 128);
        let ptr = f.data.as_ptr();
        let mut cache = EffectCache::new();
        let out = apply(EffectKind::None, f, &mut cache);
        assert_eq!(out.data.as_ptr(), ptr);
    }

    #[test]
    fn grayscale_reduces_to_one_channel() {
        let f = Frame::new_rgb(1, 1, vec![255, 0, 0]);
        let mut cache = EffectCache::new();
        let out = apply(EffectKind::Grayscale, f, &mut cache);
        assert_eq!(out.channels, Channels::Gray);
        assert_eq!(out.data, vec![76]); // 0.299 * 255, rounded
    }

    #[test]
    fn negative_inverts() {
        let f = Frame::new_rgb(1, 1, vec![0, 100, 255]);
        let mut cache = EffectCache::new();
        let out = apply(EffectKind::Negative, f, &mut cache);
        assert_eq!(out.data, vec![255, 155, 0]);
    }

    #[test]
    fn sepia_clamps_extremes() {
        let mut cache = EffectCache::new();
        // All-255 input overflows every row sum; all channels must clamp to 255.
        let white = apply(EffectKind::Sepia, rgb_frame(2, 2, 255), &mut cache);
        assert!(white.data.iter().all(|&v| v == 255));
        let black = apply(EffectKind::Sepia, rgb_frame(2, 2, 0), &mut cache);
        assert!(black.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn sepia_on_gray_passes_through() {
        let f = Frame::new_gray(2, 2, vec![9; 4]);
        let mut cache = EffectCache::new();
        let out = apply(EffectKind::Sepia, f.clone(), &mut cache);
        assert_eq!(out, f);
    }

    #[test]
    fn posterize_levels_and_idempotence() {
        let levels = [0u8, 51, 102, 153, 204, 255];
        let input: Vec<u8> = (0..=255u8).collect();
        let f = Frame::new_gray(256, 1, input);
        let mut cache = EffectCache::new();
        let once = apply(EffectKind::Posterize, f, &mut cache);
        assert!(once.data.iter().all(|v| levels.contains(v)));
        let twice = apply(EffectKind::Posterize, once.clone(), &mut cache);
        assert_eq!(twice.data, once.data);
    }

    #[test]
    fn vignette_mask_reused_for_same_size() {
        let mut cache = EffectCache::new();
        let _ = apply(EffectKind::Vignette, rgb_frame(8, 6, 200), &mut cache);
        assert_eq!(cache.mask_builds, 1);
        let _ = apply(EffectKind::Vignette, rgb_frame(8, 6, 10), &mut cache);
        assert_eq!(cache.mask_builds, 1);
        // Size change forces a rebuild.
        let _ = apply(EffectKind::Vignette, rgb_frame(6, 8, 10), &mut cache);
        assert_eq!(cache.mask_builds, 2);
        // And clearing the cache does too.
        cache.clear();
        let _ = apply(EffectKind::Vignette, rgb_frame(6, 8, 10), &mut cache);
        assert_eq!(cache.mask_builds, 3);
    }

    #[test]
    fn vignette_darkens_corners_keeps_center() {
        let f = rgb_frame(9, 9, 200);
        let mut cache = EffectCache::new();
        let out = apply(EffectKind::Vignette, f, &mut cache);
        // Center pixel keeps most of its value; the corner loses nearly all.
        let center = (4 * 9 + 4) * 3;
        assert!(out.data[center] > 160);
        assert!(out.data[0] < 40);
    }
}
