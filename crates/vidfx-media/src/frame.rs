// crates/vidfx-media/src/frame.rs
//
// Owned 8-bit image buffer shared by the playback engine, the effect
// library, and the export encoder. Rows are packed tightly (no stride).

/// Channel layout of a `Frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    /// Single luminance plane, 1 byte per pixel.
    Gray,
    /// Interleaved RGB, 3 bytes per pixel.
    Rgb,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Gray => 1,
            Channels::Rgb  => 3,
        }
    }
}

/// One decoded, tightly-packed image.
///
/// Invariant: `data.len() == width * height * channels.count()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width:    u32,
    pub height:   u32,
    pub channels: Channels,
    pub data:     Vec<u8>,
}

impl Frame {
    pub fn new_rgb(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self { width, height, channels: Channels::Rgb, data }
    }

    pub fn new_gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self { width, height, channels: Channels::Gray, data }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Expand to interleaved RGB. Gray frames replicate the luminance byte
    /// into all three channels; RGB frames pass through unchanged.
    pub fn into_rgb(self) -> Frame {
        match self.channels {
            Channels::Rgb  => self,
            Channels::Gray => {
                let mut rgb = Vec::with_capacity(self.data.len() * 3);
                for &v in &self.data {
                    rgb.extend_from_slice(&[v, v, v]);
                }
                Frame::new_rgb(self.width, self.height, rgb)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_expands_to_rgb() {
        let f = Frame::new_gray(2, 1, vec![10, 200]);
        let rgb = f.into_rgb();
        assert_eq!(rgb.channels, Channels::Rgb);
        assert_eq!(rgb.data, vec![10, 10, 10, 200, 200, 200]);
    }

    #[test]
    fn rgb_passthrough() {
        let f = Frame::new_rgb(1, 1, vec![1, 2, 3]);
        let same = f.clone().into_rgb();
        assert_eq!(same, f);
    }
}
