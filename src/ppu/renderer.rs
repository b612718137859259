use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Ppu, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::error::Result;

/// Produces one scanline of BGR555 pixels from the PPU state.
pub trait ScanlineRenderer {
    /// `line` is 0-based within the visible area; `out` is 256 pixels.
    fn render_line(&mut self, ppu: &Ppu, line: u16, out: &mut [u16]);
}

/// Fills every line with palette entry 0, the backdrop color.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackdropRenderer;

impl ScanlineRenderer for BackdropRenderer {
    fn render_line(&mut self, ppu: &Ppu, _line: u16, out: &mut [u16]) {
        let color = apply_brightness(ppu.mem.color(0), ppu.brightness());
        out.fill(color);
    }
}

/// Scales each 5-bit channel by INIDISP brightness (15 = unchanged).
pub fn apply_brightness(color: u16, brightness: u8) -> u16 {
    if brightness >= 15 {
        return color;
    }
    let scale = brightness as u16 + 1;
    let r = (color & 0x1F) * scale / 16;
    let g = ((color >> 5) & 0x1F) * scale / 16;
    let b = ((color >> 10) & 0x1F) * scale / 16;
    (b << 10) | (g << 5) | r
}

/// Serialized framebuffer used for golden-image comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCapture {
    pub width: u16,
    pub height: u16,
    pub frame: u64,
    pub pixels: Vec<u16>,
}

impl FrameCapture {
    pub fn new(frame: u64, pixels: &[u16]) -> Self {
        Self {
            width: SCREEN_WIDTH as u16,
            height: SCREEN_HEIGHT as u16,
            frame,
            pixels: pixels.to_vec(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// Index of the first differing pixel, if any.
    pub fn first_mismatch(&self, pixels: &[u16]) -> Option<usize> {
        if self.pixels.len() != pixels.len() {
            return Some(self.pixels.len().min(pixels.len()));
        }
        self.pixels.iter().zip(pixels).position(|(a, b)| a != b)
    }
}
