/// PPU memory: VRAM, CGRAM and OAM.
pub const VRAM_SIZE: usize = 64 * 1024;
pub const CGRAM_SIZE: usize = 512;
pub const OAM_SIZE: usize = 544;

#[derive(Debug, Clone)]
pub struct VideoMemory {
    pub vram: Vec<u8>,
    pub cgram: Vec<u8>,
    pub oam: Vec<u8>,
}

impl Default for VideoMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoMemory {
    pub fn new() -> Self {
        Self {
            vram: vec![0; VRAM_SIZE],
            cgram: vec![0; CGRAM_SIZE],
            oam: vec![0; OAM_SIZE],
        }
    }

    /// `word` is a 15-bit VRAM word address.
    pub fn read_vram_word(&self, word: u16) -> u16 {
        let i = (word as usize & 0x7FFF) << 1;
        u16::from_le_bytes([self.vram[i], self.vram[i + 1]])
    }

    pub fn write_vram_byte(&mut self, word: u16, high: bool, value: u8) {
        let i = ((word as usize & 0x7FFF) << 1) | high as usize;
        self.vram[i] = value;
    }

    /// BGR555 color for palette entry `index`.
    pub fn color(&self, index: u8) -> u16 {
        let i = (index as usize) << 1;
        u16::from_le_bytes([self.cgram[i], self.cgram[i + 1]]) & 0x7FFF
    }

    /// `addr` is the 10-bit OAM byte address; the high table repeats every 32
    /// bytes above $200.
    pub fn oam_index(addr: u16) -> usize {
        let addr = addr as usize & 0x3FF;
        if addr >= 0x200 {
            0x200 | (addr & 0x1F)
        } else {
            addr
        }
    }
}

/// VMAIN address translation (bits 2-3). Rotates the low bits so 2bpp, 4bpp
/// and 8bpp tile rows can be written with a 32-word stride.
pub fn remap_vram_address(addr: u16, mode: u8) -> u16 {
    match mode & 3 {
        1 => (addr & 0xFF00) | ((addr & 0x1F) << 3) | ((addr >> 5) & 7),
        2 => (addr & 0xFE00) | ((addr & 0x3F) << 3) | ((addr >> 6) & 7),
        3 => (addr & 0xFC00) | ((addr & 0x7F) << 3) | ((addr >> 7) & 7),
        _ => addr,
    }
}

/// VMAIN bits 0-1.
pub fn vram_increment(vmain: u8) -> u16 {
    [1, 32, 128, 128][(vmain & 3) as usize]
}
