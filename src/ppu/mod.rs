//! Picture processing unit: register ports at $2100-$213F, video memory and
//! the dot/scanline timing model.
//!
//! Pixel composition is not done here. At each visible hblank the bus hands
//! the PPU to a [`renderer::ScanlineRenderer`], which reads whatever state it
//! needs from the raw register file and video memory.

pub mod memory;
pub mod renderer;
pub mod timing;

#[cfg(test)]
mod tests;

use bitflags::bitflags;
use std::fmt;

pub use memory::VideoMemory;
pub use timing::{DotEvents, VideoTiming};

bitflags! {
    /// INIDISP ($2100).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisplayControl: u8 {
        const BRIGHTNESS   = 0b0000_1111;
        const FORCED_BLANK = 0b1000_0000;
    }
}

bitflags! {
    /// VMAIN ($2115).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VramControl: u8 {
        const STEP          = 0b0000_0011;
        const REMAP         = 0b0000_1100;
        const INC_ON_HIGH   = 0b1000_0000;
    }
}

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 224;

pub struct Ppu {
    pub timing: VideoTiming,
    pub mem: VideoMemory,
    /// Last value written to each of $2100-$213F.
    pub regs: [u8; 0x40],
    pub display: DisplayControl,
    vmain: VramControl,

    oam_reload: u16,
    oam_addr: u16,
    oam_latch: u8,

    vram_addr: u16,
    vram_prefetch: u16,

    cg_addr: u8,
    cg_high: bool,
    cg_latch: u8,

    m7_latch: u8,
    m7a: u16,
    m7b: u16,

    ophct: u16,
    opvct: u16,
    ophct_high: bool,
    opvct_high: bool,
    counters_latched: bool,

    pub ppu1_mdr: u8,
    pub ppu2_mdr: u8,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            timing: VideoTiming::default(),
            mem: VideoMemory::new(),
            regs: [0; 0x40],
            display: DisplayControl::FORCED_BLANK,
            vmain: VramControl::empty(),
            oam_reload: 0,
            oam_addr: 0,
            oam_latch: 0,
            vram_addr: 0,
            vram_prefetch: 0,
            cg_addr: 0,
            cg_high: false,
            cg_latch: 0,
            m7_latch: 0,
            m7a: 0,
            m7b: 0,
            ophct: 0,
            opvct: 0,
            ophct_high: false,
            opvct_high: false,
            counters_latched: false,
            ppu1_mdr: 0,
            ppu2_mdr: 0,
        }
    }

    /// Register state back to power-on; video memory is left alone.
    pub fn reset(&mut self, init_cycles: u64) {
        let mem = std::mem::take(&mut self.mem);
        *self = Self { mem, ..Self::new() };
        self.timing.reset(init_cycles);
    }

    pub fn forced_blank(&self) -> bool {
        self.display.contains(DisplayControl::FORCED_BLANK)
    }

    pub fn brightness(&self) -> u8 {
        (self.display & DisplayControl::BRIGHTNESS).bits()
    }

    /// Start of vblank: OAMADD is copied back into the internal address.
    pub fn reload_oam_address(&mut self) {
        self.oam_addr = self.oam_reload << 1;
    }

    /// SLHV or a WRIO bit 7 falling edge.
    pub fn latch_counters(&mut self) {
        self.ophct = self.timing.hcount;
        self.opvct = self.timing.vcount;
        self.counters_latched = true;
    }

    fn vram_word_address(&self) -> u16 {
        memory::remap_vram_address(self.vram_addr, (self.vmain & VramControl::REMAP).bits() >> 2)
            & 0x7FFF
    }

    fn step_vram(&mut self) {
        let step = memory::vram_increment(self.vmain.bits());
        self.vram_addr = self.vram_addr.wrapping_add(step) & 0x7FFF;
    }

    fn prefetch_vram(&mut self) {
        self.vram_prefetch = self.mem.read_vram_word(self.vram_word_address());
    }

    fn mode7_product(&self) -> u32 {
        let a = self.m7a as i16 as i32;
        let b = (self.m7b >> 8) as i8 as i32;
        (a * b) as u32 & 0xFF_FFFF
    }

    /// `reg` is the address minus $2100. Write-only registers answer with
    /// the PPU1 latch when they sit on PPU1's data lines, otherwise with
    /// the CPU open bus value.
    pub fn read(&mut self, reg: u16, open_bus: u8) -> u8 {
        match reg & 0x3F {
            0x04..=0x06 | 0x08..=0x0A | 0x14..=0x16 | 0x18..=0x1A | 0x24..=0x26 | 0x28..=0x2A => {
                self.ppu1_mdr
            }
            0x34 => {
                self.ppu1_mdr = self.mode7_product() as u8;
                self.ppu1_mdr
            }
            0x35 => {
                self.ppu1_mdr = (self.mode7_product() >> 8) as u8;
                self.ppu1_mdr
            }
            0x36 => {
                self.ppu1_mdr = (self.mode7_product() >> 16) as u8;
                self.ppu1_mdr
            }
            0x38 => {
                self.ppu1_mdr = self.mem.oam[VideoMemory::oam_index(self.oam_addr)];
                self.oam_addr = (self.oam_addr + 1) & 0x3FF;
                self.ppu1_mdr
            }
            0x39 => {
                self.ppu1_mdr = self.vram_prefetch as u8;
                if !self.vmain.contains(VramControl::INC_ON_HIGH) {
                    self.prefetch_vram();
                    self.step_vram();
                }
                self.ppu1_mdr
            }
            0x3A => {
                self.ppu1_mdr = (self.vram_prefetch >> 8) as u8;
                if self.vmain.contains(VramControl::INC_ON_HIGH) {
                    self.prefetch_vram();
                    self.step_vram();
                }
                self.ppu1_mdr
            }
            0x3B => {
                let i = (self.cg_addr as usize) << 1;
                if !self.cg_high {
                    self.ppu2_mdr = self.mem.cgram[i];
                } else {
                    self.ppu2_mdr = (self.ppu2_mdr & 0x80) | (self.mem.cgram[i + 1] & 0x7F);
                    self.cg_addr = self.cg_addr.wrapping_add(1);
                }
                self.cg_high = !self.cg_high;
                self.ppu2_mdr
            }
            0x3C => {
                self.ppu2_mdr = if self.ophct_high {
                    (self.ppu2_mdr & 0xFE) | ((self.ophct >> 8) as u8 & 1)
                } else {
                    self.ophct as u8
                };
                self.ophct_high = !self.ophct_high;
                self.ppu2_mdr
            }
            0x3D => {
                self.ppu2_mdr = if self.opvct_high {
                    (self.ppu2_mdr & 0xFE) | ((self.opvct >> 8) as u8 & 1)
                } else {
                    self.opvct as u8
                };
                self.opvct_high = !self.opvct_high;
                self.ppu2_mdr
            }
            0x3E => {
                // PPU1 version 1, no range/time overflow
                self.ppu1_mdr = (self.ppu1_mdr & 0x10) | 0x01;
                self.ppu1_mdr
            }
            0x3F => {
                let mut value = (self.ppu2_mdr & 0x20) | 0x03;
                if self.counters_latched {
                    value |= 0x40;
                }
                if self.timing.interlace_field {
                    value |= 0x80;
                }
                self.counters_latched = false;
                self.ophct_high = false;
                self.opvct_high = false;
                self.ppu2_mdr = value;
                value
            }
            _ => open_bus,
        }
    }

    pub fn write(&mut self, reg: u16, value: u8) {
        let reg = reg & 0x3F;
        self.regs[reg as usize] = value;
        match reg {
            0x00 => self.display = DisplayControl::from_bits_retain(value & 0x8F),
            0x02 => {
                self.oam_reload = (self.oam_reload & 0x100) | value as u16;
                self.reload_oam_address();
            }
            0x03 => {
                self.oam_reload = (self.oam_reload & 0xFF) | (((value & 1) as u16) << 8);
                self.reload_oam_address();
            }
            0x04 => self.write_oam(value),
            0x15 => self.vmain = VramControl::from_bits_retain(value & 0x8F),
            0x16 => {
                self.vram_addr = (self.vram_addr & 0x7F00) | value as u16;
                self.prefetch_vram();
            }
            0x17 => {
                self.vram_addr = (self.vram_addr & 0x00FF) | (((value & 0x7F) as u16) << 8);
                self.prefetch_vram();
            }
            0x18 => {
                self.mem.write_vram_byte(self.vram_word_address(), false, value);
                if !self.vmain.contains(VramControl::INC_ON_HIGH) {
                    self.step_vram();
                }
            }
            0x19 => {
                self.mem.write_vram_byte(self.vram_word_address(), true, value);
                if self.vmain.contains(VramControl::INC_ON_HIGH) {
                    self.step_vram();
                }
            }
            0x1B => {
                self.m7a = ((value as u16) << 8) | self.m7_latch as u16;
                self.m7_latch = value;
            }
            0x1C => {
                self.m7b = ((value as u16) << 8) | self.m7_latch as u16;
                self.m7_latch = value;
            }
            0x1D..=0x20 => self.m7_latch = value,
            0x21 => {
                self.cg_addr = value;
                self.cg_high = false;
            }
            0x22 => {
                if !self.cg_high {
                    self.cg_latch = value;
                } else {
                    let i = (self.cg_addr as usize) << 1;
                    self.mem.cgram[i] = self.cg_latch;
                    self.mem.cgram[i + 1] = value & 0x7F;
                    self.cg_addr = self.cg_addr.wrapping_add(1);
                }
                self.cg_high = !self.cg_high;
            }
            _ => {}
        }
    }

    fn write_oam(&mut self, value: u8) {
        let addr = self.oam_addr;
        if addr < 0x200 {
            if addr & 1 == 0 {
                self.oam_latch = value;
            } else {
                let i = addr as usize;
                self.mem.oam[i - 1] = self.oam_latch;
                self.mem.oam[i] = value;
            }
        } else {
            self.mem.oam[VideoMemory::oam_index(addr)] = value;
        }
        self.oam_addr = (addr + 1) & 0x3FF;
    }

    pub fn vram_address(&self) -> u16 {
        self.vram_addr
    }

    pub fn oam_address(&self) -> u16 {
        self.oam_addr
    }

    pub fn cgram_address(&self) -> u8 {
        self.cg_addr
    }
}

impl fmt::Display for Ppu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.timing;
        writeln!(f, "H: {:3} V: {:3} Field: {}", t.hcount, t.vcount, t.interlace_field as u8)?;
        writeln!(
            f,
            "HBlank: {} VBlank: {} ForcedBlank: {} Brightness: {}",
            t.hblank,
            t.vblank,
            self.forced_blank(),
            self.brightness()
        )?;
        writeln!(f, "HTIME: {:#05x} VTIME: {:#05x}", t.htime, t.vtime)?;
        write!(
            f,
            "VRAM: {:#06x} OAM: {:#05x} CGRAM: {:#04x} BGMODE: {:#04x}",
            self.vram_addr, self.oam_addr, self.cg_addr, self.regs[0x05]
        )
    }
}
