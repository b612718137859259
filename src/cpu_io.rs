//! CPU-side I/O ports: $4016-$4017 and $4200-$421F.
//!
//! MDMAEN/HDMAEN ($420B/$420C) belong to the DMA controller and never reach
//! this file.

use crate::input::Joypads;
use crate::ppu::timing::{VideoTiming, DOTS_PER_LINE, LINES_PER_FRAME};

/// Master cycles per step of the multiply/divide unit.
const ARITH_STEP: u64 = 6;
const DIVIDE_STEPS: u64 = 16;

/// Follow-up work for the owner of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoEffect {
    None,
    /// A multiply or divide started; results land after this many cycles.
    Arithmetic(u64),
    /// WRIO bit 7 went from 1 to 0.
    LatchCounters,
    /// NMITIMEN changed; the NMI line needs re-evaluating.
    NmiEnable,
}

#[derive(Debug, Clone, Default)]
pub struct CpuIo {
    /// NMITIMEN ($4200).
    pub nmitimen: u8,
    /// WRIO ($4201), readable back at RDIO.
    pub wrio: u8,
    /// MEMSEL ($420D) bit 0.
    pub fast_rom: bool,
    /// RDNMI bit 7.
    pub rdnmi: bool,
    /// TIMEUP bit 7; this is the IRQ line.
    pub timeup: bool,
    /// HVBJOY bit 0.
    pub joy_busy: bool,
    pub joypads: Joypads,
    wrmpya: u8,
    wrdiv: u16,
    rddiv: u16,
    rdmpy: u16,
    /// (RDDIV, RDMPY) waiting for the arithmetic delay to run out.
    pending: Option<(u16, u16)>,
}

impl CpuIo {
    pub fn new() -> Self {
        Self {
            wrio: 0xFF,
            wrmpya: 0xFF,
            wrdiv: 0xFFFF,
            ..Self::default()
        }
    }

    pub fn reset(&mut self, fast_rom: bool) {
        let joypads = std::mem::take(&mut self.joypads);
        *self = Self {
            fast_rom,
            joypads,
            ..Self::new()
        };
        self.joypads.reset();
    }

    /// NMITIMEN bits 4-5.
    pub fn irq_mode(&self) -> u8 {
        (self.nmitimen >> 4) & 3
    }

    pub fn nmi_enabled(&self) -> bool {
        self.nmitimen & 0x80 != 0
    }

    pub fn auto_joypad(&self) -> bool {
        self.nmitimen & 0x01 != 0
    }

    /// Publishes the result of the multiply or divide in flight.
    pub fn finish_arithmetic(&mut self) {
        if let Some((div, mpy)) = self.pending.take() {
            self.rddiv = div;
            self.rdmpy = mpy;
        }
    }

    /// `reg` is the full 16-bit address.
    pub fn read(&mut self, reg: u16, open_bus: u8, timing: &VideoTiming) -> u8 {
        match reg {
            0x4016 => self.joypads.read_serial(0, open_bus),
            0x4017 => self.joypads.read_serial(1, open_bus),
            0x4210 => {
                let value = ((self.rdnmi as u8) << 7) | (open_bus & 0x70) | 0x02;
                self.rdnmi = false;
                value
            }
            0x4211 => {
                let value = ((self.timeup as u8) << 7) | (open_bus & 0x7F);
                self.timeup = false;
                value
            }
            0x4212 => {
                ((timing.vblank as u8) << 7)
                    | ((timing.hblank as u8) << 6)
                    | (open_bus & 0x3E)
                    | self.joy_busy as u8
            }
            0x4213 => self.wrio,
            0x4214 => self.rddiv as u8,
            0x4215 => (self.rddiv >> 8) as u8,
            0x4216 => self.rdmpy as u8,
            0x4217 => (self.rdmpy >> 8) as u8,
            0x4218..=0x421F => self.joypads.read_latched((reg - 0x4218) as usize),
            _ => open_bus,
        }
    }

    pub fn write(&mut self, reg: u16, value: u8, timing: &mut VideoTiming) -> IoEffect {
        match reg {
            0x4016 => self.joypads.write_strobe(value),
            0x4200 => {
                self.nmitimen = value;
                if self.irq_mode() == 0 {
                    self.timeup = false;
                }
                return IoEffect::NmiEnable;
            }
            0x4201 => {
                let falling = self.wrio & 0x80 != 0 && value & 0x80 == 0;
                self.wrio = value;
                if falling {
                    return IoEffect::LatchCounters;
                }
            }
            0x4202 => self.wrmpya = value,
            0x4203 => {
                let product = self.wrmpya as u16 * value as u16;
                self.pending = Some((value as u16, product));
                let bits = 8 - self.wrmpya.leading_zeros() as u64;
                return IoEffect::Arithmetic(ARITH_STEP * bits);
            }
            0x4204 => self.wrdiv = (self.wrdiv & 0xFF00) | value as u16,
            0x4205 => self.wrdiv = (self.wrdiv & 0x00FF) | ((value as u16) << 8),
            0x4206 => {
                self.pending = Some(match value {
                    0 => (0xFFFF, self.wrdiv),
                    d => (self.wrdiv / d as u16, self.wrdiv % d as u16),
                });
                return IoEffect::Arithmetic(ARITH_STEP * DIVIDE_STEPS);
            }
            0x4207 => timing.htime = (timing.htime & 0x100) | value as u16,
            0x4208 => timing.htime = (timing.htime & 0x0FF) | (((value & 1) as u16) << 8),
            0x4209 => timing.vtime = (timing.vtime & 0x100) | value as u16,
            0x420A => timing.vtime = (timing.vtime & 0x0FF) | (((value & 1) as u16) << 8),
            0x420D => self.fast_rom = value & 1 != 0,
            _ => {}
        }
        if matches!(reg, 0x4207..=0x420A) {
            if timing.htime >= DOTS_PER_LINE && self.irq_mode() & 1 != 0 {
                log::warn!("HTIME {} is past the last dot; the H-IRQ never fires", timing.htime);
            }
            if timing.vtime >= LINES_PER_FRAME && self.irq_mode() & 2 != 0 {
                log::warn!("VTIME {} is past the last line; the V-IRQ never fires", timing.vtime);
            }
        }
        IoEffect::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io() -> (CpuIo, VideoTiming) {
        (CpuIo::new(), VideoTiming::default())
    }

    #[test]
    fn multiply_result_waits_for_the_delay() {
        let (mut io, mut t) = io();
        io.write(0x4202, 0x10, &mut t);
        assert_eq!(io.write(0x4203, 0x20, &mut t), IoEffect::Arithmetic(30));
        assert_eq!(io.read(0x4216, 0, &t), 0x00);
        io.finish_arithmetic();
        assert_eq!(io.read(0x4216, 0, &t), 0x00);
        assert_eq!(io.read(0x4217, 0, &t), 0x02);
        assert_eq!(io.read(0x4214, 0, &t), 0x20);
    }

    #[test]
    fn divide_and_divide_by_zero() {
        let (mut io, mut t) = io();
        io.write(0x4204, 0x39, &mut t);
        io.write(0x4205, 0x30, &mut t);
        assert_eq!(io.write(0x4206, 0x10, &mut t), IoEffect::Arithmetic(96));
        io.finish_arithmetic();
        assert_eq!(io.read(0x4214, 0, &t), 0x03);
        assert_eq!(io.read(0x4215, 0, &t), 0x03);
        assert_eq!(io.read(0x4216, 0, &t), 0x09);

        io.write(0x4206, 0, &mut t);
        io.finish_arithmetic();
        assert_eq!(io.read(0x4214, 0, &t), 0xFF);
        assert_eq!(io.read(0x4215, 0, &t), 0xFF);
        assert_eq!(io.read(0x4216, 0, &t), 0x39);
        assert_eq!(io.read(0x4217, 0, &t), 0x30);
    }

    #[test]
    fn rdnmi_reports_version_and_acknowledges() {
        let (mut io, t) = io();
        io.rdnmi = true;
        assert_eq!(io.read(0x4210, 0xFF, &t), 0xF2);
        assert_eq!(io.read(0x4210, 0x00, &t), 0x02);
    }

    #[test]
    fn timeup_acknowledges_and_irq_off_clears_it() {
        let (mut io, mut t) = io();
        io.timeup = true;
        assert_eq!(io.read(0x4211, 0x00, &t), 0x80);
        assert!(!io.timeup);

        io.timeup = true;
        io.write(0x4200, 0x80, &mut t);
        assert!(!io.timeup);
    }

    #[test]
    fn hvbjoy_reflects_blank_flags() {
        let (mut io, mut t) = io();
        t.vblank = true;
        t.hblank = true;
        io.joy_busy = true;
        assert_eq!(io.read(0x4212, 0xFF, &t), 0xFF);
        t.hblank = false;
        io.joy_busy = false;
        assert_eq!(io.read(0x4212, 0x00, &t), 0x80);
    }

    #[test]
    fn wrio_falling_edge_latches() {
        let (mut io, mut t) = io();
        assert_eq!(io.write(0x4201, 0x7F, &mut t), IoEffect::LatchCounters);
        assert_eq!(io.write(0x4201, 0x00, &mut t), IoEffect::None);
        assert_eq!(io.write(0x4201, 0x80, &mut t), IoEffect::None);
        assert_eq!(io.read(0x4213, 0, &t), 0x80);
    }

    #[test]
    fn htime_vtime_are_nine_bits() {
        let (mut io, mut t) = io();
        io.write(0x4207, 0x34, &mut t);
        io.write(0x4208, 0xFF, &mut t);
        io.write(0x4209, 0x05, &mut t);
        io.write(0x420A, 0x00, &mut t);
        assert_eq!(t.htime, 0x134);
        assert_eq!(t.vtime, 0x005);
    }

    #[test]
    fn memsel_bit_zero() {
        let (mut io, mut t) = io();
        io.write(0x420D, 0x01, &mut t);
        assert!(io.fast_rom);
        io.reset(false);
        assert!(!io.fast_rom);
    }

    #[test]
    fn write_only_ports_read_open_bus() {
        let (mut io, t) = io();
        assert_eq!(io.read(0x4200, 0x5A, &t), 0x5A);
        assert_eq!(io.read(0x4203, 0x5A, &t), 0x5A);
    }
}
