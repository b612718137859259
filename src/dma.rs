//! General purpose DMA and per-scanline HDMA.
//!
//! This module only moves bytes and keeps the $43xx register file. When a
//! transfer runs and how long the CPU stays off the bus is decided by the
//! owner of the scheduler, which calls in here at the right moments.

use crate::debug_flags;
use crate::error::Fault;

pub const CHANNELS: usize = 8;
/// Master cycles per transferred byte.
pub const BYTE_CYCLES: u64 = 8;
/// Per-channel overhead, GDMA and HDMA alike.
pub const CHANNEL_CYCLES: u64 = 8;
/// Fixed HDMA overhead per burst.
pub const HDMA_SETUP_CYCLES: u64 = 18;
/// Reading the 2-byte pointer of an indirect HDMA table entry.
pub const POINTER_CYCLES: u64 = 2 * BYTE_CYCLES;

/// B-bus register offsets written for each byte of a unit, by pattern.
const PATTERNS: [&[u8]; 8] = [
    &[0],
    &[0, 1],
    &[0, 0],
    &[0, 0, 1, 1],
    &[0, 1, 2, 3],
    &[0, 1, 0, 1],
    &[0, 0],
    &[0, 0, 1, 1],
];

/// The two address buses a DMA unit bridges.
pub trait DmaBus {
    /// 24-bit A-bus read.
    fn read_a(&mut self, addr: u32) -> u8;
    fn write_a(&mut self, addr: u32, value: u8);
    /// B-bus access to $2100 + `reg`.
    fn read_b(&mut self, reg: u8) -> u8;
    fn write_b(&mut self, reg: u8, value: u8);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressStep {
    Increment,
    Fixed,
    Decrement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaChannel {
    /// DMAPx ($43x0): direction, indirect HDMA, step mode, pattern.
    pub control: u8,
    /// BBADx ($43x1).
    pub dest: u8,
    /// A1Tx/A1Bx ($43x2-$43x4).
    pub src: u32,
    /// DASx ($43x5-$43x6): GDMA byte count, HDMA indirect address.
    pub count: u16,
    /// DASBx ($43x7): HDMA indirect bank.
    pub indirect_bank: u8,
    /// A2Ax ($43x8-$43x9): HDMA table cursor.
    pub table: u16,
    /// NLTRx ($43xA).
    pub line: u8,
    /// $43xB, mirrored at $43xF.
    pub unused: u8,
    hdma_completed: bool,
    hdma_do_transfer: bool,
}

impl Default for DmaChannel {
    /// Power-on values.
    fn default() -> Self {
        Self {
            control: 0xFF,
            dest: 0xFF,
            src: 0xFF_FFFF,
            count: 0xFFFF,
            indirect_bank: 0xFF,
            table: 0xFFFF,
            line: 0xFF,
            unused: 0xFF,
            hdma_completed: false,
            hdma_do_transfer: false,
        }
    }
}

impl DmaChannel {
    pub fn b_to_a(&self) -> bool {
        self.control & 0x80 != 0
    }

    pub fn indirect(&self) -> bool {
        self.control & 0x40 != 0
    }

    pub fn pattern(&self) -> u8 {
        self.control & 0x07
    }

    pub fn step(&self) -> AddressStep {
        match (self.control >> 3) & 3 {
            0 => AddressStep::Increment,
            2 => AddressStep::Decrement,
            _ => AddressStep::Fixed,
        }
    }

    /// Bytes a GDMA on this channel moves; zero means 65536.
    pub fn gdma_bytes(&self) -> u32 {
        if self.count == 0 {
            0x1_0000
        } else {
            self.count as u32
        }
    }

    pub fn hdma_active(&self) -> bool {
        !self.hdma_completed
    }

    fn bank(&self) -> u32 {
        self.src & 0xFF_0000
    }

    fn b_reg(&self, index: usize) -> u8 {
        let offsets = PATTERNS[self.pattern() as usize];
        self.dest.wrapping_add(offsets[index % offsets.len()])
    }

    fn transfer<B: DmaBus>(&self, bus: &mut B, a_addr: u32, b_reg: u8) {
        if self.b_to_a() {
            let value = bus.read_b(b_reg);
            bus.write_a(a_addr, value);
        } else {
            let value = bus.read_a(a_addr);
            bus.write_b(b_reg, value);
        }
    }

    /// One-line summary for the DMA debug log.
    pub fn describe(&self) -> String {
        format!(
            "${:06X} {} $21{:02X}, {} bytes, pattern {}",
            self.src,
            if self.b_to_a() { "<-" } else { "->" },
            self.dest,
            self.gdma_bytes(),
            self.pattern()
        )
    }

    /// `reg` is the low nibble of $43x0-$43xF.
    pub fn read(&self, reg: u8, open_bus: u8) -> u8 {
        match reg & 0x0F {
            0x0 => self.control,
            0x1 => self.dest,
            0x2 => self.src as u8,
            0x3 => (self.src >> 8) as u8,
            0x4 => (self.src >> 16) as u8,
            0x5 => self.count as u8,
            0x6 => (self.count >> 8) as u8,
            0x7 => self.indirect_bank,
            0x8 => self.table as u8,
            0x9 => (self.table >> 8) as u8,
            0xA => self.line,
            0xB | 0xF => self.unused,
            _ => open_bus,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x0F {
            0x0 => self.control = value,
            0x1 => self.dest = value,
            0x2 => self.src = (self.src & 0xFF_FF00) | value as u32,
            0x3 => self.src = (self.src & 0xFF_00FF) | ((value as u32) << 8),
            0x4 => self.src = (self.src & 0x00_FFFF) | ((value as u32) << 16),
            0x5 => self.count = (self.count & 0xFF00) | value as u16,
            0x6 => self.count = (self.count & 0x00FF) | ((value as u16) << 8),
            0x7 => self.indirect_bank = value,
            0x8 => self.table = (self.table & 0xFF00) | value as u16,
            0x9 => self.table = (self.table & 0x00FF) | ((value as u16) << 8),
            0xA => self.line = value,
            0xB | 0xF => self.unused = value,
            _ => {}
        }
    }

    /// Reads the next table header when the line counter has run out, plus
    /// the indirect pointer that goes with it. Returns the cycles spent on
    /// the pointer.
    fn reload_header<B: DmaBus>(&mut self, bus: &mut B) -> u64 {
        if self.line & 0x7F != 0 {
            return 0;
        }
        self.line = bus.read_a(self.bank() | self.table as u32);
        self.table = self.table.wrapping_add(1);
        self.hdma_completed = self.line == 0;
        self.hdma_do_transfer = !self.hdma_completed;
        if self.indirect() {
            let lo = bus.read_a(self.bank() | self.table as u32);
            self.table = self.table.wrapping_add(1);
            let hi = bus.read_a(self.bank() | self.table as u32);
            self.table = self.table.wrapping_add(1);
            self.count = u16::from_le_bytes([lo, hi]);
            return POINTER_CYCLES;
        }
        0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaController {
    pub channels: [DmaChannel; CHANNELS],
    /// MDMAEN ($420B).
    pub mdmaen: u8,
    /// HDMAEN ($420C).
    pub hdmaen: u8,
}

impl Default for DmaController {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaController {
    pub fn new() -> Self {
        Self {
            channels: Default::default(),
            mdmaen: 0,
            hdmaen: 0,
        }
    }

    pub fn reset(&mut self) {
        self.mdmaen = 0;
        self.hdmaen = 0;
        for c in &mut self.channels {
            c.hdma_completed = false;
            c.hdma_do_transfer = false;
        }
    }

    /// `offset` is the address minus $4300; only $4300-$437F decode.
    pub fn read(&self, offset: u8, open_bus: u8) -> u8 {
        let ch = (offset >> 4) as usize;
        if ch >= CHANNELS {
            return open_bus;
        }
        self.channels[ch].read(offset, open_bus)
    }

    pub fn write(&mut self, offset: u8, value: u8) {
        let ch = (offset >> 4) as usize;
        if ch < CHANNELS {
            self.channels[ch].write(offset, value);
        }
    }

    fn hdma_enabled(&self, ch: usize) -> bool {
        self.hdmaen & (1 << ch) != 0
    }

    pub fn gdma_armed(&self, ch: usize) -> bool {
        self.mdmaen & (1 << ch) != 0
    }

    /// The channel whose GDMA runs next. The hardware scan walks bit 7 down
    /// to bit 0 and the last hit wins, so that is the lowest armed channel.
    pub fn next_gdma(&self) -> Result<Option<usize>, Fault> {
        let Some(ch) = (0..CHANNELS).find(|&ch| self.gdma_armed(ch)) else {
            return Ok(None);
        };
        let pattern = self.channels[ch].pattern();
        if matches!(pattern, 4 | 5) {
            return Err(Fault::DmaPattern {
                kind: "GDMA",
                channel: ch,
                pattern,
            });
        }
        Ok(Some(ch))
    }

    /// Moves one pattern unit of channel `ch`, cut short when the count runs
    /// out, and clears the MDMAEN bit after the last byte. Returns the bytes
    /// moved; a disarmed channel moves nothing.
    pub fn gdma_unit<B: DmaBus>(&mut self, ch: usize, bus: &mut B) -> u32 {
        if !self.gdma_armed(ch) {
            return 0;
        }
        let c = &mut self.channels[ch];
        let len = PATTERNS[c.pattern() as usize].len();
        let mut moved = 0;
        for i in 0..len {
            let b_reg = c.b_reg(i);
            c.transfer(bus, c.src, b_reg);
            let offset = match c.step() {
                AddressStep::Increment => (c.src as u16).wrapping_add(1),
                AddressStep::Decrement => (c.src as u16).wrapping_sub(1),
                AddressStep::Fixed => c.src as u16,
            };
            c.src = c.bank() | offset as u32;
            c.count = c.count.wrapping_sub(1);
            moved += 1;
            if c.count == 0 {
                self.mdmaen &= !(1 << ch);
                break;
            }
        }
        moved
    }

    /// Start-of-frame table setup for every HDMA channel. Returns the
    /// cycles the CPU loses, zero when no channel is enabled.
    pub fn hdma_reload<B: DmaBus>(&mut self, bus: &mut B) -> u64 {
        let mut active = 0;
        let mut pointers = 0;
        for ch in 0..CHANNELS {
            let c = &mut self.channels[ch];
            c.hdma_do_transfer = true;
            if self.hdmaen & (1 << ch) == 0 {
                continue;
            }
            c.table = c.src as u16;
            c.line = 0;
            pointers += c.reload_header(bus);
            active += 1;
            if debug_flags::hdma() {
                log::debug!("HDMA ch{ch} reload: table ${:06X} header {:02X}", c.src, c.line);
            }
        }
        if active == 0 {
            return 0;
        }
        HDMA_SETUP_CYCLES + active * CHANNEL_CYCLES + pointers
    }

    /// One scanline of HDMA: every live channel writes its unit if due,
    /// then steps its line counter. Returns the cycles the CPU loses.
    pub fn hdma_line<B: DmaBus>(&mut self, bus: &mut B) -> Result<u64, Fault> {
        let mut active = 0;
        let mut bytes = 0;
        let mut pointers = 0;
        for ch in 0..CHANNELS {
            if !self.hdma_enabled(ch) || !self.channels[ch].hdma_active() {
                continue;
            }
            active += 1;
            let c = &mut self.channels[ch];
            if !c.hdma_do_transfer {
                continue;
            }
            if c.pattern() == 5 {
                return Err(Fault::DmaPattern {
                    kind: "HDMA",
                    channel: ch,
                    pattern: 5,
                });
            }
            let len = PATTERNS[c.pattern() as usize].len();
            for i in 0..len {
                let a_addr = if c.indirect() {
                    let addr = ((c.indirect_bank as u32) << 16) | c.count as u32;
                    c.count = c.count.wrapping_add(1);
                    addr
                } else {
                    let addr = c.bank() | c.table as u32;
                    c.table = c.table.wrapping_add(1);
                    addr
                };
                let b_reg = c.b_reg(i);
                c.transfer(bus, a_addr, b_reg);
            }
            bytes += len as u64;
        }

        for ch in 0..CHANNELS {
            if !self.hdma_enabled(ch) || !self.channels[ch].hdma_active() {
                continue;
            }
            let c = &mut self.channels[ch];
            c.line = c.line.wrapping_sub(1);
            c.hdma_do_transfer = c.line & 0x80 != 0;
            pointers += c.reload_header(bus);
        }

        if active == 0 {
            return Ok(0);
        }
        Ok(HDMA_SETUP_CYCLES + active * CHANNEL_CYCLES + bytes * BYTE_CYCLES + pointers)
    }
}
