use bitflags::bitflags;

/// Dots per scanline; each dot is 4 master cycles.
pub const DOTS_PER_LINE: u16 = 340;
pub const LINES_PER_FRAME: u16 = 262;
pub const VISIBLE_LINES: u16 = 224;
pub const VBLANK_LINE: u16 = VISIBLE_LINES + 1;
pub const CYCLES_PER_DOT: u64 = 4;
pub const FRAME_CYCLES: u64 = DOTS_PER_LINE as u64 * CYCLES_PER_DOT * LINES_PER_FRAME as u64;

pub const DOT_HBLANK_END: u16 = 1;
pub const DOT_HDMA_RELOAD: u16 = 6;
pub const DOT_OAM_RELOAD: u16 = 10;
pub const DOT_JOYPAD_LATCH: u16 = 32;
pub const DOT_JOYPAD_DONE: u16 = 92;
pub const DOT_REFRESH: u16 = 133;
pub const DOT_HBLANK_START: u16 = 274;
pub const DOT_HDMA_LINE: u16 = 278;

/// Comparator latency, in master cycles, from counter match to TIMEUP.
pub const IRQ_DELAY_H: u64 = 14;
pub const IRQ_DELAY_V: u64 = 10;

bitflags! {
    /// What happened on the dot that was just entered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DotEvents: u16 {
        const HBLANK_END   = 1 << 0;
        const HDMA_RELOAD  = 1 << 1;
        const OAM_RELOAD   = 1 << 2;
        const JOYPAD_LATCH = 1 << 3;
        const JOYPAD_DONE  = 1 << 4;
        const REFRESH      = 1 << 5;
        const HBLANK_START = 1 << 6;
        const RENDER_LINE  = 1 << 7;
        const HDMA_LINE    = 1 << 8;
        const VBLANK_START = 1 << 9;
        const VBLANK_END   = 1 << 10;
    }
}

/// Dot and scanline counters plus the H/V IRQ comparators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTiming {
    pub hcount: u16,
    pub vcount: u16,
    /// HTIME ($4207/$4208), 9 bits.
    pub htime: u16,
    /// VTIME ($4209/$420A), 9 bits.
    pub vtime: u16,
    pub hblank: bool,
    pub vblank: bool,
    /// Odd field of an interlaced frame (STAT78 bit 7).
    pub interlace_field: bool,
}

impl Default for VideoTiming {
    fn default() -> Self {
        Self {
            hcount: 0,
            vcount: 0,
            htime: 0x1FF,
            vtime: 0x1FF,
            hblank: false,
            vblank: false,
            interlace_field: false,
        }
    }
}

impl VideoTiming {
    /// Counters just after power-on: the CPU reset sequence has already
    /// eaten `init_cycles` master cycles.
    pub fn reset(&mut self, init_cycles: u64) {
        *self = Self {
            hcount: (init_cycles / CYCLES_PER_DOT) as u16 + 1,
            ..Self::default()
        };
    }

    /// Moves to the next dot. `irq_mode` is NMITIMEN bits 4-5. Returns the
    /// fixed-position actions for the new dot and, if a comparator matched,
    /// the delay before TIMEUP is raised.
    pub fn tick(&mut self, irq_mode: u8) -> (DotEvents, Option<u64>) {
        let mut ev = DotEvents::empty();
        self.hcount += 1;
        match self.hcount {
            DOT_HBLANK_END => {
                self.hblank = false;
                if self.vcount == 0 {
                    self.interlace_field = !self.interlace_field;
                }
                ev |= DotEvents::HBLANK_END;
            }
            DOT_HDMA_RELOAD if self.vcount == 0 => ev |= DotEvents::HDMA_RELOAD,
            DOT_OAM_RELOAD if self.vcount == VBLANK_LINE => ev |= DotEvents::OAM_RELOAD,
            DOT_JOYPAD_LATCH if self.vcount == VBLANK_LINE => ev |= DotEvents::JOYPAD_LATCH,
            DOT_JOYPAD_DONE if self.vcount == VBLANK_LINE => ev |= DotEvents::JOYPAD_DONE,
            DOT_REFRESH => ev |= DotEvents::REFRESH,
            DOT_HBLANK_START => {
                self.hblank = true;
                ev |= DotEvents::HBLANK_START;
                if (1..=VISIBLE_LINES).contains(&self.vcount) {
                    ev |= DotEvents::RENDER_LINE;
                }
            }
            DOT_HDMA_LINE if self.vcount < VBLANK_LINE => ev |= DotEvents::HDMA_LINE,
            DOTS_PER_LINE => {
                self.hcount = 0;
                ev |= self.newline();
            }
            _ => {}
        }
        (ev, self.irq_match(irq_mode))
    }

    fn newline(&mut self) -> DotEvents {
        self.vcount += 1;
        if self.vcount == VBLANK_LINE {
            self.vblank = true;
            return DotEvents::VBLANK_START;
        }
        if self.vcount == LINES_PER_FRAME {
            self.vcount = 0;
            self.vblank = false;
            return DotEvents::VBLANK_END;
        }
        DotEvents::empty()
    }

    fn irq_match(&self, irq_mode: u8) -> Option<u64> {
        match irq_mode & 0b11 {
            1 if self.hcount == self.htime => Some(IRQ_DELAY_H),
            2 if self.hcount == 0 && self.vcount == self.vtime => Some(IRQ_DELAY_V),
            3 if self.hcount == self.htime && self.vcount == self.vtime => Some(IRQ_DELAY_H),
            _ => None,
        }
    }
}
