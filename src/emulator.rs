//! The frame loop and the public face of the core.
//!
//! One [`Emulator::run_frame`] call interleaves CPU bus operations with the
//! scheduler: while the CPU is free and nothing is due it performs one bus
//! operation, otherwise the bus commits time and runs whatever fired. The
//! loop ends at vblank start (or after one frame's worth of cycles), on a
//! breakpoint, or on a fault.

use std::str::FromStr;

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::config::CoreConfig;
use crate::cpu::Cpu;
use crate::debug_flags;
use crate::debugger::Debugger;
use crate::error::{CoreError, CrashReport, Fault, LoadError, Result};
use crate::input::Button;
use crate::ppu::memory::{CGRAM_SIZE, VRAM_SIZE};
use crate::ppu::renderer::FrameCapture;
use crate::ppu::timing::FRAME_CYCLES;
use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::wram::WRAM_SIZE;

/// Named views for overlays, memory dumps and status strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    System,
    Cpu,
    Ppu,
    Events,
    Wram,
    Vram,
    Cgram,
}

impl FromStr for Region {
    type Err = LoadError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "SYSTEM" => Region::System,
            "CPU" => Region::Cpu,
            "PPU" => Region::Ppu,
            "EVENTS" => Region::Events,
            "WRAM" => Region::Wram,
            "VRAM" => Region::Vram,
            "CGRAM" => Region::Cgram,
            _ => return Err(LoadError::UnknownRegion(s.to_string())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Frame,
    Instruction,
}

pub struct Emulator {
    pub cpu: Cpu,
    pub bus: Bus,
    pub debugger: Debugger,
    config: CoreConfig,
    has_cartridge: bool,
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

impl Emulator {
    pub fn new(config: CoreConfig) -> Self {
        let mut emu = Self {
            cpu: Cpu::new(),
            bus: Bus::new(),
            debugger: Debugger::new(config.history_depth),
            config,
            has_cartridge: false,
        };
        emu.reset();
        emu
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Power cycle. Cartridge SRAM and video memory keep their contents.
    pub fn reset(&mut self) {
        self.bus.reset(self.config.fast_rom_at_reset);
        self.debugger.reset();
        let entry = self.bus.reset_vector();
        self.cpu.reset(entry);
        log::debug!("reset: entry ${:04X}", entry);
    }

    /// Parses and maps a cartridge image, then resets. A bad image leaves the
    /// previous cartridge in place.
    pub fn load_rom(&mut self, rom: Vec<u8>) -> Result<()> {
        let cart = Cartridge::load_from_bytes(rom)?;
        self.bus.load_cartridge(cart)?;
        self.has_cartridge = true;
        self.reset();
        Ok(())
    }

    /// Runs until vblank starts (or one frame's worth of master cycles when
    /// early exit is off). Returns immediately while paused.
    pub fn run_frame(&mut self) -> Result<()> {
        if !self.has_cartridge {
            return Err(CoreError::NoCartridge);
        }
        if self.debugger.is_paused() {
            return Ok(());
        }
        self.run(Stop::Frame)
    }

    /// Runs exactly one instruction, or the entry sequence of a pending
    /// interrupt followed by the first handler instruction. Works while paused.
    pub fn run_instruction(&mut self) -> Result<()> {
        if !self.has_cartridge {
            return Err(CoreError::NoCartridge);
        }
        self.run(Stop::Instruction)
    }

    fn run(&mut self, stop: Stop) -> Result<()> {
        let deadline = self.bus.sched.cycle() + FRAME_CYCLES;
        let mut stepped = false;
        self.bus.early_exit = false;

        loop {
            if let Some(fault) = self.bus.take_fault() {
                return Err(self.crash(fault));
            }
            match stop {
                Stop::Frame => {
                    if self.config.early_exit_at_vblank && self.bus.early_exit {
                        break;
                    }
                    if self.bus.sched.cycle() >= deadline {
                        break;
                    }
                }
                Stop::Instruction => {
                    if stepped && (self.cpu.at_fetch() || self.cpu.halted()) {
                        break;
                    }
                }
            }

            if !self.bus.blocked.is_empty() || self.bus.sched.any_event_due() {
                self.bus.process_events();
                continue;
            }

            if self.cpu.at_fetch() && !self.cpu.halted() {
                if self.bus.gdma_pending() {
                    self.bus.start_gdma();
                    continue;
                }
                if !stepped {
                    let pc = self.cpu.regs.pc24();
                    if stop == Stop::Frame && self.debugger.check_breakpoint(pc) {
                        break;
                    }
                    if stop == Stop::Instruction && self.cpu.take_interrupt(&mut self.bus) {
                        stepped = true;
                        continue;
                    }
                    self.debugger.record(pc);
                    if debug_flags::trace() {
                        log::trace!("{:02X}:{:04X}", self.cpu.regs.pb, self.cpu.regs.pc);
                    }
                }
            }

            self.cpu.step(&mut self.bus);
            if stop == Stop::Instruction {
                stepped = true;
            }
        }
        Ok(())
    }

    fn crash(&self, fault: Fault) -> CoreError {
        let report = CrashReport {
            fault,
            pc: self.cpu.instruction_addr,
            history: self.debugger.history(),
        };
        log::error!("{report}");
        CoreError::Fatal(report)
    }

    /// Sets one button on controller 1. Returns false for an unknown name.
    pub fn set_key_input(&mut self, name: &str, pressed: bool) -> bool {
        match Button::from_str(name) {
            Ok(Button(bit)) => {
                self.bus.io.joypads.ports[0].set_button(bit, pressed);
                true
            }
            Err(e) => {
                log::warn!("{e}");
                false
            }
        }
    }

    /// PB:PC of the next instruction.
    pub fn pc(&self) -> u32 {
        self.cpu.regs.pc24()
    }

    pub fn resolution(&self) -> (usize, usize) {
        (SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    /// Row-major BGR555 pixels.
    pub fn framebuffer(&self) -> &[u16] {
        &self.bus.screen
    }

    pub fn capture(&self) -> FrameCapture {
        FrameCapture::new(self.bus.frame, &self.bus.screen)
    }

    pub fn pause(&mut self) {
        self.debugger.pause();
    }

    pub fn resume(&mut self) {
        let pc = self.pc();
        self.debugger.resume(pc);
    }

    pub fn is_paused(&self) -> bool {
        self.debugger.is_paused()
    }

    pub fn add_breakpoint(&mut self, address: u32) {
        self.debugger.add_breakpoint(address);
    }

    pub fn remove_breakpoint(&mut self, address: u32) {
        self.debugger.remove_breakpoint(address);
    }

    /// Frames completed since reset.
    pub fn frame(&self) -> u64 {
        self.bus.frame
    }

    /// Master cycles since power-on.
    pub fn cycles(&self) -> u64 {
        self.bus.sched.cycle()
    }

    /// Replaces the backing store of WRAM, VRAM or CGRAM with `buf`, which
    /// must be exactly the region's size. Current contents are carried over;
    /// the previous buffer is returned.
    pub fn mmap(&mut self, region: &str, mut buf: Vec<u8>) -> std::result::Result<Vec<u8>, LoadError> {
        let region = Region::from_str(region)?;
        let (name, expected) = match region {
            Region::Wram => ("WRAM", WRAM_SIZE),
            Region::Vram => ("VRAM", VRAM_SIZE),
            Region::Cgram => ("CGRAM", CGRAM_SIZE),
            _ => return Err(LoadError::UnknownRegion(format!("{region:?}"))),
        };
        if buf.len() != expected {
            return Err(LoadError::OverlaySize {
                region: name,
                expected,
                actual: buf.len(),
            });
        }
        let mem = &mut self.bus.mem.ppu.mem;
        let old = match region {
            Region::Wram => self.bus.mem.wram.replace_storage(buf),
            Region::Vram => {
                buf.copy_from_slice(&mem.vram);
                std::mem::replace(&mut mem.vram, buf)
            }
            _ => {
                buf.copy_from_slice(&mem.cgram);
                std::mem::replace(&mut mem.cgram, buf)
            }
        };
        log::info!("{name} overlay installed");
        Ok(old)
    }

    pub fn memory(&self, region: &str) -> std::result::Result<&[u8], LoadError> {
        match Region::from_str(region)? {
            Region::Wram => Ok(self.bus.mem.wram.bytes()),
            Region::Vram => Ok(&self.bus.mem.ppu.mem.vram),
            Region::Cgram => Ok(&self.bus.mem.ppu.mem.cgram),
            other => Err(LoadError::UnknownRegion(format!("{other:?}"))),
        }
    }

    pub fn status(&self, region: &str) -> std::result::Result<String, LoadError> {
        Ok(match Region::from_str(region)? {
            Region::System => {
                let mut s = self.bus.status();
                if let Some(cart) = &self.bus.mem.cart {
                    s.push('\n');
                    s.push_str(cart.header.to_string().trim_end());
                }
                s.push('\n');
                s.push_str(&self.debugger.to_string());
                s
            }
            Region::Cpu => self.cpu.to_string(),
            Region::Ppu => self.bus.mem.ppu.to_string(),
            Region::Events => self.bus.sched.to_string(),
            other => return Err(LoadError::UnknownRegion(format!("{other:?}"))),
        })
    }

    /// Bytes from the top of the stack upward, without bus side effects.
    pub fn stack(&self, depth: usize) -> Vec<u8> {
        let s = self.cpu.regs.s;
        (1..=depth)
            .map(|i| self.bus.mem.peek(s.wrapping_add(i as u16) as u32))
            .collect()
    }
}
