//! The system side of the CPU: address decode, open bus, wait states, and
//! every timed event that is not the CPU itself (video dots, IRQ/NMI, DMA,
//! HDMA, DRAM refresh, the multiply/divide unit).
//!
//! Peripherals run lazily. The CPU charges each access into the scheduler's
//! uncommitted delta; once that reaches the next event the frame loop calls
//! [`Bus::process_events`], which commits the time and dispatches whatever
//! became due.

pub mod router;
pub mod waitstate;

use bitflags::bitflags;

use crate::apu::{AudioPorts, IplShim};
use crate::cartridge::Cartridge;
use crate::cpu_bus::CpuBus;
use crate::cpu_io::{CpuIo, IoEffect};
use crate::debug_flags;
use crate::dma::{DmaBus, DmaController, BYTE_CYCLES, CHANNELS, CHANNEL_CYCLES};
use crate::error::{Fault, LoadError};
use crate::ppu::renderer::{BackdropRenderer, ScanlineRenderer};
use crate::ppu::timing::{DotEvents, CYCLES_PER_DOT};
use crate::ppu::{Ppu, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::scheduler::{
    EventId, Fired, Scheduler, PRIORITY_DMA, PRIORITY_GENERIC, PRIORITY_IRQ, PRIORITY_STALL,
    PRIORITY_VIDEO,
};
use crate::wram::Wram;
use router::{MemoryMap, Region, Target};

/// Master cycles of the CPU reset sequence before the first opcode fetch.
pub const INIT_CYCLES: u64 = 182;
/// DRAM refresh, once per scanline.
pub const REFRESH_CYCLES: u64 = 40;
/// Vblank start to RDNMI going high.
const NMI_DELAY: i64 = 2;
/// GDMA starts on this boundary of the master clock.
const DMA_PHASE: u64 = 8;

bitflags! {
    /// Reasons the CPU is held off the bus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Blocked: u8 {
        const DMA = 0x01;
        const HDMA = 0x02;
        const REFRESH = 0x04;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Dot,
    Irq,
    Nmi,
    Arithmetic,
    Gdma(usize),
    Release(Blocked),
}

struct Events {
    dot: EventId,
    irq: EventId,
    nmi: EventId,
    arithmetic: EventId,
    gdma: [EventId; CHANNELS],
    release_dma: EventId,
    release_hdma: EventId,
    release_refresh: EventId,
}

impl Events {
    fn register(sched: &mut Scheduler<BusEvent>) -> Self {
        const GDMA: [&str; CHANNELS] =
            ["gdma0", "gdma1", "gdma2", "gdma3", "gdma4", "gdma5", "gdma6", "gdma7"];
        let gdma = std::array::from_fn(|ch| {
            sched.register(GDMA[ch], BusEvent::Gdma(ch), PRIORITY_DMA | ch as u32)
        });
        Self {
            dot: sched.register("dot", BusEvent::Dot, PRIORITY_VIDEO),
            irq: sched.register("irq", BusEvent::Irq, PRIORITY_IRQ),
            nmi: sched.register("nmi", BusEvent::Nmi, PRIORITY_IRQ),
            arithmetic: sched.register("mul/div", BusEvent::Arithmetic, PRIORITY_GENERIC),
            gdma,
            release_dma: sched.register(
                "dma-done",
                BusEvent::Release(Blocked::DMA),
                PRIORITY_STALL,
            ),
            release_hdma: sched.register(
                "hdma-done",
                BusEvent::Release(Blocked::HDMA),
                PRIORITY_STALL,
            ),
            release_refresh: sched.register(
                "refresh-done",
                BusEvent::Release(Blocked::REFRESH),
                PRIORITY_STALL,
            ),
        }
    }
}

/// Where a B-bus register ($2100 + reg) lives.
fn b_bus(reg: u8) -> Target {
    let (region, offset) = match reg {
        0x00..=0x3F => (Region::Ppu, reg),
        0x40..=0x7F => (Region::Apu, reg & 3),
        0x80..=0x83 => (Region::WramPort, reg & 3),
        _ => (Region::OpenBus, reg),
    };
    Target {
        region,
        offset: offset as u32,
    }
}

/// Fixed system windows, installed on top of the cartridge mapping.
fn map_system(map: &mut MemoryMap) -> Result<(), LoadError> {
    map.map("00-3F,80-BF:0000-1FFF", Region::Wram, 0x1FFF)?;
    map.map("7E-7F:0000-FFFF", Region::Wram, 0x1_FFFF)?;
    map.map("00-3F,80-BF:2100-213F", Region::Ppu, 0x3F)?;
    map.map("00-3F,80-BF:2140-217F", Region::Apu, 0x03)?;
    map.map("00-3F,80-BF:2180-2183", Region::WramPort, 0x03)?;
    map.map("00-3F,80-BF:4016-4017,4200-421F", Region::CpuIo, 0xFFFF)?;
    map.map("00-3F,80-BF:4300-437F", Region::Dma, 0x7F)?;
    Ok(())
}

/// Everything reachable through the router that DMA can also reach.
pub struct Memory {
    pub map: MemoryMap,
    pub wram: Wram,
    pub cart: Option<Cartridge>,
    pub ppu: Ppu,
    pub apu: Box<dyn AudioPorts>,
    /// Last value driven on the data bus.
    pub mdr: u8,
    pub fault: Option<Fault>,
}

impl Memory {
    fn new() -> Self {
        let mut map = MemoryMap::new();
        if let Err(e) = map_system(&mut map) {
            log::error!("system map: {e}");
        }
        Self {
            map,
            wram: Wram::new(),
            cart: None,
            ppu: Ppu::new(),
            apu: Box::new(IplShim::default()),
            mdr: 0,
            fault: None,
        }
    }

    /// Keeps the first fault; later ones are consequences of it.
    pub fn raise(&mut self, fault: Fault) {
        if self.fault.is_none() {
            log::error!("{fault}");
            self.fault = Some(fault);
        }
    }

    fn read_target(&mut self, addr: u32, t: Target) -> u8 {
        match t.region {
            Region::Wram => self.wram.read(t.offset),
            Region::WramPort => self.wram.read_port(t.offset, self.mdr),
            Region::Ppu => self.ppu.read(t.offset as u16, self.mdr),
            Region::Apu => self.apu.read_port(t.offset as usize),
            Region::Rom => match &self.cart {
                Some(cart) => cart.read_rom(t.offset),
                None => self.mdr,
            },
            Region::Sram => self
                .cart
                .as_ref()
                .and_then(|cart| cart.read_sram(t.offset))
                .unwrap_or(self.mdr),
            Region::Coprocessor => {
                self.raise(Fault::Coprocessor(addr));
                self.mdr
            }
            Region::OpenBus | Region::CpuIo | Region::Dma => self.mdr,
        }
    }

    fn write_target(&mut self, addr: u32, t: Target, value: u8) {
        match t.region {
            Region::Wram => self.wram.write(t.offset, value),
            Region::WramPort => self.wram.write_port(t.offset, value),
            Region::Ppu => self.ppu.write(t.offset as u16, value),
            Region::Apu => self.apu.write_port(t.offset as usize, value),
            Region::Sram => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_sram(t.offset, value);
                }
            }
            Region::Coprocessor => self.raise(Fault::Coprocessor(addr)),
            Region::Rom | Region::OpenBus | Region::CpuIo | Region::Dma => {}
        }
    }

    /// Side-effect free read for debug views; I/O answers with open bus.
    pub fn peek(&self, addr: u32) -> u8 {
        let t = self.map.resolve(addr);
        match t.region {
            Region::Wram => self.wram.read(t.offset),
            Region::Rom => self.cart.as_ref().map_or(self.mdr, |c| c.read_rom(t.offset)),
            Region::Sram => self
                .cart
                .as_ref()
                .and_then(|c| c.read_sram(t.offset))
                .unwrap_or(self.mdr),
            _ => self.mdr,
        }
    }

    /// The A-bus side of a DMA cannot reach B-bus or CPU registers.
    fn a_bus_blocked(region: Region) -> bool {
        matches!(
            region,
            Region::Ppu | Region::Apu | Region::WramPort | Region::CpuIo | Region::Dma
        )
    }
}

impl DmaBus for Memory {
    fn read_a(&mut self, addr: u32) -> u8 {
        let t = self.map.resolve(addr);
        if !Self::a_bus_blocked(t.region) {
            self.mdr = self.read_target(addr, t);
        }
        self.mdr
    }

    fn write_a(&mut self, addr: u32, value: u8) {
        let t = self.map.resolve(addr);
        self.mdr = value;
        if !Self::a_bus_blocked(t.region) {
            self.write_target(addr, t, value);
        }
    }

    fn read_b(&mut self, reg: u8) -> u8 {
        self.mdr = self.read_target(0x2100 | reg as u32, b_bus(reg));
        self.mdr
    }

    fn write_b(&mut self, reg: u8, value: u8) {
        self.mdr = value;
        self.write_target(0x2100 | reg as u32, b_bus(reg), value);
    }
}

pub struct Bus {
    pub sched: Scheduler<BusEvent>,
    ev: Events,
    pub dma: DmaController,
    pub io: CpuIo,
    pub mem: Memory,
    renderer: Box<dyn ScanlineRenderer>,
    /// 256x224 BGR555, row-major.
    pub screen: Vec<u16>,
    pub blocked: Blocked,
    /// NMI edge latch, cleared when the CPU takes the interrupt.
    nmi_pending: bool,
    nmi_line: bool,
    /// Set at vblank start.
    pub early_exit: bool,
    pub frame: u64,
    apu_synced: u64,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus {
    pub fn new() -> Self {
        let mut sched = Scheduler::new();
        let ev = Events::register(&mut sched);
        Self {
            sched,
            ev,
            dma: DmaController::new(),
            io: CpuIo::new(),
            mem: Memory::new(),
            renderer: Box::new(BackdropRenderer),
            screen: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            blocked: Blocked::empty(),
            nmi_pending: false,
            nmi_line: false,
            early_exit: false,
            frame: 0,
            apu_synced: 0,
        }
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn ScanlineRenderer>) {
        self.renderer = renderer;
    }

    pub fn set_audio(&mut self, apu: Box<dyn AudioPorts>) {
        self.mem.apu = apu;
    }

    /// Rebuilds the address map around `cart`. The map is not touched again
    /// until the next load.
    pub fn load_cartridge(&mut self, cart: Cartridge) -> Result<(), LoadError> {
        let mut map = MemoryMap::new();
        cart.install(&mut map)?;
        map_system(&mut map)?;
        self.mem.map = map;
        self.mem.cart = Some(cart);
        Ok(())
    }

    /// Power-on state. The clock starts just after the CPU reset sequence.
    pub fn reset(&mut self, fast_rom: bool) {
        self.sched.reset();
        self.dma.reset();
        self.io.reset(fast_rom);
        self.mem.wram.reset();
        self.mem.ppu.reset(INIT_CYCLES);
        self.mem.apu.reset();
        self.mem.mdr = 0;
        self.mem.fault = None;
        self.blocked = Blocked::empty();
        self.nmi_pending = false;
        self.nmi_line = false;
        self.early_exit = false;
        self.frame = 0;
        self.screen.fill(0);

        self.sched.advance(INIT_CYCLES);
        self.apu_synced = INIT_CYCLES;
        let next_dot = (self.mem.ppu.timing.hcount as u64 + 1) * CYCLES_PER_DOT;
        self.sched.schedule_abs(self.ev.dot, next_dot);
    }

    /// The reset vector, read without bus side effects or wait states.
    pub fn reset_vector(&self) -> u16 {
        u16::from_le_bytes([self.mem.peek(0x00_FFFC), self.mem.peek(0x00_FFFD)])
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.mem.fault.as_ref()
    }

    pub fn take_fault(&mut self) -> Option<Fault> {
        self.mem.fault.take()
    }

    /// Commits the uncommitted delta, jumping to the next event when
    /// nothing is due yet, and dispatches every due event.
    pub fn process_events(&mut self) {
        if !self.sched.any_event_due() {
            self.sched.skip_to_horizon();
        }
        self.sched.advance(0);
        while let Some(fired) = self.sched.pop_due() {
            self.dispatch(fired);
        }
    }

    fn dispatch(&mut self, fired: Fired<BusEvent>) {
        match fired.kind {
            BusEvent::Dot => self.dot(fired.late),
            BusEvent::Irq => {
                if debug_flags::irq() {
                    log::debug!(
                        "TIMEUP at H={} V={}",
                        self.mem.ppu.timing.hcount,
                        self.mem.ppu.timing.vcount
                    );
                }
                self.io.timeup = true;
            }
            BusEvent::Nmi => {
                self.io.rdnmi = true;
                self.update_nmi_line();
            }
            BusEvent::Arithmetic => self.io.finish_arithmetic(),
            BusEvent::Gdma(ch) => self.gdma_unit(ch, fired.late),
            BusEvent::Release(kind) => self.release(kind),
        }
    }

    fn dot(&mut self, late: u64) {
        self.sched
            .schedule(self.ev.dot, CYCLES_PER_DOT as i64 - late as i64);
        let (events, irq) = self.mem.ppu.timing.tick(self.io.irq_mode());
        if let Some(delay) = irq {
            self.sched.schedule(self.ev.irq, delay as i64 - late as i64);
        }
        if events.is_empty() {
            return;
        }

        if events.contains(DotEvents::HDMA_RELOAD) {
            let cost = self.dma.hdma_reload(&mut self.mem);
            self.hdma_stall(cost);
        }
        if events.contains(DotEvents::OAM_RELOAD) && !self.mem.ppu.forced_blank() {
            self.mem.ppu.reload_oam_address();
        }
        if events.contains(DotEvents::JOYPAD_LATCH) && self.io.auto_joypad() {
            self.io.joy_busy = true;
            self.io.joypads.auto_read();
        }
        if events.contains(DotEvents::JOYPAD_DONE) {
            self.io.joy_busy = false;
        }
        if events.contains(DotEvents::REFRESH) {
            if self.blocked.contains(Blocked::DMA) {
                self.delay_gdma(REFRESH_CYCLES);
            }
            self.stall(Blocked::REFRESH, REFRESH_CYCLES);
        }
        if events.contains(DotEvents::RENDER_LINE) {
            self.render_line();
        }
        if events.contains(DotEvents::HDMA_LINE) {
            match self.dma.hdma_line(&mut self.mem) {
                Ok(cost) => self.hdma_stall(cost),
                Err(fault) => self.mem.raise(fault),
            }
        }
        if events.contains(DotEvents::VBLANK_START) {
            self.sched.schedule(self.ev.nmi, NMI_DELAY - late as i64);
            self.early_exit = true;
            self.frame += 1;
        }
        if events.contains(DotEvents::VBLANK_END) {
            self.io.rdnmi = false;
            self.update_nmi_line();
        }
    }

    fn render_line(&mut self) {
        let line = self.mem.ppu.timing.vcount - 1;
        let start = line as usize * SCREEN_WIDTH;
        let out = &mut self.screen[start..start + SCREEN_WIDTH];
        if self.mem.ppu.forced_blank() {
            out.fill(0);
        } else {
            self.renderer.render_line(&self.mem.ppu, line, out);
        }
    }

    /// NMI fires on the rising edge of (NMITIMEN bit 7 AND RDNMI bit 7).
    fn update_nmi_line(&mut self) {
        let line = self.io.nmi_enabled() && self.io.rdnmi;
        if line && !self.nmi_line {
            self.nmi_pending = true;
            if debug_flags::irq() {
                log::debug!("NMI raised in frame {}", self.frame);
            }
        }
        self.nmi_line = line;
    }

    fn release_id(&self, kind: Blocked) -> EventId {
        if kind == Blocked::DMA {
            self.ev.release_dma
        } else if kind == Blocked::HDMA {
            self.ev.release_hdma
        } else {
            self.ev.release_refresh
        }
    }

    fn stall(&mut self, kind: Blocked, cycles: u64) {
        if cycles == 0 {
            return;
        }
        self.blocked |= kind;
        let id = self.release_id(kind);
        self.sched.schedule(id, cycles as i64);
    }

    fn release(&mut self, kind: Blocked) {
        if !self.blocked.contains(kind) {
            let name = if kind == Blocked::DMA {
                "DMA"
            } else if kind == Blocked::HDMA {
                "HDMA"
            } else {
                "refresh"
            };
            self.mem.raise(Fault::BlockUnderflow(name));
            return;
        }
        self.blocked.remove(kind);
    }

    fn hdma_stall(&mut self, cycles: u64) {
        if cycles == 0 {
            return;
        }
        if self.blocked.contains(Blocked::DMA) {
            self.delay_gdma(cycles);
        }
        self.stall(Blocked::HDMA, cycles);
    }

    /// Pushes the rest of a running GDMA back by `cycles`.
    fn delay_gdma(&mut self, cycles: u64) {
        for id in self.ev.gdma.into_iter().chain([self.ev.release_dma]) {
            if let Some(left) = self.sched.until(id) {
                self.sched.schedule(id, (left + cycles) as i64);
            }
        }
    }

    pub fn gdma_pending(&self) -> bool {
        self.dma.mdmaen != 0 && !self.blocked.contains(Blocked::DMA)
    }

    /// Holds the CPU and opens the first channel window after the phase
    /// alignment and setup time.
    pub fn start_gdma(&mut self) {
        let now = self.sched.cycle();
        let delay = (DMA_PHASE - now % DMA_PHASE) + DMA_PHASE;
        if debug_flags::dma() {
            log::debug!("GDMA MDMAEN={:02X} at cycle {now}", self.dma.mdmaen);
        }
        self.blocked |= Blocked::DMA;
        self.next_gdma(delay as i64);
    }

    /// Opens the window of the next armed channel `delay` cycles from now,
    /// or releases the CPU at that point when none is left.
    fn next_gdma(&mut self, delay: i64) {
        match self.dma.next_gdma() {
            Ok(Some(ch)) => {
                if debug_flags::dma() {
                    log::debug!("GDMA ch{ch}: {}", self.dma.channels[ch].describe());
                }
                self.sched
                    .schedule(self.ev.gdma[ch], delay + CHANNEL_CYCLES as i64);
            }
            Ok(None) => self.sched.schedule(self.ev.release_dma, delay),
            Err(fault) => {
                self.mem.raise(fault);
                self.blocked.remove(Blocked::DMA);
            }
        }
    }

    /// One unit of the channel in flight. The next unit, or the next
    /// channel, follows once this unit's bytes have been paid for.
    fn gdma_unit(&mut self, ch: usize, late: u64) {
        let bytes = self.dma.gdma_unit(ch, &mut self.mem);
        let delay = (bytes as u64 * BYTE_CYCLES) as i64 - late as i64;
        if self.dma.gdma_armed(ch) {
            self.sched.schedule(self.ev.gdma[ch], delay);
        } else {
            self.next_gdma(delay);
        }
    }

    fn charge(&mut self, addr: u32) {
        self.sched
            .add_relative(waitstate::access_cycles(addr, self.io.fast_rom));
    }

    fn sync_apu(&mut self) {
        let now = self.sched.cycle();
        self.mem.apu.catch_up(now - self.apu_synced);
        self.apu_synced = now;
    }

    /// CPU-side read with every register side effect, no wait state.
    pub fn read(&mut self, addr: u32) -> u8 {
        let t = self.mem.map.resolve(addr);
        let open_bus = self.mem.mdr;
        let value = match t.region {
            Region::CpuIo => {
                let value = self.io.read(t.offset as u16, open_bus, &self.mem.ppu.timing);
                if t.offset == 0x4210 {
                    self.update_nmi_line();
                }
                value
            }
            Region::Dma => self.dma.read(t.offset as u8, open_bus),
            Region::Ppu => {
                // SLHV only latches while WRIO bit 7 holds the pin high
                if t.offset == 0x37 && self.io.wrio & 0x80 != 0 {
                    self.mem.ppu.latch_counters();
                }
                self.mem.read_target(addr, t)
            }
            Region::Apu => {
                self.sync_apu();
                self.mem.read_target(addr, t)
            }
            _ => self.mem.read_target(addr, t),
        };
        self.mem.mdr = value;
        value
    }

    pub fn write(&mut self, addr: u32, value: u8) {
        let t = self.mem.map.resolve(addr);
        self.mem.mdr = value;
        match t.region {
            Region::CpuIo => match t.offset {
                0x420B => self.dma.mdmaen = value,
                0x420C => self.dma.hdmaen = value,
                reg => {
                    let effect = self.io.write(reg as u16, value, &mut self.mem.ppu.timing);
                    self.apply(effect);
                }
            },
            Region::Dma => self.dma.write(t.offset as u8, value),
            Region::Apu => {
                self.sync_apu();
                self.mem.write_target(addr, t, value);
            }
            _ => self.mem.write_target(addr, t, value),
        }
    }

    fn apply(&mut self, effect: IoEffect) {
        match effect {
            IoEffect::None => {}
            IoEffect::Arithmetic(delay) => self.sched.schedule(self.ev.arithmetic, delay as i64),
            IoEffect::LatchCounters => self.mem.ppu.latch_counters(),
            IoEffect::NmiEnable => self.update_nmi_line(),
        }
    }

    pub fn status(&self) -> String {
        format!(
            "Frame: {}, Cycle: {}, Blocked: {:?}\nNMI: line={} pending={}, IRQ: {}, MDR: {:02X}\nMDMAEN: {:02X} HDMAEN: {:02X} NMITIMEN: {:02X}",
            self.frame,
            self.sched.cycle(),
            self.blocked,
            self.nmi_line,
            self.nmi_pending,
            self.io.timeup,
            self.mem.mdr,
            self.dma.mdmaen,
            self.dma.hdmaen,
            self.io.nmitimen
        )
    }
}

impl CpuBus for Bus {
    fn read_u8(&mut self, addr: u32) -> u8 {
        self.charge(addr);
        self.read(addr)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        self.charge(addr);
        self.write(addr, value);
    }

    fn idle(&mut self) {
        self.sched.add_relative(waitstate::FAST);
    }

    fn poll_nmi(&mut self) -> bool {
        self.nmi_pending && self.io.nmi_enabled()
    }

    fn acknowledge_nmi(&mut self) {
        self.nmi_pending = false;
    }

    fn poll_irq(&mut self) -> bool {
        self.io.timeup
    }

    fn idle_to_horizon(&mut self) {
        self.sched.skip_to_horizon();
    }
}
