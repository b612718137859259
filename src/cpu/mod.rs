//! 65C816 core stepped one bus cycle at a time.
//!
//! An instruction is lowered into a queue of micro-ops at fetch; [`Cpu::step`]
//! performs exactly one bus operation (or internal cycle) and the zero-cost
//! continuations that follow it. An empty queue means the next step fetches
//! an opcode, which is also where interrupts are taken.

use bitflags::bitflags;
use std::collections::VecDeque;
use std::fmt;

use crate::cpu_bus::CpuBus;
use crate::debug_flags;

mod alu;
mod decode;
pub mod microcode;

#[cfg(test)]
mod tests;

use microcode::{Access, Cond, Implied, Latch, MicroOp, Mode, Op, Reg, Slot, Step, WRAP_BANK, WRAP_LONG};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY = 0x01;
        const ZERO = 0x02;
        const IRQ_DISABLE = 0x04;
        const DECIMAL = 0x08;
        const INDEX_8BIT = 0x10;
        const MEMORY_8BIT = 0x20;
        const OVERFLOW = 0x40;
        const NEGATIVE = 0x80;
    }
}

/// In emulation mode bit 4 of the pushed status byte is the B flag.
const BREAK_BIT: u8 = 0x10;

pub const RESET_VECTOR: u16 = 0xFFFC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cop,
    Brk,
    Abort,
    Nmi,
    Irq,
}

impl Interrupt {
    pub fn vector(self, emulation: bool) -> u16 {
        match (self, emulation) {
            (Interrupt::Cop, true) => 0xFFF4,
            (Interrupt::Abort, true) => 0xFFF8,
            (Interrupt::Nmi, true) => 0xFFFA,
            (Interrupt::Brk | Interrupt::Irq, true) => 0xFFFE,
            (Interrupt::Cop, false) => 0xFFE4,
            (Interrupt::Brk, false) => 0xFFE6,
            (Interrupt::Abort, false) => 0xFFE8,
            (Interrupt::Nmi, false) => 0xFFEA,
            (Interrupt::Irq, false) => 0xFFEE,
        }
    }

    fn is_software(self) -> bool {
        matches!(self, Interrupt::Brk | Interrupt::Cop)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    pub a: u16,
    pub x: u16,
    pub y: u16,
    pub s: u16,
    pub d: u16,
    pub db: u8,
    pub pb: u8,
    pub pc: u16,
    pub p: StatusFlags,
    pub emulation: bool,
}

impl Default for Registers {
    /// State after /RESET.
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            s: 0x01FF,
            d: 0,
            db: 0,
            pb: 0,
            pc: 0,
            p: StatusFlags::IRQ_DISABLE | StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT,
            emulation: true,
        }
    }
}

impl Registers {
    pub fn m8(&self) -> bool {
        self.p.contains(StatusFlags::MEMORY_8BIT)
    }

    pub fn x8(&self) -> bool {
        self.p.contains(StatusFlags::INDEX_8BIT)
    }

    pub fn pc24(&self) -> u32 {
        ((self.pb as u32) << 16) | self.pc as u32
    }

    /// Loads P, keeping M/X forced in emulation mode and dropping the index
    /// high bytes when X becomes 8-bit.
    pub fn set_p(&mut self, value: u8) {
        self.p = StatusFlags::from_bits_retain(value);
        if self.emulation {
            self.p.insert(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT);
        }
        if self.x8() {
            self.x &= 0xFF;
            self.y &= 0xFF;
        }
    }

    pub fn set_emulation(&mut self, emulation: bool) {
        self.emulation = emulation;
        if emulation {
            self.set_p(self.p.bits());
            self.s = 0x0100 | (self.s & 0xFF);
        }
    }

    fn push_s(&mut self) {
        self.s = if self.emulation {
            0x0100 | (self.s.wrapping_sub(1) & 0xFF)
        } else {
            self.s.wrapping_sub(1)
        };
    }

    fn pull_s(&mut self) {
        self.s = if self.emulation {
            0x0100 | (self.s.wrapping_add(1) & 0xFF)
        } else {
            self.s.wrapping_add(1)
        };
    }

    fn condition(&self, cond: Cond) -> bool {
        let p = self.p;
        match cond {
            Cond::Plus => !p.contains(StatusFlags::NEGATIVE),
            Cond::Minus => p.contains(StatusFlags::NEGATIVE),
            Cond::OverflowClear => !p.contains(StatusFlags::OVERFLOW),
            Cond::OverflowSet => p.contains(StatusFlags::OVERFLOW),
            Cond::CarryClear => !p.contains(StatusFlags::CARRY),
            Cond::CarrySet => p.contains(StatusFlags::CARRY),
            Cond::NotEqual => !p.contains(StatusFlags::ZERO),
            Cond::Equal => p.contains(StatusFlags::ZERO),
            Cond::Always => true,
        }
    }
}

pub struct Cpu {
    pub regs: Registers,
    queue: VecDeque<MicroOp>,
    latch: Latch,
    pub opcode: u8,
    /// PB:PC of the instruction in flight.
    pub instruction_addr: u32,
    /// WAI: resumes on NMI or on the IRQ line, even with I set.
    pub waiting: bool,
    /// STP: only reset recovers.
    pub stopped: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            queue: VecDeque::with_capacity(16),
            latch: Latch::default(),
            opcode: 0,
            instruction_addr: 0,
            waiting: false,
            stopped: false,
        }
    }

    /// `entry` is the word at 00:FFFC.
    pub fn reset(&mut self, entry: u16) {
        self.regs = Registers {
            pc: entry,
            ..Registers::default()
        };
        self.queue.clear();
        self.latch = Latch::default();
        self.instruction_addr = self.regs.pc24();
        self.waiting = false;
        self.stopped = false;
    }

    /// True between instructions.
    pub fn at_fetch(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn halted(&self) -> bool {
        self.waiting || self.stopped
    }

    pub fn step<B: CpuBus>(&mut self, bus: &mut B) {
        if self.stopped {
            bus.idle_to_horizon();
            return;
        }
        if self.waiting {
            if !(bus.poll_nmi() || bus.poll_irq()) {
                bus.idle_to_horizon();
                return;
            }
            self.waiting = false;
        }

        self.run_exec();
        if self.queue.is_empty() {
            match self.poll_interrupt(bus) {
                Some(kind) => self.queue_interrupt(kind),
                None => {
                    self.fetch(bus);
                    self.run_exec();
                    return;
                }
            }
        }
        if let Some(op) = self.queue.pop_front() {
            self.bus_op(op, bus);
        }
        self.run_exec();
    }

    /// Services a pending NMI or IRQ ahead of the next fetch. Returns false
    /// when mid-instruction or when nothing is pending.
    pub fn take_interrupt<B: CpuBus>(&mut self, bus: &mut B) -> bool {
        if !self.at_fetch() || self.stopped {
            return false;
        }
        match self.poll_interrupt(bus) {
            Some(kind) => {
                self.waiting = false;
                self.queue_interrupt(kind);
                true
            }
            None => false,
        }
    }

    fn poll_interrupt<B: CpuBus>(&mut self, bus: &mut B) -> Option<Interrupt> {
        if bus.poll_nmi() {
            bus.acknowledge_nmi();
            if debug_flags::irq() {
                log::debug!("NMI taken at {:06X}", self.regs.pc24());
            }
            return Some(Interrupt::Nmi);
        }
        if bus.poll_irq() && !self.regs.p.contains(StatusFlags::IRQ_DISABLE) {
            if debug_flags::irq() {
                log::debug!("IRQ taken at {:06X}", self.regs.pc24());
            }
            return Some(Interrupt::Irq);
        }
        None
    }

    fn queue_interrupt(&mut self, kind: Interrupt) {
        self.instruction_addr = self.regs.pc24();
        self.queue.push_back(MicroOp::Idle);
        self.queue.push_back(MicroOp::Idle);
        self.queue_entry(kind);
    }

    /// Pushes PB (native only), PC and P, then loads the vector from bank 0.
    fn queue_entry(&mut self, kind: Interrupt) {
        let mut p = self.regs.p.bits();
        if self.regs.emulation {
            if kind.is_software() {
                p |= BREAK_BIT;
            } else {
                p &= !BREAK_BIT;
            }
        }
        self.latch.set(Slot::PtrBank, self.regs.pb);
        self.latch.set_word(Slot::Lo, Slot::Hi, self.regs.pc);
        self.latch.set(Slot::Op2, p);

        if !self.regs.emulation {
            self.queue.push_back(MicroOp::Push(Slot::PtrBank));
        }
        self.queue.extend([
            MicroOp::Push(Slot::Hi),
            MicroOp::Push(Slot::Lo),
            MicroOp::Push(Slot::Op2),
            MicroOp::Exec(Step::Vector(kind.vector(self.regs.emulation))),
            MicroOp::Load(Slot::Lo, 0),
            MicroOp::Load(Slot::Hi, 1),
            MicroOp::Exec(Step::JumpVector),
        ]);
    }

    fn fetch<B: CpuBus>(&mut self, bus: &mut B) {
        self.instruction_addr = self.regs.pc24();
        let opcode = bus.read_u8(self.instruction_addr);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.opcode = opcode;
        if debug_flags::trace() {
            log::trace!(
                "{:02X}:{:04X} {:02X} A:{:04X} X:{:04X} Y:{:04X} S:{:04X} P:{:02X}",
                self.instruction_addr >> 16,
                self.instruction_addr & 0xFFFF,
                opcode,
                self.regs.a,
                self.regs.x,
                self.regs.y,
                self.regs.s,
                self.regs.p.bits()
            );
        }
        self.decode(opcode);
    }

    fn run_exec(&mut self) {
        while let Some(MicroOp::Exec(step)) = self.queue.front().copied() {
            self.queue.pop_front();
            self.exec(step);
        }
    }

    fn bus_op<B: CpuBus>(&mut self, op: MicroOp, bus: &mut B) {
        match op {
            MicroOp::Operand(slot) => {
                let value = bus.read_u8(self.regs.pc24());
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.latch.set(slot, value);
            }
            MicroOp::Load(slot, offset) => {
                let value = bus.read_u8(self.latch.target(offset));
                self.latch.set(slot, value);
            }
            MicroOp::Store(slot, offset) => bus.write_u8(self.latch.target(offset), self.latch.get(slot)),
            MicroOp::Push(slot) => {
                bus.write_u8(self.regs.s as u32, self.latch.get(slot));
                self.regs.push_s();
            }
            MicroOp::Pull(slot) => {
                self.regs.pull_s();
                let value = bus.read_u8(self.regs.s as u32);
                self.latch.set(slot, value);
            }
            MicroOp::Idle => bus.idle(),
            MicroOp::Exec(step) => self.exec(step),
        }
    }

    fn idle_front(&mut self) {
        self.queue.push_front(MicroOp::Idle);
    }

    /// Extra cycle when DL is not zero.
    fn direct_penalty(&mut self) {
        if self.regs.d & 0xFF != 0 {
            self.idle_front();
        }
    }

    /// Direct page address; indexed accesses stay inside the page in
    /// emulation mode when DL is zero.
    fn direct(&self, offset: u16, index: u16) -> u32 {
        let d = self.regs.d;
        if self.regs.emulation && d & 0xFF == 0 {
            (d | (offset.wrapping_add(index) & 0xFF)) as u32
        } else {
            d.wrapping_add(offset).wrapping_add(index) as u32
        }
    }

    fn indexed(&mut self, base: u32, index: u16, access: Access) {
        let target = base.wrapping_add(index as u32) & WRAP_LONG;
        let penalty = match access {
            Access::Read => !self.regs.x8() || (base ^ target) & 0xFF00 != 0,
            Access::Write | Access::Modify => true,
        };
        if penalty {
            self.idle_front();
        }
        self.latch.point(target, WRAP_LONG);
    }

    fn resolve(&mut self, mode: Mode, access: Access) {
        let op0 = self.latch.get(Slot::Op0) as u16;
        let abs = self.latch.word(Slot::Op0, Slot::Op1) as u32;
        let long = ((self.latch.get(Slot::Op2) as u32) << 16) | abs;
        let ptr = self.latch.word(Slot::PtrLo, Slot::PtrHi) as u32;
        let ptr_long = ((self.latch.get(Slot::PtrBank) as u32) << 16) | ptr;
        let db = (self.regs.db as u32) << 16;
        let (x, y) = (self.regs.x, self.regs.y);

        match mode {
            Mode::Abs => self.latch.point(db | abs, WRAP_LONG),
            Mode::AbsX => self.indexed(db | abs, x, access),
            Mode::AbsY => self.indexed(db | abs, y, access),
            Mode::Long => self.latch.point(long, WRAP_LONG),
            Mode::LongX => self.latch.point(long.wrapping_add(x as u32), WRAP_LONG),
            Mode::Dp => {
                self.direct_penalty();
                let addr = self.direct(op0, 0);
                self.latch.point(addr, WRAP_BANK);
            }
            Mode::DpX | Mode::DpY => {
                let index = if mode == Mode::DpX { x } else { y };
                self.idle_front();
                self.direct_penalty();
                let addr = self.direct(op0, index);
                self.latch.point(addr, WRAP_BANK);
            }
            Mode::DpInd | Mode::DpIndX => self.latch.point(db | ptr, WRAP_LONG),
            Mode::DpIndY => self.indexed(db | ptr, y, access),
            Mode::DpIndLong => self.latch.point(ptr_long, WRAP_LONG),
            Mode::DpIndLongY => self.latch.point(ptr_long.wrapping_add(y as u32), WRAP_LONG),
            Mode::Sr => {
                self.idle_front();
                self.latch.point(self.regs.s.wrapping_add(op0) as u32, WRAP_BANK);
            }
            Mode::SrIndY => {
                self.idle_front();
                self.latch.point((db | ptr).wrapping_add(y as u32), WRAP_LONG);
            }
        }
    }

    fn exec(&mut self, step: Step) {
        match step {
            Step::Pointer(mode) => {
                let op0 = self.latch.get(Slot::Op0) as u16;
                let addr = match mode {
                    Mode::SrIndY => {
                        self.idle_front();
                        self.regs.s.wrapping_add(op0) as u32
                    }
                    Mode::DpIndX => {
                        self.idle_front();
                        self.direct_penalty();
                        self.direct(op0, self.regs.x)
                    }
                    _ => {
                        self.direct_penalty();
                        self.direct(op0, 0)
                    }
                };
                self.latch.point(addr, WRAP_BANK);
            }
            Step::Address(mode, access) => self.resolve(mode, access),
            Step::Read(op) => {
                let wide = self.op_wide(op);
                let value = self.latch.word(Slot::Lo, Slot::Hi);
                self.regs.apply_read(op, value, wide);
            }
            Step::Write(op) => {
                let value = self.regs.store_value(op);
                self.latch.set_word(Slot::Lo, Slot::Hi, value);
            }
            Step::Modify(op) => {
                let wide = self.op_wide(op);
                let value = self.latch.word(Slot::Lo, Slot::Hi);
                let result = self.regs.apply_modify(op, value, wide);
                self.latch.set_word(Slot::Lo, Slot::Hi, result);
            }
            Step::Accumulator(op) => {
                let wide = !self.regs.m8();
                let result = self.regs.apply_modify(op, self.regs.a, wide);
                self.regs.set_a(result, wide);
            }
            Step::Implied(implied) => self.implied_op(implied),
            Step::PushReg(reg) => {
                let r = &self.regs;
                let value = match reg {
                    Reg::A => r.a,
                    Reg::X => r.x,
                    Reg::Y => r.y,
                    Reg::P => r.p.bits() as u16,
                    Reg::Db => r.db as u16,
                    Reg::Pb => r.pb as u16,
                    Reg::D => r.d,
                };
                self.latch.set_word(Slot::Lo, Slot::Hi, value);
            }
            Step::PullReg(reg) => self.pull_reg_value(reg),
            Step::Branch(cond) => {
                if self.regs.condition(cond) {
                    let offset = self.latch.get(Slot::Op0) as i8 as i16 as u16;
                    let target = self.regs.pc.wrapping_add(offset);
                    if self.regs.emulation && (target ^ self.regs.pc) & 0xFF00 != 0 {
                        self.idle_front();
                    }
                    self.idle_front();
                    self.regs.pc = target;
                }
            }
            Step::BranchLong => {
                let offset = self.latch.word(Slot::Op0, Slot::Op1);
                self.regs.pc = self.regs.pc.wrapping_add(offset);
            }
            Step::StageReturn(back) => {
                let ret = self.regs.pc.wrapping_sub(back);
                self.latch.set_word(Slot::Lo, Slot::Hi, ret);
            }
            Step::StageBank => self.latch.set(Slot::PtrBank, self.regs.pb),
            Step::StageRelative => {
                let offset = self.latch.word(Slot::Lo, Slot::Hi);
                let value = self.regs.pc.wrapping_add(offset);
                self.latch.set_word(Slot::Lo, Slot::Hi, value);
            }
            Step::PointAbsIndirect => {
                let addr = self.latch.word(Slot::Op0, Slot::Op1) as u32;
                self.latch.point(addr, WRAP_BANK);
            }
            Step::PointAbsIndexed => {
                let offset = self.latch.word(Slot::Op0, Slot::Op1).wrapping_add(self.regs.x);
                self.latch.point(((self.regs.pb as u32) << 16) | offset as u32, WRAP_BANK);
            }
            Step::JumpAbs => self.regs.pc = self.latch.word(Slot::Op0, Slot::Op1),
            Step::JumpLong => {
                self.regs.pc = self.latch.word(Slot::Op0, Slot::Op1);
                self.regs.pb = self.latch.get(Slot::Op2);
            }
            Step::JumpPtr => self.regs.pc = self.latch.word(Slot::PtrLo, Slot::PtrHi),
            Step::JumpPtrLong => {
                self.regs.pc = self.latch.word(Slot::PtrLo, Slot::PtrHi);
                self.regs.pb = self.latch.get(Slot::PtrBank);
            }
            Step::Return => self.regs.pc = self.latch.word(Slot::Lo, Slot::Hi).wrapping_add(1),
            Step::ReturnLong => {
                self.regs.pc = self.latch.word(Slot::Lo, Slot::Hi).wrapping_add(1);
                self.regs.pb = self.latch.get(Slot::PtrBank);
            }
            Step::ReturnInterrupt => {
                self.regs.set_p(self.latch.get(Slot::Op0));
                self.regs.pc = self.latch.word(Slot::Lo, Slot::Hi);
                if !self.regs.emulation {
                    self.regs.pb = self.latch.get(Slot::PtrBank);
                }
            }
            Step::Software(kind) => self.queue_entry(kind),
            Step::Vector(vector) => {
                self.regs.p.insert(StatusFlags::IRQ_DISABLE);
                self.regs.p.remove(StatusFlags::DECIMAL);
                self.latch.point(vector as u32, WRAP_BANK);
            }
            Step::JumpVector => {
                self.regs.pc = self.latch.word(Slot::Lo, Slot::Hi);
                self.regs.pb = 0;
            }
            Step::Rep => {
                let bits = self.regs.p.bits() & !self.latch.get(Slot::Op0);
                self.regs.set_p(bits);
            }
            Step::Sep => {
                let bits = self.regs.p.bits() | self.latch.get(Slot::Op0);
                self.regs.set_p(bits);
            }
            Step::MoveSource => {
                let bank = self.latch.get(Slot::Op1) as u32;
                self.latch.point((bank << 16) | self.regs.x as u32, WRAP_LONG);
            }
            Step::MoveDest => {
                let bank = self.latch.get(Slot::Op0);
                self.regs.db = bank;
                self.latch.point(((bank as u32) << 16) | self.regs.y as u32, WRAP_LONG);
            }
            Step::MoveNext(increment) => {
                let delta = if increment { 1 } else { 0xFFFF };
                self.regs.x = self.regs.index_value(self.regs.x.wrapping_add(delta));
                self.regs.y = self.regs.index_value(self.regs.y.wrapping_add(delta));
                self.regs.a = self.regs.a.wrapping_sub(1);
                if self.regs.a != 0xFFFF {
                    self.regs.pc = self.regs.pc.wrapping_sub(3);
                }
            }
            Step::Wait => self.waiting = true,
            Step::Stop => self.stopped = true,
        }
    }

    fn op_wide(&self, op: Op) -> bool {
        if op.is_index() {
            !self.regs.x8()
        } else {
            !self.regs.m8()
        }
    }

    fn pull_reg_value(&mut self, reg: Reg) {
        let value = self.latch.word(Slot::Lo, Slot::Hi);
        let r = &mut self.regs;
        match reg {
            Reg::A => {
                let wide = !r.m8();
                r.set_a(value, wide);
                r.set_nz(value, wide);
            }
            Reg::X => {
                r.x = r.index_value(value);
                r.set_nz(r.x, !r.x8());
            }
            Reg::Y => {
                r.y = r.index_value(value);
                r.set_nz(r.y, !r.x8());
            }
            Reg::P => r.set_p(value as u8),
            Reg::Db => {
                r.db = value as u8;
                r.set_nz(value, false);
            }
            Reg::D => {
                r.d = value;
                r.set_nz(value, true);
            }
            Reg::Pb => {}
        }
    }

    fn implied_op(&mut self, implied: Implied) {
        let r = &mut self.regs;
        let x_wide = !r.x8();
        let m_wide = !r.m8();
        match implied {
            Implied::Clc => r.p.remove(StatusFlags::CARRY),
            Implied::Sec => r.p.insert(StatusFlags::CARRY),
            Implied::Cli => r.p.remove(StatusFlags::IRQ_DISABLE),
            Implied::Sei => r.p.insert(StatusFlags::IRQ_DISABLE),
            Implied::Clv => r.p.remove(StatusFlags::OVERFLOW),
            Implied::Cld => r.p.remove(StatusFlags::DECIMAL),
            Implied::Sed => r.p.insert(StatusFlags::DECIMAL),
            Implied::Tax => {
                r.x = r.index_value(r.a);
                r.set_nz(r.x, x_wide);
            }
            Implied::Tay => {
                r.y = r.index_value(r.a);
                r.set_nz(r.y, x_wide);
            }
            Implied::Txa => {
                r.set_a(r.x, m_wide);
                r.set_nz(r.a, m_wide);
            }
            Implied::Tya => {
                r.set_a(r.y, m_wide);
                r.set_nz(r.a, m_wide);
            }
            Implied::Tsx => {
                r.x = r.index_value(r.s);
                r.set_nz(r.x, x_wide);
            }
            Implied::Txs => {
                r.s = if r.emulation { 0x0100 | (r.x & 0xFF) } else { r.x };
            }
            Implied::Txy => {
                r.y = r.x;
                r.set_nz(r.y, x_wide);
            }
            Implied::Tyx => {
                r.x = r.y;
                r.set_nz(r.x, x_wide);
            }
            Implied::Tcd => {
                r.d = r.a;
                r.set_nz(r.d, true);
            }
            Implied::Tdc => {
                r.a = r.d;
                r.set_nz(r.a, true);
            }
            Implied::Tcs => {
                r.s = if r.emulation { 0x0100 | (r.a & 0xFF) } else { r.a };
            }
            Implied::Tsc => {
                r.a = r.s;
                r.set_nz(r.a, true);
            }
            Implied::Inx => {
                r.x = r.index_value(r.x.wrapping_add(1));
                r.set_nz(r.x, x_wide);
            }
            Implied::Iny => {
                r.y = r.index_value(r.y.wrapping_add(1));
                r.set_nz(r.y, x_wide);
            }
            Implied::Dex => {
                r.x = r.index_value(r.x.wrapping_sub(1));
                r.set_nz(r.x, x_wide);
            }
            Implied::Dey => {
                r.y = r.index_value(r.y.wrapping_sub(1));
                r.set_nz(r.y, x_wide);
            }
            Implied::Xce => {
                let carry = r.p.contains(StatusFlags::CARRY);
                r.p.set(StatusFlags::CARRY, r.emulation);
                r.set_emulation(carry);
            }
            Implied::Xba => {
                r.a = r.a.rotate_left(8);
                r.set_nz(r.a, false);
            }
            Implied::Nop => {}
        }
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(StatusFlags, char); 8] = [
            (StatusFlags::NEGATIVE, 'N'),
            (StatusFlags::OVERFLOW, 'V'),
            (StatusFlags::MEMORY_8BIT, 'M'),
            (StatusFlags::INDEX_8BIT, 'X'),
            (StatusFlags::DECIMAL, 'D'),
            (StatusFlags::IRQ_DISABLE, 'I'),
            (StatusFlags::ZERO, 'Z'),
            (StatusFlags::CARRY, 'C'),
        ];
        for (flag, name) in NAMES {
            let c = if self.contains(flag) { name } else { name.to_ascii_lowercase() };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.regs;
        writeln!(f, "A: {:04X},  X: {:04X},  Y: {:04X}", r.a, r.x, r.y)?;
        writeln!(
            f,
            "S: {:04X},  D: {:04X}, DB: {:02X}, PC: {:02X}:{:04X}",
            r.s, r.d, r.db, r.pb, r.pc
        )?;
        writeln!(f, "P: {}, E: {}", r.p, r.emulation)?;
        write!(f, "Wait: {}, Stop: {}", self.waiting, self.stopped)
    }
}
