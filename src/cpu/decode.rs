//! Opcode to micro-op lowering.
//!
//! The eight accumulator ALU groups (ORA AND EOR ADC STA LDA CMP SBC) share
//! one addressing layout keyed by the low five opcode bits; everything else is
//! listed explicitly.

use super::microcode::{Access, Cond, Implied, MicroOp, Mode, Op, Reg, Slot, Step};
use super::{Cpu, Interrupt};

use MicroOp::{Exec, Idle, Load, Operand, Pull, Push, Store};

const ALU_GROUP: [Op; 8] = [Op::Ora, Op::And, Op::Eor, Op::Adc, Op::Sta, Op::Lda, Op::Cmp, Op::Sbc];

impl Cpu {
    fn enqueue(&mut self, ops: &[MicroOp]) {
        self.queue.extend(ops.iter().copied());
    }

    fn immediate(&mut self, op: Op) {
        self.queue.push_back(Operand(Slot::Lo));
        if self.op_wide(op) {
            self.queue.push_back(Operand(Slot::Hi));
        }
        self.queue.push_back(Exec(Step::Read(op)));
    }

    fn memory(&mut self, mode: Mode, op: Op) {
        const OPERANDS: [Slot; 3] = [Slot::Op0, Slot::Op1, Slot::Op2];
        const POINTER: [Slot; 3] = [Slot::PtrLo, Slot::PtrHi, Slot::PtrBank];

        for slot in &OPERANDS[..mode.operand_bytes()] {
            self.queue.push_back(Operand(*slot));
        }
        let ptr = mode.pointer_bytes();
        if ptr > 0 {
            self.queue.push_back(Exec(Step::Pointer(mode)));
            for (i, slot) in POINTER[..ptr].iter().enumerate() {
                self.queue.push_back(Load(*slot, i as u8));
            }
        }

        let access = op.access();
        let wide = self.op_wide(op);
        self.queue.push_back(Exec(Step::Address(mode, access)));
        match access {
            Access::Read => {
                self.queue.push_back(Load(Slot::Lo, 0));
                if wide {
                    self.queue.push_back(Load(Slot::Hi, 1));
                }
                self.queue.push_back(Exec(Step::Read(op)));
            }
            Access::Write => {
                self.queue.push_back(Exec(Step::Write(op)));
                self.queue.push_back(Store(Slot::Lo, 0));
                if wide {
                    self.queue.push_back(Store(Slot::Hi, 1));
                }
            }
            Access::Modify => {
                self.queue.push_back(Load(Slot::Lo, 0));
                if wide {
                    self.queue.push_back(Load(Slot::Hi, 1));
                }
                self.queue.push_back(Idle);
                self.queue.push_back(Exec(Step::Modify(op)));
                // high byte goes out first
                if wide {
                    self.queue.push_back(Store(Slot::Hi, 1));
                }
                self.queue.push_back(Store(Slot::Lo, 0));
            }
        }
    }

    fn alu(&mut self, opcode: u8) {
        let op = ALU_GROUP[(opcode >> 5) as usize];
        let mode = match opcode & 0x1F {
            0x01 => Mode::DpIndX,
            0x03 => Mode::Sr,
            0x05 => Mode::Dp,
            0x07 => Mode::DpIndLong,
            0x0D => Mode::Abs,
            0x0F => Mode::Long,
            0x11 => Mode::DpIndY,
            0x12 => Mode::DpInd,
            0x13 => Mode::SrIndY,
            0x15 => Mode::DpX,
            0x17 => Mode::DpIndLongY,
            0x19 => Mode::AbsY,
            0x1D => Mode::AbsX,
            0x1F => Mode::LongX,
            _ => {
                // 0x09: immediate; $89 is BIT #
                let op = if op == Op::Sta { Op::BitImm } else { op };
                return self.immediate(op);
            }
        };
        self.memory(mode, op);
    }

    fn implied(&mut self, implied: Implied) {
        self.enqueue(&[Idle, Exec(Step::Implied(implied))]);
    }

    fn accumulator(&mut self, op: Op) {
        self.enqueue(&[Idle, Exec(Step::Accumulator(op))]);
    }

    fn reg_is_wide(&self, reg: Reg) -> bool {
        match reg {
            Reg::A => !self.regs.m8(),
            Reg::X | Reg::Y => !self.regs.x8(),
            Reg::D => true,
            Reg::P | Reg::Db | Reg::Pb => false,
        }
    }

    fn push_reg(&mut self, reg: Reg) {
        self.enqueue(&[Idle, Exec(Step::PushReg(reg))]);
        if self.reg_is_wide(reg) {
            self.queue.push_back(Push(Slot::Hi));
        }
        self.queue.push_back(Push(Slot::Lo));
    }

    fn pull_reg(&mut self, reg: Reg) {
        self.enqueue(&[Idle, Idle, Pull(Slot::Lo)]);
        if self.reg_is_wide(reg) {
            self.queue.push_back(Pull(Slot::Hi));
        }
        self.queue.push_back(Exec(Step::PullReg(reg)));
    }

    fn branch(&mut self, cond: Cond) {
        self.enqueue(&[Operand(Slot::Op0), Exec(Step::Branch(cond))]);
    }

    fn block_move(&mut self, increment: bool) {
        self.enqueue(&[
            Operand(Slot::Op0),
            Operand(Slot::Op1),
            Exec(Step::MoveSource),
            Load(Slot::Lo, 0),
            Exec(Step::MoveDest),
            Store(Slot::Lo, 0),
            Idle,
            Idle,
            Exec(Step::MoveNext(increment)),
        ]);
    }

    /// Lowers `opcode` into the micro-op queue. The opcode fetch itself has
    /// already happened.
    pub(super) fn decode(&mut self, opcode: u8) {
        match opcode {
            // interrupts and control flow
            0x00 => self.enqueue(&[Operand(Slot::Op0), Exec(Step::Software(Interrupt::Brk))]),
            0x02 => self.enqueue(&[Operand(Slot::Op0), Exec(Step::Software(Interrupt::Cop))]),
            0x40 => {
                self.enqueue(&[Idle, Idle, Pull(Slot::Op0), Pull(Slot::Lo), Pull(Slot::Hi)]);
                if !self.regs.emulation {
                    self.queue.push_back(Pull(Slot::PtrBank));
                }
                self.queue.push_back(Exec(Step::ReturnInterrupt));
            }
            0x60 => self.enqueue(&[Idle, Idle, Pull(Slot::Lo), Pull(Slot::Hi), Idle, Exec(Step::Return)]),
            0x6B => self.enqueue(&[
                Idle,
                Idle,
                Pull(Slot::Lo),
                Pull(Slot::Hi),
                Pull(Slot::PtrBank),
                Exec(Step::ReturnLong),
            ]),
            0x20 => self.enqueue(&[
                Operand(Slot::Op0),
                Operand(Slot::Op1),
                Idle,
                Exec(Step::StageReturn(1)),
                Push(Slot::Hi),
                Push(Slot::Lo),
                Exec(Step::JumpAbs),
            ]),
            0x22 => self.enqueue(&[
                Operand(Slot::Op0),
                Operand(Slot::Op1),
                Exec(Step::StageBank),
                Push(Slot::PtrBank),
                Idle,
                Operand(Slot::Op2),
                Exec(Step::StageReturn(1)),
                Push(Slot::Hi),
                Push(Slot::Lo),
                Exec(Step::JumpLong),
            ]),
            0xFC => self.enqueue(&[
                Operand(Slot::Op0),
                Exec(Step::StageReturn(0)),
                Push(Slot::Hi),
                Push(Slot::Lo),
                Operand(Slot::Op1),
                Idle,
                Exec(Step::PointAbsIndexed),
                Load(Slot::PtrLo, 0),
                Load(Slot::PtrHi, 1),
                Exec(Step::JumpPtr),
            ]),
            0x4C => self.enqueue(&[Operand(Slot::Op0), Operand(Slot::Op1), Exec(Step::JumpAbs)]),
            0x5C => self.enqueue(&[
                Operand(Slot::Op0),
                Operand(Slot::Op1),
                Operand(Slot::Op2),
                Exec(Step::JumpLong),
            ]),
            0x6C => self.enqueue(&[
                Operand(Slot::Op0),
                Operand(Slot::Op1),
                Exec(Step::PointAbsIndirect),
                Load(Slot::PtrLo, 0),
                Load(Slot::PtrHi, 1),
                Exec(Step::JumpPtr),
            ]),
            0x7C => self.enqueue(&[
                Operand(Slot::Op0),
                Operand(Slot::Op1),
                Idle,
                Exec(Step::PointAbsIndexed),
                Load(Slot::PtrLo, 0),
                Load(Slot::PtrHi, 1),
                Exec(Step::JumpPtr),
            ]),
            0xDC => self.enqueue(&[
                Operand(Slot::Op0),
                Operand(Slot::Op1),
                Exec(Step::PointAbsIndirect),
                Load(Slot::PtrLo, 0),
                Load(Slot::PtrHi, 1),
                Load(Slot::PtrBank, 2),
                Exec(Step::JumpPtrLong),
            ]),

            // branches
            0x10 => self.branch(Cond::Plus),
            0x30 => self.branch(Cond::Minus),
            0x50 => self.branch(Cond::OverflowClear),
            0x70 => self.branch(Cond::OverflowSet),
            0x90 => self.branch(Cond::CarryClear),
            0xB0 => self.branch(Cond::CarrySet),
            0xD0 => self.branch(Cond::NotEqual),
            0xF0 => self.branch(Cond::Equal),
            0x80 => self.branch(Cond::Always),
            0x82 => self.enqueue(&[Operand(Slot::Op0), Operand(Slot::Op1), Idle, Exec(Step::BranchLong)]),

            // read-modify-write
            0x04 => self.memory(Mode::Dp, Op::Tsb),
            0x0C => self.memory(Mode::Abs, Op::Tsb),
            0x14 => self.memory(Mode::Dp, Op::Trb),
            0x1C => self.memory(Mode::Abs, Op::Trb),
            0x06 => self.memory(Mode::Dp, Op::Asl),
            0x0E => self.memory(Mode::Abs, Op::Asl),
            0x16 => self.memory(Mode::DpX, Op::Asl),
            0x1E => self.memory(Mode::AbsX, Op::Asl),
            0x26 => self.memory(Mode::Dp, Op::Rol),
            0x2E => self.memory(Mode::Abs, Op::Rol),
            0x36 => self.memory(Mode::DpX, Op::Rol),
            0x3E => self.memory(Mode::AbsX, Op::Rol),
            0x46 => self.memory(Mode::Dp, Op::Lsr),
            0x4E => self.memory(Mode::Abs, Op::Lsr),
            0x56 => self.memory(Mode::DpX, Op::Lsr),
            0x5E => self.memory(Mode::AbsX, Op::Lsr),
            0x66 => self.memory(Mode::Dp, Op::Ror),
            0x6E => self.memory(Mode::Abs, Op::Ror),
            0x76 => self.memory(Mode::DpX, Op::Ror),
            0x7E => self.memory(Mode::AbsX, Op::Ror),
            0xC6 => self.memory(Mode::Dp, Op::Dec),
            0xCE => self.memory(Mode::Abs, Op::Dec),
            0xD6 => self.memory(Mode::DpX, Op::Dec),
            0xDE => self.memory(Mode::AbsX, Op::Dec),
            0xE6 => self.memory(Mode::Dp, Op::Inc),
            0xEE => self.memory(Mode::Abs, Op::Inc),
            0xF6 => self.memory(Mode::DpX, Op::Inc),
            0xFE => self.memory(Mode::AbsX, Op::Inc),
            0x0A => self.accumulator(Op::Asl),
            0x2A => self.accumulator(Op::Rol),
            0x4A => self.accumulator(Op::Lsr),
            0x6A => self.accumulator(Op::Ror),
            0x1A => self.accumulator(Op::Inc),
            0x3A => self.accumulator(Op::Dec),

            // BIT, STZ and the index register loads/stores/compares
            0x24 => self.memory(Mode::Dp, Op::Bit),
            0x2C => self.memory(Mode::Abs, Op::Bit),
            0x34 => self.memory(Mode::DpX, Op::Bit),
            0x3C => self.memory(Mode::AbsX, Op::Bit),
            0x64 => self.memory(Mode::Dp, Op::Stz),
            0x74 => self.memory(Mode::DpX, Op::Stz),
            0x9C => self.memory(Mode::Abs, Op::Stz),
            0x9E => self.memory(Mode::AbsX, Op::Stz),
            0x84 => self.memory(Mode::Dp, Op::Sty),
            0x8C => self.memory(Mode::Abs, Op::Sty),
            0x94 => self.memory(Mode::DpX, Op::Sty),
            0x86 => self.memory(Mode::Dp, Op::Stx),
            0x8E => self.memory(Mode::Abs, Op::Stx),
            0x96 => self.memory(Mode::DpY, Op::Stx),
            0xA0 => self.immediate(Op::Ldy),
            0xA4 => self.memory(Mode::Dp, Op::Ldy),
            0xAC => self.memory(Mode::Abs, Op::Ldy),
            0xB4 => self.memory(Mode::DpX, Op::Ldy),
            0xBC => self.memory(Mode::AbsX, Op::Ldy),
            0xA2 => self.immediate(Op::Ldx),
            0xA6 => self.memory(Mode::Dp, Op::Ldx),
            0xAE => self.memory(Mode::Abs, Op::Ldx),
            0xB6 => self.memory(Mode::DpY, Op::Ldx),
            0xBE => self.memory(Mode::AbsY, Op::Ldx),
            0xC0 => self.immediate(Op::Cpy),
            0xC4 => self.memory(Mode::Dp, Op::Cpy),
            0xCC => self.memory(Mode::Abs, Op::Cpy),
            0xE0 => self.immediate(Op::Cpx),
            0xE4 => self.memory(Mode::Dp, Op::Cpx),
            0xEC => self.memory(Mode::Abs, Op::Cpx),

            // implied
            0x18 => self.implied(Implied::Clc),
            0x38 => self.implied(Implied::Sec),
            0x58 => self.implied(Implied::Cli),
            0x78 => self.implied(Implied::Sei),
            0xB8 => self.implied(Implied::Clv),
            0xD8 => self.implied(Implied::Cld),
            0xF8 => self.implied(Implied::Sed),
            0xAA => self.implied(Implied::Tax),
            0xA8 => self.implied(Implied::Tay),
            0x8A => self.implied(Implied::Txa),
            0x98 => self.implied(Implied::Tya),
            0xBA => self.implied(Implied::Tsx),
            0x9A => self.implied(Implied::Txs),
            0x9B => self.implied(Implied::Txy),
            0xBB => self.implied(Implied::Tyx),
            0x5B => self.implied(Implied::Tcd),
            0x7B => self.implied(Implied::Tdc),
            0x1B => self.implied(Implied::Tcs),
            0x3B => self.implied(Implied::Tsc),
            0xE8 => self.implied(Implied::Inx),
            0xC8 => self.implied(Implied::Iny),
            0xCA => self.implied(Implied::Dex),
            0x88 => self.implied(Implied::Dey),
            0xFB => self.implied(Implied::Xce),
            0xEA => self.implied(Implied::Nop),
            0xEB => self.enqueue(&[Idle, Idle, Exec(Step::Implied(Implied::Xba))]),
            0x42 => self.queue.push_back(Operand(Slot::Op0)),

            // stack
            0x48 => self.push_reg(Reg::A),
            0xDA => self.push_reg(Reg::X),
            0x5A => self.push_reg(Reg::Y),
            0x08 => self.push_reg(Reg::P),
            0x8B => self.push_reg(Reg::Db),
            0x4B => self.push_reg(Reg::Pb),
            0x0B => self.push_reg(Reg::D),
            0x68 => self.pull_reg(Reg::A),
            0xFA => self.pull_reg(Reg::X),
            0x7A => self.pull_reg(Reg::Y),
            0x28 => self.pull_reg(Reg::P),
            0xAB => self.pull_reg(Reg::Db),
            0x2B => self.pull_reg(Reg::D),
            0xF4 => self.enqueue(&[Operand(Slot::Lo), Operand(Slot::Hi), Push(Slot::Hi), Push(Slot::Lo)]),
            0xD4 => self.enqueue(&[
                Operand(Slot::Op0),
                Exec(Step::Pointer(Mode::DpInd)),
                Load(Slot::Lo, 0),
                Load(Slot::Hi, 1),
                Push(Slot::Hi),
                Push(Slot::Lo),
            ]),
            0x62 => self.enqueue(&[
                Operand(Slot::Lo),
                Operand(Slot::Hi),
                Idle,
                Exec(Step::StageRelative),
                Push(Slot::Hi),
                Push(Slot::Lo),
            ]),

            // processor control
            0xC2 => self.enqueue(&[Operand(Slot::Op0), Idle, Exec(Step::Rep)]),
            0xE2 => self.enqueue(&[Operand(Slot::Op0), Idle, Exec(Step::Sep)]),
            0xCB => self.enqueue(&[Idle, Idle, Exec(Step::Wait)]),
            0xDB => self.enqueue(&[Idle, Idle, Exec(Step::Stop)]),
            0x54 => self.block_move(true),
            0x44 => self.block_move(false),

            _ => self.alu(opcode),
        }
    }
}
