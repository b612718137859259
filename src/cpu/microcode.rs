//! Bus-cycle granular operations for the 65C816.
//!
//! Every instruction is lowered into a short queue of [`MicroOp`]s. Each
//! non-`Exec` op is exactly one bus access (or one internal cycle); `Exec`
//! steps are instant and may push penalty cycles onto the front of the queue.

/// Index into the instruction latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Op0,
    Op1,
    Op2,
    Lo,
    Hi,
    PtrLo,
    PtrHi,
    PtrBank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicroOp {
    /// Read PB:PC into the slot, then PC += 1.
    Operand(Slot),
    /// Read the latched address plus offset.
    Load(Slot, u8),
    /// Write the slot to the latched address plus offset.
    Store(Slot, u8),
    Push(Slot),
    Pull(Slot),
    /// Internal operation, one FAST cycle.
    Idle,
    /// Zero-cost continuation.
    Exec(Step),
}

pub const WRAP_LONG: u32 = 0xFF_FFFF;
pub const WRAP_BANK: u32 = 0x00_FFFF;

/// Operand bytes, data bytes and the effective address of the instruction
/// in flight.
#[derive(Debug, Clone, Default)]
pub struct Latch {
    buf: [u8; 8],
    pub addr: u32,
    /// Bits of `addr` that carry when stepping to the next byte.
    pub wrap: u32,
}

impl Latch {
    pub fn get(&self, slot: Slot) -> u8 {
        self.buf[slot as usize]
    }

    pub fn set(&mut self, slot: Slot, value: u8) {
        self.buf[slot as usize] = value;
    }

    pub fn word(&self, lo: Slot, hi: Slot) -> u16 {
        u16::from_le_bytes([self.get(lo), self.get(hi)])
    }

    pub fn set_word(&mut self, lo: Slot, hi: Slot, value: u16) {
        let [l, h] = value.to_le_bytes();
        self.set(lo, l);
        self.set(hi, h);
    }

    pub fn point(&mut self, addr: u32, wrap: u32) {
        self.addr = addr & WRAP_LONG;
        self.wrap = wrap;
    }

    pub fn target(&self, offset: u8) -> u32 {
        let stepped = self.addr.wrapping_add(offset as u32) & self.wrap;
        ((self.addr & !self.wrap) | stepped) & WRAP_LONG
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Abs,
    AbsX,
    AbsY,
    Long,
    LongX,
    Dp,
    DpX,
    DpY,
    DpInd,
    DpIndX,
    DpIndY,
    DpIndLong,
    DpIndLongY,
    Sr,
    SrIndY,
}

impl Mode {
    pub fn operand_bytes(self) -> usize {
        match self {
            Mode::Abs | Mode::AbsX | Mode::AbsY => 2,
            Mode::Long | Mode::LongX => 3,
            _ => 1,
        }
    }

    /// Pointer bytes fetched before the effective address is known.
    pub fn pointer_bytes(self) -> usize {
        match self {
            Mode::DpInd | Mode::DpIndX | Mode::DpIndY | Mode::SrIndY => 2,
            Mode::DpIndLong | Mode::DpIndLongY => 3,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Modify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lda,
    Ora,
    And,
    Eor,
    Adc,
    Sbc,
    Cmp,
    Bit,
    BitImm,
    Ldx,
    Ldy,
    Cpx,
    Cpy,
    Sta,
    Stz,
    Stx,
    Sty,
    Asl,
    Lsr,
    Rol,
    Ror,
    Inc,
    Dec,
    Tsb,
    Trb,
}

impl Op {
    pub fn access(self) -> Access {
        use Op::*;
        match self {
            Sta | Stz | Stx | Sty => Access::Write,
            Asl | Lsr | Rol | Ror | Inc | Dec | Tsb | Trb => Access::Modify,
            _ => Access::Read,
        }
    }

    /// Sized by the X flag rather than M.
    pub fn is_index(self) -> bool {
        matches!(self, Op::Ldx | Op::Ldy | Op::Cpx | Op::Cpy | Op::Stx | Op::Sty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implied {
    Clc,
    Sec,
    Cli,
    Sei,
    Clv,
    Cld,
    Sed,
    Tax,
    Tay,
    Txa,
    Tya,
    Tsx,
    Txs,
    Txy,
    Tyx,
    Tcd,
    Tdc,
    Tcs,
    Tsc,
    Inx,
    Iny,
    Dex,
    Dey,
    Xce,
    Xba,
    Nop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    A,
    X,
    Y,
    P,
    Db,
    Pb,
    D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Plus,
    Minus,
    OverflowClear,
    OverflowSet,
    CarryClear,
    CarrySet,
    NotEqual,
    Equal,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Point the latch at the indirect pointer (direct page or stack).
    Pointer(Mode),
    /// Resolve the effective address and queue penalty cycles.
    Address(Mode, Access),
    Read(Op),
    Write(Op),
    Modify(Op),
    Accumulator(Op),
    Implied(Implied),
    PushReg(Reg),
    PullReg(Reg),
    Branch(Cond),
    BranchLong,
    /// Stage PC minus the given amount as the return address.
    StageReturn(u16),
    StageBank,
    StageRelative,
    PointAbsIndirect,
    PointAbsIndexed,
    JumpAbs,
    JumpLong,
    JumpPtr,
    JumpPtrLong,
    Return,
    ReturnLong,
    ReturnInterrupt,
    Software(super::Interrupt),
    Vector(u16),
    JumpVector,
    Rep,
    Sep,
    MoveSource,
    MoveDest,
    MoveNext(bool),
    Wait,
    Stop,
}
