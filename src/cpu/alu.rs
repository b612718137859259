use super::microcode::Op;
use super::{Registers, StatusFlags};

#[inline]
fn mask(wide: bool) -> u16 {
    if wide {
        0xFFFF
    } else {
        0x00FF
    }
}

#[inline]
fn sign(wide: bool) -> u16 {
    if wide {
        0x8000
    } else {
        0x0080
    }
}

/// Binary or BCD add of `a + b + carry` over 8 or 16 bits. Decimal mode
/// adjusts one nibble at a time and takes V from the binary top nibble sum,
/// which is what the hardware does for invalid BCD inputs too. Subtraction
/// passes the one's complement of the operand.
fn add_core(a: u16, b: u16, carry: bool, wide: bool, decimal: bool, subtract: bool) -> (u16, bool, bool) {
    let bits: u32 = if wide { 16 } else { 8 };
    let top = 1i32 << bits;
    let a = a as i32 & (top - 1);
    let b = b as i32 & (top - 1);
    let mut result;

    if !decimal {
        result = a + b + carry as i32;
    } else {
        let nibbles = bits / 4;
        let mut c = carry as i32;
        result = 0;
        for i in 0..nibbles {
            let shift = 4 * i;
            let nib = 0xF << shift;
            result = (a & nib) + (b & nib) + (c << shift) + (result & ((1 << shift) - 1));
            if i == nibbles - 1 {
                break;
            }
            result = adjust(result, shift, subtract);
            c = (result >= (0x10 << shift)) as i32;
        }
    }

    let sign = top >> 1;
    let overflow = (!(a ^ b) & (a ^ result) & sign) != 0;
    if decimal {
        result = adjust(result, bits - 4, subtract);
    }
    ((result & (top - 1)) as u16, result >= top, overflow)
}

#[inline]
fn adjust(result: i32, shift: u32, subtract: bool) -> i32 {
    if subtract {
        if result < (0x10 << shift) {
            return result - (6 << shift);
        }
    } else if result >= (0xA << shift) {
        return result + (6 << shift);
    }
    result
}

impl Registers {
    pub(crate) fn set_nz(&mut self, value: u16, wide: bool) {
        self.p.set(StatusFlags::ZERO, value & mask(wide) == 0);
        self.p.set(StatusFlags::NEGATIVE, value & sign(wide) != 0);
    }

    /// Writes the low byte only when A is 8-bit; B is preserved.
    pub(crate) fn set_a(&mut self, value: u16, wide: bool) {
        self.a = if wide { value } else { (self.a & 0xFF00) | (value & 0xFF) };
    }

    pub(crate) fn index_value(&self, value: u16) -> u16 {
        value & mask(!self.x8())
    }

    fn adc(&mut self, data: u16, wide: bool) {
        let (r, c, v) = add_core(
            self.a,
            data,
            self.p.contains(StatusFlags::CARRY),
            wide,
            self.p.contains(StatusFlags::DECIMAL),
            false,
        );
        self.p.set(StatusFlags::CARRY, c);
        self.p.set(StatusFlags::OVERFLOW, v);
        self.set_a(r, wide);
        self.set_nz(r, wide);
    }

    fn sbc(&mut self, data: u16, wide: bool) {
        let (r, c, v) = add_core(
            self.a,
            !data & mask(wide),
            self.p.contains(StatusFlags::CARRY),
            wide,
            self.p.contains(StatusFlags::DECIMAL),
            true,
        );
        self.p.set(StatusFlags::CARRY, c);
        self.p.set(StatusFlags::OVERFLOW, v);
        self.set_a(r, wide);
        self.set_nz(r, wide);
    }

    fn compare(&mut self, reg: u16, data: u16, wide: bool) {
        let reg = reg & mask(wide);
        let data = data & mask(wide);
        self.p.set(StatusFlags::CARRY, reg >= data);
        self.set_nz(reg.wrapping_sub(data), wide);
    }

    /// Applies a read-class operation to the fetched operand.
    pub(crate) fn apply_read(&mut self, op: Op, data: u16, wide: bool) {
        let data = data & mask(wide);
        match op {
            Op::Lda => {
                self.set_a(data, wide);
                self.set_nz(data, wide);
            }
            Op::Ora => {
                let r = (self.a | data) & mask(wide);
                self.set_a(r, wide);
                self.set_nz(r, wide);
            }
            Op::And => {
                let r = self.a & data;
                self.set_a(r, wide);
                self.set_nz(r, wide);
            }
            Op::Eor => {
                let r = (self.a ^ data) & mask(wide);
                self.set_a(r, wide);
                self.set_nz(r, wide);
            }
            Op::Adc => self.adc(data, wide),
            Op::Sbc => self.sbc(data, wide),
            Op::Cmp => self.compare(self.a, data, wide),
            Op::Bit => {
                self.p.set(StatusFlags::ZERO, self.a & data == 0);
                self.p.set(StatusFlags::NEGATIVE, data & sign(wide) != 0);
                self.p.set(StatusFlags::OVERFLOW, data & (sign(wide) >> 1) != 0);
            }
            Op::BitImm => self.p.set(StatusFlags::ZERO, self.a & data == 0),
            Op::Ldx => {
                self.x = data;
                self.set_nz(data, wide);
            }
            Op::Ldy => {
                self.y = data;
                self.set_nz(data, wide);
            }
            Op::Cpx => self.compare(self.x, data, wide),
            Op::Cpy => self.compare(self.y, data, wide),
            _ => {}
        }
    }

    /// Value a store-class operation puts on the bus.
    pub(crate) fn store_value(&self, op: Op) -> u16 {
        match op {
            Op::Sta => self.a,
            Op::Stx => self.x,
            Op::Sty => self.y,
            _ => 0,
        }
    }

    /// Read-modify-write on memory or the accumulator.
    pub(crate) fn apply_modify(&mut self, op: Op, data: u16, wide: bool) -> u16 {
        let m = mask(wide);
        let s = sign(wide);
        let data = data & m;
        let carry = self.p.contains(StatusFlags::CARRY);
        let r = match op {
            Op::Asl => {
                self.p.set(StatusFlags::CARRY, data & s != 0);
                (data << 1) & m
            }
            Op::Lsr => {
                self.p.set(StatusFlags::CARRY, data & 1 != 0);
                data >> 1
            }
            Op::Rol => {
                self.p.set(StatusFlags::CARRY, data & s != 0);
                ((data << 1) | carry as u16) & m
            }
            Op::Ror => {
                self.p.set(StatusFlags::CARRY, data & 1 != 0);
                (data >> 1) | if carry { s } else { 0 }
            }
            Op::Inc => data.wrapping_add(1) & m,
            Op::Dec => data.wrapping_sub(1) & m,
            Op::Tsb => {
                self.p.set(StatusFlags::ZERO, self.a & data == 0);
                return (data | self.a) & m;
            }
            Op::Trb => {
                self.p.set(StatusFlags::ZERO, self.a & data == 0);
                return data & !self.a & m;
            }
            _ => data,
        };
        self.set_nz(r, wide);
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs(a: u16, flags: StatusFlags) -> Registers {
        let mut r = Registers::default();
        r.emulation = false;
        r.a = a;
        r.p = flags;
        r
    }

    #[test]
    fn binary_add_sets_overflow_and_carry() {
        let mut r = regs(0x7F, StatusFlags::MEMORY_8BIT);
        r.apply_read(Op::Adc, 0x01, false);
        assert_eq!(r.a & 0xFF, 0x80);
        assert!(r.p.contains(StatusFlags::OVERFLOW));
        assert!(!r.p.contains(StatusFlags::CARRY));

        let mut r = regs(0xFFFF, StatusFlags::empty());
        r.apply_read(Op::Adc, 0x0001, true);
        assert_eq!(r.a, 0);
        assert!(r.p.contains(StatusFlags::CARRY | StatusFlags::ZERO));
    }

    #[test]
    fn decimal_add_carries_between_digits() {
        let mut r = regs(0x58, StatusFlags::MEMORY_8BIT | StatusFlags::DECIMAL);
        r.apply_read(Op::Adc, 0x46, false);
        assert_eq!(r.a & 0xFF, 0x04);
        assert!(r.p.contains(StatusFlags::CARRY));

        let mut r = regs(0x1999, StatusFlags::DECIMAL | StatusFlags::CARRY);
        r.apply_read(Op::Adc, 0x0000, true);
        assert_eq!(r.a, 0x2000);
        assert!(!r.p.contains(StatusFlags::CARRY));
    }

    #[test]
    fn decimal_subtract_borrows() {
        let mut r = regs(0x10, StatusFlags::MEMORY_8BIT | StatusFlags::DECIMAL | StatusFlags::CARRY);
        r.apply_read(Op::Sbc, 0x01, false);
        assert_eq!(r.a & 0xFF, 0x09);
        assert!(r.p.contains(StatusFlags::CARRY));

        let mut r = regs(0x0000, StatusFlags::DECIMAL | StatusFlags::CARRY);
        r.apply_read(Op::Sbc, 0x0001, true);
        assert_eq!(r.a, 0x9999);
        assert!(!r.p.contains(StatusFlags::CARRY));
    }

    #[test]
    fn eight_bit_ops_preserve_b() {
        let mut r = regs(0x12FF, StatusFlags::MEMORY_8BIT);
        r.apply_read(Op::Lda, 0x00, false);
        assert_eq!(r.a, 0x1200);
        assert!(r.p.contains(StatusFlags::ZERO));
    }

    #[test]
    fn compare_sets_carry_when_not_less() {
        let mut r = regs(0x40, StatusFlags::MEMORY_8BIT);
        r.apply_read(Op::Cmp, 0x40, false);
        assert!(r.p.contains(StatusFlags::CARRY | StatusFlags::ZERO));
        r.apply_read(Op::Cmp, 0x41, false);
        assert!(!r.p.contains(StatusFlags::CARRY));
        assert!(r.p.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn rotates_through_carry() {
        let mut r = regs(0, StatusFlags::CARRY);
        assert_eq!(r.apply_modify(Op::Ror, 0x0002, true), 0x8001);
        assert!(!r.p.contains(StatusFlags::CARRY));
        assert_eq!(r.apply_modify(Op::Rol, 0x80, false), 0x00);
        assert!(r.p.contains(StatusFlags::CARRY | StatusFlags::ZERO));
    }

    #[test]
    fn test_and_set_bits() {
        let mut r = regs(0x0F, StatusFlags::MEMORY_8BIT);
        assert_eq!(r.apply_modify(Op::Tsb, 0xF0, false), 0xFF);
        assert!(r.p.contains(StatusFlags::ZERO));
        assert_eq!(r.apply_modify(Op::Trb, 0xFF, false), 0xF0);
        assert!(!r.p.contains(StatusFlags::ZERO));
    }

    #[test]
    fn bit_immediate_only_touches_zero() {
        let mut r = regs(0x01, StatusFlags::MEMORY_8BIT);
        r.apply_read(Op::BitImm, 0xC0, false);
        assert!(r.p.contains(StatusFlags::ZERO));
        assert!(!r.p.contains(StatusFlags::NEGATIVE));
        r.apply_read(Op::Bit, 0xC0, false);
        assert!(r.p.contains(StatusFlags::NEGATIVE | StatusFlags::OVERFLOW | StatusFlags::ZERO));
    }
}
