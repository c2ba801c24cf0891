//! Bit-accurate arithmetic. Each operation returns its result with a full set of computed flags;
//! callers keep only the flags the instruction is documented to change.

use crate::opcode::Width;
use crate::symbol::Flag;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AluOutput {
    pub value: u16,
    /// Flag word, see [`Flag::mask`].
    pub flags: u16,
}

impl AluOutput {
    pub fn flag(&self, flag: Flag) -> bool {
        self.flags & flag.mask() != 0
    }
}

fn bit(flag: Flag, value: bool) -> u16 {
    if value {
        flag.mask()
    } else {
        0
    }
}

/// Sign, zero and parity of a result. Parity counts the low byte only.
fn szp(value: u16, width: Width) -> u16 {
    bit(Flag::Sign, value & width.sign_bit() != 0)
        | bit(Flag::Zero, value & width.mask() == 0)
        | bit(Flag::Parity, (value as u8).count_ones() % 2 == 0)
}

fn output(value: u16, width: Width, flags: u16) -> AluOutput {
    let value = value & width.mask();
    AluOutput {
        value,
        flags: flags | szp(value, width),
    }
}

pub fn add(a: u16, b: u16, width: Width) -> AluOutput {
    let (a, b) = (a & width.mask(), b & width.mask());
    let full = a as u32 + b as u32;
    let result = full as u16 & width.mask();
    let flags = bit(Flag::Carry, full > width.mask() as u32)
        | bit(Flag::Overflow, (a ^ result) & (b ^ result) & width.sign_bit() != 0)
        | bit(Flag::AuxCarry, (a ^ b ^ result) & 0x10 != 0);
    output(result, width, flags)
}

pub fn sub(a: u16, b: u16, width: Width) -> AluOutput {
    let (a, b) = (a & width.mask(), b & width.mask());
    let result = a.wrapping_sub(b) & width.mask();
    let flags = bit(Flag::Carry, b > a)
        | bit(Flag::Overflow, (a ^ b) & (a ^ result) & width.sign_bit() != 0)
        | bit(Flag::AuxCarry, (a ^ b ^ result) & 0x10 != 0);
    output(result, width, flags)
}

pub fn neg(a: u16, width: Width) -> AluOutput {
    sub(0, a, width)
}

pub fn inc(a: u16, width: Width) -> AluOutput {
    add(a, 1, width)
}

pub fn dec(a: u16, width: Width) -> AluOutput {
    sub(a, 1, width)
}

/// Carry and overflow are always cleared.
pub fn and(a: u16, b: u16, width: Width) -> AluOutput {
    output(a & b, width, 0)
}

pub fn or(a: u16, b: u16, width: Width) -> AluOutput {
    output(a | b, width, 0)
}

pub fn xor(a: u16, b: u16, width: Width) -> AluOutput {
    output(a ^ b, width, 0)
}

pub fn not(a: u16, width: Width) -> AluOutput {
    output(!a, width, 0)
}

pub fn shl(a: u16, width: Width) -> AluOutput {
    let carry = a & width.sign_bit() != 0;
    let result = (a << 1) & width.mask();
    let flags = bit(Flag::Carry, carry)
        | bit(Flag::Overflow, (result & width.sign_bit() != 0) != carry);
    output(result, width, flags)
}

pub fn shr(a: u16, width: Width) -> AluOutput {
    let a = a & width.mask();
    let flags = bit(Flag::Carry, a & 1 != 0) | bit(Flag::Overflow, a & width.sign_bit() != 0);
    output(a >> 1, width, flags)
}

pub fn rol(a: u16, width: Width) -> AluOutput {
    let carry = a & width.sign_bit() != 0;
    let result = ((a << 1) | carry as u16) & width.mask();
    let flags = bit(Flag::Carry, carry)
        | bit(Flag::Overflow, (result & width.sign_bit() != 0) != carry);
    output(result, width, flags)
}

pub fn ror(a: u16, width: Width) -> AluOutput {
    let a = a & width.mask();
    let carry = a & 1 != 0;
    let result = (a >> 1) | ((carry as u16) << (width.bits() - 1));
    let top = result & width.sign_bit() != 0;
    let second = result & (width.sign_bit() >> 1) != 0;
    let flags = bit(Flag::Carry, carry) | bit(Flag::Overflow, top != second);
    output(result, width, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Flag::*;
    use Width::*;

    fn set(output: &AluOutput) -> Vec<Flag> {
        Flag::ALL
            .into_iter()
            .filter(|flag| output.flag(*flag))
            .collect()
    }

    #[test]
    fn add_byte_wraps_to_zero() {
        let out = add(0xFF, 0x01, Byte);
        assert_eq!(out.value, 0x00);
        assert!(out.flag(Carry));
        assert!(out.flag(Zero));
        assert!(!out.flag(Sign));
        assert!(!out.flag(Overflow));
        assert!(out.flag(Parity));
        assert!(out.flag(AuxCarry));
    }

    #[test]
    fn sub_byte_borrows() {
        let out = sub(0x00, 0x01, Byte);
        assert_eq!(out.value, 0xFF);
        assert!(out.flag(Carry));
        assert!(out.flag(Sign));
        assert!(!out.flag(Zero));
        assert!(!out.flag(Overflow));
    }

    #[test]
    fn signed_overflow() {
        let out = add(0x7F, 0x01, Byte);
        assert_eq!(out.value, 0x80);
        assert_eq!(set(&out), vec![Overflow, Sign, AuxCarry]);

        let out = add(0x7FFF, 0x0001, Word);
        assert_eq!(out.value, 0x8000);
        assert!(out.flag(Overflow));
        assert!(!out.flag(Carry));

        let out = sub(0x8000, 0x0001, Word);
        assert_eq!(out.value, 0x7FFF);
        assert!(out.flag(Overflow));
        assert!(!out.flag(Sign));
    }

    #[test]
    fn parity_counts_low_byte() {
        assert!(add(0x0300, 0, Word).flag(Parity));
        assert!(!add(0x0001, 0, Word).flag(Parity));
        assert!(add(0x0103, 0, Word).flag(Parity));
    }

    #[test]
    fn logic_clears_carry_and_overflow() {
        let out = and(0xF0, 0x0F, Byte);
        assert_eq!(out.value, 0);
        assert_eq!(set(&out), vec![Zero, Parity]);
        let out = xor(0x8000, 0x0001, Word);
        assert_eq!(out.value, 0x8001);
        assert_eq!(set(&out), vec![Sign]);
        assert_eq!(or(0x12, 0x21, Byte).value, 0x33);
        assert_eq!(not(0x00F0, Byte).value, 0x0F);
        assert_eq!(not(0x00F0, Word).value, 0xFF0F);
    }

    #[test]
    fn neg_is_sub_from_zero() {
        assert_eq!(neg(0x01, Byte), sub(0, 0x01, Byte));
        assert_eq!(neg(0x01, Byte).value, 0xFF);
        assert!(!neg(0, Word).flag(Carry));
    }

    #[test]
    fn shift_left_out_of_byte() {
        let out = shl(0x80, Byte);
        assert_eq!(out.value, 0x00);
        assert!(out.flag(Carry));
        assert!(out.flag(Zero));
        assert_eq!(shl(0x0005, Word).value, 0x000A);
    }

    #[test]
    fn shift_right() {
        let out = shr(0x81, Byte);
        assert_eq!(out.value, 0x40);
        assert!(out.flag(Carry));
        assert!(out.flag(Overflow));
    }

    #[test]
    fn rotates() {
        let out = rol(0x8001, Word);
        assert_eq!(out.value, 0x0003);
        assert!(out.flag(Carry));
        let out = ror(0x0001, Word);
        assert_eq!(out.value, 0x8000);
        assert!(out.flag(Carry));
        assert!(out.flag(Overflow));
        assert_eq!(ror(0x01, Byte).value, 0x80);
        assert_eq!(rol(0x80, Byte).value, 0x01);
    }

    #[test]
    fn inc_dec_wrap() {
        assert_eq!(inc(0xFFFF, Word).value, 0);
        assert_eq!(dec(0x00, Byte).value, 0xFF);
    }
}
