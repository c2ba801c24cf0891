use std::fmt;

use crate::symbol::{ByteRegister, Flag, Half, RegOperand, Register};

pub const INITIAL_SP: u16 = 0xFFFE;
pub const INITIAL_IP: u16 = 0x0100;

/// Every flag the file knows about.
pub const FLAG_MASK: u16 = 0b0000_1000_1101_0101;

/// Register and flag file.
///
/// Each register is stored as a little-endian pair of bytes. Byte registers are views onto one
/// half of their parent cell, so writing `al` never touches `ah`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RegisterFile {
    cells: [[u8; 2]; 13],
    flags: u16,
}

impl Default for RegisterFile {
    fn default() -> Self {
        let mut file = Self {
            cells: [[0; 2]; 13],
            flags: 0,
        };
        file.set(Register::Sp, INITIAL_SP);
        file.set(Register::Ip, INITIAL_IP);
        file
    }
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, register: Register) -> u16 {
        u16::from_le_bytes(self.cells[register as usize])
    }

    pub fn set(&mut self, register: Register, value: u16) {
        self.cells[register as usize] = value.to_le_bytes();
    }

    pub fn get_byte(&self, register: ByteRegister) -> u8 {
        let cell = &self.cells[register.parent() as usize];
        match register.half() {
            Half::Low => cell[0],
            Half::High => cell[1],
        }
    }

    pub fn set_byte(&mut self, register: ByteRegister, value: u8) {
        let cell = &mut self.cells[register.parent() as usize];
        match register.half() {
            Half::Low => cell[0] = value,
            Half::High => cell[1] = value,
        }
    }

    /// Read an operand register, zero-extending byte registers.
    pub fn get_operand(&self, register: RegOperand) -> u16 {
        match register {
            RegOperand::Word(register) => self.get(register),
            RegOperand::Byte(register) => self.get_byte(register) as u16,
        }
    }

    /// Write an operand register, truncating to the width of byte registers.
    pub fn set_operand(&mut self, register: RegOperand, value: u16) {
        match register {
            RegOperand::Word(register) => self.set(register, value),
            RegOperand::Byte(register) => self.set_byte(register, value as u8),
        }
    }

    pub fn get_flag(&self, flag: Flag) -> bool {
        self.flags & flag.mask() != 0
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        if value {
            self.flags |= flag.mask();
        } else {
            self.flags &= !flag.mask();
        }
    }

    /// Flag word, laid out as on the 8086.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn set_flags(&mut self, word: u16) {
        self.flags = word & FLAG_MASK;
    }

    /// Overwrite the flags in `affected` with their value in `computed`.
    pub fn merge_flags(&mut self, computed: u16, affected: u16) {
        self.flags = (self.flags & !affected) | (computed & affected & FLAG_MASK);
    }

    pub fn ip(&self) -> u16 {
        self.get(Register::Ip)
    }

    pub fn set_ip(&mut self, value: u16) {
        self.set(Register::Ip, value);
    }
}

/// DEBUG style dump: two lines of registers followed by the flag mnemonics.
impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, register) in Register::ALL.iter().enumerate() {
            if i == 8 {
                writeln!(f)?;
            } else if i > 0 {
                write!(f, "  ")?;
            }
            write!(
                f,
                "{}={:04X}",
                register.name().to_ascii_uppercase(),
                self.get(*register)
            )?;
        }
        write!(f, "  ")?;
        for flag in Flag::ALL {
            let (clear, set) = flag.states();
            write!(f, " {}", if self.get_flag(flag) { set } else { clear })?;
            if flag == Flag::Overflow {
                write!(f, " UP")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let regs = RegisterFile::new();
        assert_eq!(regs.get(Register::Sp), 0xFFFE);
        assert_eq!(regs.ip(), 0x0100);
        assert_eq!(regs.get(Register::Ax), 0);
        assert_eq!(regs.flags(), 0);
    }

    #[test]
    fn set_then_get_recombines_bytes() {
        let mut regs = RegisterFile::new();
        let pairs = [
            (Register::Ax, ByteRegister::Al, ByteRegister::Ah),
            (Register::Bx, ByteRegister::Bl, ByteRegister::Bh),
            (Register::Cx, ByteRegister::Cl, ByteRegister::Ch),
            (Register::Dx, ByteRegister::Dl, ByteRegister::Dh),
        ];
        for value in [0x0000, 0x00FF, 0xFF00, 0x1234, 0xBEEF, 0xFFFF] {
            for (word, low, high) in pairs {
                regs.set(word, value);
                assert_eq!(regs.get(word), value);
                let low = regs.get_byte(low) as u16;
                let high = regs.get_byte(high) as u16;
                assert_eq!(high << 8 | low, value);
            }
        }
        for register in Register::ALL {
            regs.set(register, 0xA55A);
            assert_eq!(regs.get(register), 0xA55A);
        }
    }

    #[test]
    fn byte_aliases_are_independent() {
        let mut regs = RegisterFile::new();
        regs.set(Register::Ax, 0x1234);
        regs.set_byte(ByteRegister::Al, 0xFF);
        assert_eq!(regs.get_byte(ByteRegister::Ah), 0x12);
        assert_eq!(regs.get(Register::Ax), 0x12FF);
        regs.set_byte(ByteRegister::Ah, 0x00);
        assert_eq!(regs.get_byte(ByteRegister::Al), 0xFF);
        assert_eq!(regs.get(Register::Ax), 0x00FF);
    }

    #[test]
    fn flags() {
        let mut regs = RegisterFile::new();
        regs.set_flag(Flag::Zero, true);
        regs.set_flag(Flag::Overflow, true);
        assert!(regs.get_flag(Flag::Zero));
        assert!(!regs.get_flag(Flag::Carry));
        assert_eq!(regs.flags(), 0x0840);
        regs.merge_flags(Flag::Carry.mask(), Flag::Carry.mask() | Flag::Zero.mask());
        assert!(regs.get_flag(Flag::Carry));
        assert!(!regs.get_flag(Flag::Zero));
        assert!(regs.get_flag(Flag::Overflow));
        regs.set_flags(0xFFFF);
        assert_eq!(regs.flags(), FLAG_MASK);
    }

    #[test]
    fn dump() {
        let mut regs = RegisterFile::new();
        regs.set_flag(Flag::Carry, true);
        let dump = regs.to_string();
        assert_eq!(
            dump,
            "AX=0000  BX=0000  CX=0000  DX=0000  SP=FFFE  BP=0000  SI=0000  DI=0000\n\
             DS=0000  ES=0000  SS=0000  CS=0000  IP=0100   NV UP PL NZ NA PO CY"
        );
    }
}
