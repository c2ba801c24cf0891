use std::fmt;
use std::str::FromStr;

use crate::error::NameError;

/// A 16-bit register cell.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    Ax = 0,
    Cx,
    Dx,
    Bx,
    /// Stack pointer, offset into page SS.
    Sp,
    Bp,
    Si,
    Di,
    /// Page that `t` and `g` fetch instructions from.
    Cs,
    /// Page of memory operands.
    Ds,
    Es,
    /// Page of the stack.
    Ss,
    /// Not addressable as an instruction operand.
    Ip,
}

/// 8-bit view onto the high or low byte of a general purpose register.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ByteRegister {
    Al,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Half {
    Low,
    High,
}

/// Any register name which may appear as an instruction operand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RegOperand {
    Word(Register),
    Byte(ByteRegister),
}

/// Status flags, valued by their bit position in the 8086 flag word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Flag {
    Carry = 0,
    Parity = 2,
    AuxCarry = 4,
    Zero = 6,
    Sign = 7,
    Overflow = 11,
}

/// Operand register names, in encoding order. The index of a name is its encoded byte.
pub const OPERAND_REGISTERS: [RegOperand; 20] = {
    use ByteRegister::*;
    use RegOperand::{Byte, Word};
    use Register::*;
    [
        Word(Ax), Word(Cx), Word(Dx), Word(Bx), Word(Sp), Word(Bp), Word(Si), Word(Di),
        Byte(Al), Byte(Cl), Byte(Dl), Byte(Bl), Byte(Ah), Byte(Ch), Byte(Dh), Byte(Bh),
        Word(Cs), Word(Ds), Word(Es), Word(Ss),
    ]
};

impl Register {
    pub const ALL: [Register; 13] = [
        Register::Ax,
        Register::Bx,
        Register::Cx,
        Register::Dx,
        Register::Sp,
        Register::Bp,
        Register::Si,
        Register::Di,
        Register::Ds,
        Register::Es,
        Register::Ss,
        Register::Cs,
        Register::Ip,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ax => "ax",
            Self::Cx => "cx",
            Self::Dx => "dx",
            Self::Bx => "bx",
            Self::Sp => "sp",
            Self::Bp => "bp",
            Self::Si => "si",
            Self::Di => "di",
            Self::Cs => "cs",
            Self::Ds => "ds",
            Self::Es => "es",
            Self::Ss => "ss",
            Self::Ip => "ip",
        }
    }
}

impl ByteRegister {
    pub fn name(self) -> &'static str {
        match self {
            Self::Al => "al",
            Self::Cl => "cl",
            Self::Dl => "dl",
            Self::Bl => "bl",
            Self::Ah => "ah",
            Self::Ch => "ch",
            Self::Dh => "dh",
            Self::Bh => "bh",
        }
    }

    /// Register which owns this byte.
    pub fn parent(self) -> Register {
        match self {
            Self::Al | Self::Ah => Register::Ax,
            Self::Cl | Self::Ch => Register::Cx,
            Self::Dl | Self::Dh => Register::Dx,
            Self::Bl | Self::Bh => Register::Bx,
        }
    }

    pub fn half(self) -> Half {
        match self {
            Self::Al | Self::Cl | Self::Dl | Self::Bl => Half::Low,
            Self::Ah | Self::Ch | Self::Dh | Self::Bh => Half::High,
        }
    }
}

impl RegOperand {
    pub fn name(self) -> &'static str {
        match self {
            Self::Word(register) => register.name(),
            Self::Byte(register) => register.name(),
        }
    }

    /// Byte used to encode this register in pseudo machine code.
    pub fn index(self) -> u8 {
        OPERAND_REGISTERS
            .iter()
            .position(|register| *register == self)
            .expect("every operand register is listed in the encoding table") as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        OPERAND_REGISTERS.get(index as usize).copied()
    }

    pub fn is_byte(self) -> bool {
        matches!(self, Self::Byte(_))
    }
}

impl Flag {
    pub const ALL: [Flag; 6] = [
        Flag::Overflow,
        Flag::Sign,
        Flag::Zero,
        Flag::AuxCarry,
        Flag::Parity,
        Flag::Carry,
    ];

    pub fn mask(self) -> u16 {
        1 << self as u16
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Carry => "cf",
            Self::Parity => "pf",
            Self::AuxCarry => "af",
            Self::Zero => "zf",
            Self::Sign => "sf",
            Self::Overflow => "of",
        }
    }

    /// DEBUG-style mnemonic for the (clear, set) state of the flag.
    pub fn states(self) -> (&'static str, &'static str) {
        match self {
            Self::Overflow => ("NV", "OV"),
            Self::Sign => ("PL", "NG"),
            Self::Zero => ("NZ", "ZR"),
            Self::AuxCarry => ("NA", "AC"),
            Self::Parity => ("PO", "PE"),
            Self::Carry => ("NC", "CY"),
        }
    }
}

impl FromStr for Register {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "ax" => Self::Ax,
            "cx" => Self::Cx,
            "dx" => Self::Dx,
            "bx" => Self::Bx,
            "sp" => Self::Sp,
            "bp" => Self::Bp,
            "si" => Self::Si,
            "di" => Self::Di,
            "cs" => Self::Cs,
            "ds" => Self::Ds,
            "es" => Self::Es,
            "ss" => Self::Ss,
            "ip" => Self::Ip,
            _ => return Err(NameError::UnknownRegister(s.to_string())),
        })
    }
}

impl FromStr for ByteRegister {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "al" => Self::Al,
            "cl" => Self::Cl,
            "dl" => Self::Dl,
            "bl" => Self::Bl,
            "ah" => Self::Ah,
            "ch" => Self::Ch,
            "dh" => Self::Dh,
            "bh" => Self::Bh,
            _ => return Err(NameError::UnknownRegister(s.to_string())),
        })
    }
}

impl FromStr for RegOperand {
    type Err = NameError;

    /// `ip` is rejected: it is only reachable through jumps.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(register) = s.parse::<ByteRegister>() {
            return Ok(Self::Byte(register));
        }
        match s.parse::<Register>()? {
            Register::Ip => Err(NameError::UnknownRegister(s.to_string())),
            register => Ok(Self::Word(register)),
        }
    }
}

impl FromStr for Flag {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "cf" | "carry" => Self::Carry,
            "pf" | "parity" => Self::Parity,
            "af" | "auxcarry" => Self::AuxCarry,
            "zf" | "zero" => Self::Zero,
            "sf" | "sign" => Self::Sign,
            "of" | "overflow" => Self::Overflow,
            _ => return Err(NameError::UnknownFlag(s.to_string())),
        })
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for RegOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
