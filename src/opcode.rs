use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;

use crate::symbol::{Flag, RegOperand};
use crate::FxMap;

/// Syntactic class of an operand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum OperandShape {
    R8,
    R16,
    I8,
    I16,
    M8,
    M16,
    Rel8,
    Rel16,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    pub fn bits(self) -> u32 {
        match self {
            Self::Byte => 8,
            Self::Word => 16,
        }
    }

    pub fn mask(self) -> u16 {
        match self {
            Self::Byte => 0x00FF,
            Self::Word => 0xFFFF,
        }
    }

    pub fn sign_bit(self) -> u16 {
        1 << (self.bits() - 1)
    }
}

impl OperandShape {
    /// Encoded size of an operand of this shape.
    pub fn byte_len(self) -> usize {
        match self {
            Self::R8 | Self::R16 | Self::I8 => 1,
            Self::I16 | Self::M8 | Self::M16 | Self::Rel8 | Self::Rel16 => 2,
        }
    }

    pub fn width(self) -> Width {
        match self {
            Self::R8 | Self::I8 | Self::M8 | Self::Rel8 => Width::Byte,
            Self::R16 | Self::I16 | Self::M16 | Self::Rel16 => Width::Word,
        }
    }
}

impl fmt::Display for OperandShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::R8 => "reg8",
            Self::R16 => "reg16",
            Self::I8 => "imm8",
            Self::I16 => "imm16",
            Self::M8 => "mem8",
            Self::M16 => "mem16",
            Self::Rel8 => "rel8",
            Self::Rel16 => "rel16",
        };
        write!(f, "{}", name)
    }
}

macro_rules! mnemonics {
    ( $( $variant:ident => $name:literal ),* $(,)? ) => {
        /// Every instruction the engine knows.
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        pub enum Mnemonic {
            $( $variant, )*
        }

        impl Mnemonic {
            pub const ALL: &'static [Mnemonic] = &[ $( Mnemonic::$variant, )* ];

            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }
        }

        impl FromStr for Mnemonic {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($name) {
                        return Ok(Self::$variant);
                    }
                )*
                Err(())
            }
        }
    };
}

mnemonics! {
    Mov => "mov",
    Add => "add",
    Sub => "sub",
    Cmp => "cmp",
    And => "and",
    Or => "or",
    Xor => "xor",
    Not => "not",
    Neg => "neg",
    Inc => "inc",
    Dec => "dec",
    Shl => "shl",
    Shr => "shr",
    Rol => "rol",
    Ror => "ror",
    Push => "push",
    Pop => "pop",
    Pushf => "pushf",
    Popf => "popf",
    Jmp => "jmp",
    Call => "call",
    Ret => "ret",
    Jz => "jz",
    Jnz => "jnz",
    Jc => "jc",
    Jnc => "jnc",
    Js => "js",
    Jns => "jns",
    Jo => "jo",
    Jno => "jno",
    Loop => "loop",
    Int => "int",
    Nop => "nop",
    Hlt => "hlt",
    Clc => "clc",
    Stc => "stc",
    Cmc => "cmc",
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One row of the opcode table.
#[derive(Debug, PartialEq, Eq)]
pub struct Entry {
    pub mnemonic: Mnemonic,
    pub shapes: &'static [OperandShape],
    pub opcode: u8,
    /// Mask of the flags this instruction may change.
    pub flags: u16,
}

impl Entry {
    /// Encoded instruction length, including the opcode byte.
    pub fn encoded_len(&self) -> usize {
        1 + self.shapes.iter().map(|shape| shape.byte_len()).sum::<usize>()
    }

    /// Width of the value the instruction operates on.
    pub fn width(&self) -> Width {
        self.shapes
            .first()
            .map(|shape| shape.width())
            .unwrap_or(Width::Word)
    }
}

const fn flags(list: &[Flag]) -> u16 {
    let mut mask = 0;
    let mut i = 0;
    while i < list.len() {
        mask |= 1 << list[i] as u16;
        i += 1;
    }
    mask
}

use Flag::*;
use OperandShape::*;

const ARITH: u16 = flags(&[Overflow, Sign, Zero, AuxCarry, Parity, Carry]);
const LOGIC: u16 = flags(&[Overflow, Sign, Zero, Parity, Carry]);
const INC_DEC: u16 = flags(&[Overflow, Sign, Zero, AuxCarry, Parity]);
const SHIFT: u16 = flags(&[Overflow, Sign, Zero, Parity, Carry]);
const CARRY: u16 = flags(&[Carry]);
const ALL_FLAGS: u16 = ARITH;
const NONE: u16 = 0;

/// Forms of two-operand ALU instructions, in matching order. Opcode is `base + index`.
const BINARY_FORMS: [&[OperandShape]; 10] = [
    &[M8, R8],
    &[M16, R16],
    &[R8, M8],
    &[R16, M16],
    &[R8, R8],
    &[R16, R16],
    &[M8, I8],
    &[M16, I16],
    &[R8, I8],
    &[R16, I16],
];

const BINARY: [(Mnemonic, u8, u16); 6] = [
    (Mnemonic::Add, 0x00, ARITH),
    (Mnemonic::Sub, 0x10, ARITH),
    (Mnemonic::And, 0x20, LOGIC),
    (Mnemonic::Or, 0x30, LOGIC),
    (Mnemonic::Xor, 0x40, LOGIC),
    (Mnemonic::Cmp, 0x50, ARITH),
];

const UNARY_FORMS: [&[OperandShape]; 4] = [&[M8], &[M16], &[R8], &[R16]];

const UNARY: [(Mnemonic, u8, u16); 8] = [
    (Mnemonic::Inc, 0x60, INC_DEC),
    (Mnemonic::Dec, 0x64, INC_DEC),
    (Mnemonic::Not, 0x68, NONE),
    (Mnemonic::Neg, 0x6C, ARITH),
    (Mnemonic::Shl, 0x70, SHIFT),
    (Mnemonic::Shr, 0x74, SHIFT),
    (Mnemonic::Rol, 0x78, SHIFT),
    (Mnemonic::Ror, 0x7C, SHIFT),
];

/// Instructions with no regular family.
const SINGLE: &[(Mnemonic, &[OperandShape], u8, u16)] = &[
    (Mnemonic::Mov, &[M8, R8], 0x88, NONE),
    (Mnemonic::Mov, &[M16, R16], 0x89, NONE),
    (Mnemonic::Mov, &[R8, M8], 0x8A, NONE),
    (Mnemonic::Mov, &[R16, M16], 0x8B, NONE),
    (Mnemonic::Mov, &[R8, R8], 0x8C, NONE),
    (Mnemonic::Mov, &[R16, R16], 0x8D, NONE),
    (Mnemonic::Mov, &[M8, I8], 0xC6, NONE),
    (Mnemonic::Mov, &[M16, I16], 0xC7, NONE),
    (Mnemonic::Mov, &[R8, I8], 0xB0, NONE),
    (Mnemonic::Mov, &[R16, I16], 0xB8, NONE),
    (Mnemonic::Push, &[M16], 0x80, NONE),
    (Mnemonic::Push, &[R16], 0x81, NONE),
    (Mnemonic::Push, &[I16], 0x82, NONE),
    (Mnemonic::Pop, &[M16], 0x84, NONE),
    (Mnemonic::Pop, &[R16], 0x85, NONE),
    (Mnemonic::Pushf, &[], 0x86, NONE),
    (Mnemonic::Popf, &[], 0x87, ALL_FLAGS),
    (Mnemonic::Nop, &[], 0x90, NONE),
    (Mnemonic::Jz, &[Rel8], 0xA0, NONE),
    (Mnemonic::Jnz, &[Rel8], 0xA1, NONE),
    (Mnemonic::Jc, &[Rel8], 0xA2, NONE),
    (Mnemonic::Jnc, &[Rel8], 0xA3, NONE),
    (Mnemonic::Js, &[Rel8], 0xA4, NONE),
    (Mnemonic::Jns, &[Rel8], 0xA5, NONE),
    (Mnemonic::Jo, &[Rel8], 0xA6, NONE),
    (Mnemonic::Jno, &[Rel8], 0xA7, NONE),
    (Mnemonic::Ret, &[], 0xC3, NONE),
    (Mnemonic::Int, &[I8], 0xCD, NONE),
    (Mnemonic::Loop, &[Rel8], 0xE2, NONE),
    (Mnemonic::Call, &[Rel16], 0xE8, NONE),
    (Mnemonic::Jmp, &[Rel16], 0xE9, NONE),
    (Mnemonic::Hlt, &[], 0xF4, NONE),
    (Mnemonic::Cmc, &[], 0xF5, CARRY),
    (Mnemonic::Clc, &[], 0xF8, CARRY),
    (Mnemonic::Stc, &[], 0xF9, CARRY),
];

/// Immutable registry of every instruction form.
pub struct OpcodeTable {
    entries: Vec<Entry>,
    /// Entry indexes per mnemonic, in declaration order.
    by_mnemonic: FxMap<Mnemonic, Vec<usize>>,
    by_opcode: [Option<usize>; 256],
}

lazy_static! {
    pub static ref OPCODES: OpcodeTable = OpcodeTable::build();
}

impl OpcodeTable {
    fn build() -> Self {
        let mut entries = Vec::new();
        for (mnemonic, base, flags) in BINARY {
            for (i, shapes) in BINARY_FORMS.iter().enumerate() {
                entries.push(Entry {
                    mnemonic,
                    shapes: *shapes,
                    opcode: base + i as u8,
                    flags,
                });
            }
        }
        for (mnemonic, base, flags) in UNARY {
            for (i, shapes) in UNARY_FORMS.iter().enumerate() {
                entries.push(Entry {
                    mnemonic,
                    shapes: *shapes,
                    opcode: base + i as u8,
                    flags,
                });
            }
        }
        for &(mnemonic, shapes, opcode, flags) in SINGLE {
            entries.push(Entry {
                mnemonic,
                shapes,
                opcode,
                flags,
            });
        }

        let mut by_mnemonic = FxMap::<Mnemonic, Vec<usize>>::default();
        let mut by_opcode = [None; 256];
        for (i, entry) in entries.iter().enumerate() {
            by_mnemonic.entry(entry.mnemonic).or_default().push(i);
            debug_assert!(
                by_opcode[entry.opcode as usize].is_none(),
                "opcode {:02x} declared twice",
                entry.opcode
            );
            by_opcode[entry.opcode as usize] = Some(i);
        }
        Self {
            entries,
            by_mnemonic,
            by_opcode,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Every form of `mnemonic`, in declaration order.
    pub fn forms(&self, mnemonic: Mnemonic) -> impl Iterator<Item = &Entry> {
        self.by_mnemonic
            .get(&mnemonic)
            .into_iter()
            .flatten()
            .map(|i| &self.entries[*i])
    }

    /// Exact match on the shape tuple.
    pub fn lookup(&self, mnemonic: Mnemonic, shapes: &[OperandShape]) -> Option<&Entry> {
        self.forms(mnemonic).find(|entry| entry.shapes == shapes)
    }

    pub fn decode(&self, opcode: u8) -> Option<&Entry> {
        self.by_opcode[opcode as usize].map(|i| &self.entries[i])
    }

    /// Operand counts accepted by any form of `mnemonic`.
    pub fn arities(&self, mnemonic: Mnemonic) -> Vec<usize> {
        let mut arities: Vec<usize> = self.forms(mnemonic).map(|e| e.shapes.len()).collect();
        arities.dedup();
        arities
    }
}

/// Surface form of an operand, before it is matched against a shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Syntax {
    Register(RegOperand),
    /// Numeric literal. `bare` is the text when it had no radix marker.
    Number { value: i32, bare: Option<String> },
    /// `[hhhh]`, with an optional `byte`/`word` prefix.
    Memory { offset: u16, width: Option<Width> },
    /// Word which is neither a register nor a number: a label or bare hex target.
    Name(String),
}

/// Natural shape of an operand, from its syntax alone.
///
/// Names classify as relative targets. Unsized memory classifies as a word.
pub fn classify(syntax: &Syntax) -> OperandShape {
    match syntax {
        Syntax::Register(register) if register.is_byte() => R8,
        Syntax::Register(_) => R16,
        Syntax::Number { value, .. } if (-0x80..=0xFF).contains(value) => I8,
        Syntax::Number { .. } => I16,
        Syntax::Memory {
            width: Some(Width::Byte),
            ..
        } => M8,
        Syntax::Memory { .. } => M16,
        Syntax::Name(_) => Rel16,
    }
}

/// Whether an operand may fill a slot of `shape`. An immediate may be forced wider by the slot but
/// never narrower.
pub fn accepts(syntax: &Syntax, shape: OperandShape) -> bool {
    match (syntax, shape) {
        (Syntax::Register(register), R8) => register.is_byte(),
        (Syntax::Register(register), R16) => !register.is_byte(),
        (Syntax::Number { value, .. }, I8) => (-0x80..=0xFF).contains(value),
        (Syntax::Number { value, .. }, I16) => (-0x8000..=0xFFFF).contains(value),
        (Syntax::Memory { width, .. }, M8) => *width != Some(Width::Word),
        (Syntax::Memory { width, .. }, M16) => *width != Some(Width::Byte),
        (Syntax::Number { bare, value }, Rel8 | Rel16) => {
            bare.is_some() || (0..=0xFFFF).contains(value)
        }
        (Syntax::Name(_), Rel8 | Rel16) => true,
        _ => false,
    }
}

/// First form of `mnemonic` whose every slot accepts the matching operand.
///
/// Tries the exact shape tuple first, then falls back to declaration order.
pub fn resolve(mnemonic: Mnemonic, operands: &[Syntax]) -> Option<&'static Entry> {
    let table: &'static OpcodeTable = &OPCODES;
    let shapes: Vec<OperandShape> = operands.iter().map(classify).collect();
    if let Some(entry) = table.lookup(mnemonic, &shapes) {
        if entry.shapes.iter().zip(operands).all(|(s, o)| accepts(o, *s)) {
            return Some(entry);
        }
    }
    table.forms(mnemonic).find(|entry| {
        entry.shapes.len() == operands.len()
            && entry
                .shapes
                .iter()
                .zip(operands)
                .all(|(shape, operand)| accepts(operand, *shape))
    })
}
