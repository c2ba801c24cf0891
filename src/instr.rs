use std::fmt;

use crate::error::DisassembleDiagnostic;
use crate::opcode::{Entry, Mnemonic, OperandShape, OPCODES};
use crate::symbol::RegOperand;

/// Operand value, resolved to the shape its table entry expects.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    Reg(RegOperand),
    Imm8(u8),
    Imm16(u16),
    /// Offset into page DS.
    Mem8(u16),
    Mem16(u16),
    /// Absolute jump target within the code page.
    Rel(u16),
}

/// Decoded instruction: a table entry plus one operand per shape in its signature.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Instruction {
    pub entry: &'static Entry,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(entry: &'static Entry, operands: Vec<Operand>) -> Self {
        debug_assert_eq!(entry.shapes.len(), operands.len());
        Self { entry, operands }
    }

    pub fn mnemonic(&self) -> Mnemonic {
        self.entry.mnemonic
    }

    /// Encoded length in bytes.
    pub fn size(&self) -> usize {
        self.entry.encoded_len()
    }

    /// Opcode byte followed by each operand in declaration order.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.size());
        bytes.push(self.entry.opcode);
        for operand in &self.operands {
            match *operand {
                Operand::Reg(register) => bytes.push(register.index()),
                Operand::Imm8(value) => bytes.push(value),
                Operand::Imm16(value)
                | Operand::Mem8(value)
                | Operand::Mem16(value)
                | Operand::Rel(value) => bytes.extend_from_slice(&value.to_le_bytes()),
            }
        }
        bytes
    }

    /// Decode one instruction from the start of `bytes`. `offset` only labels diagnostics.
    pub fn decode(bytes: &[u8], offset: u16) -> Result<Self, DisassembleDiagnostic> {
        let Some(&opcode) = bytes.first() else {
            return Err(DisassembleDiagnostic::Truncated { offset, byte: 0 });
        };
        let entry: &'static Entry = OPCODES
            .decode(opcode)
            .ok_or(DisassembleDiagnostic::UnknownOpcode {
                offset,
                byte: opcode,
            })?;
        if bytes.len() < entry.encoded_len() {
            return Err(DisassembleDiagnostic::Truncated {
                offset,
                byte: opcode,
            });
        }

        let mut cursor = 1;
        let mut operands = Vec::with_capacity(entry.shapes.len());
        for shape in entry.shapes {
            let word = || u16::from_le_bytes([bytes[cursor], bytes[cursor + 1]]);
            let operand = match shape {
                OperandShape::R8 | OperandShape::R16 => {
                    let register = RegOperand::from_index(bytes[cursor])
                        .filter(|register| register.is_byte() == (*shape == OperandShape::R8))
                        .ok_or(DisassembleDiagnostic::InvalidRegister {
                            offset,
                            byte: opcode,
                        })?;
                    Operand::Reg(register)
                }
                OperandShape::I8 => Operand::Imm8(bytes[cursor]),
                OperandShape::I16 => Operand::Imm16(word()),
                OperandShape::M8 => Operand::Mem8(word()),
                OperandShape::M16 => Operand::Mem16(word()),
                OperandShape::Rel8 | OperandShape::Rel16 => Operand::Rel(word()),
            };
            cursor += shape.byte_len();
            operands.push(operand);
        }
        Ok(Self { entry, operands })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entry.mnemonic)?;
        let has_register = self
            .operands
            .iter()
            .any(|operand| matches!(operand, Operand::Reg(_)));
        for (i, operand) in self.operands.iter().enumerate() {
            write!(f, "{}", if i == 0 { " " } else { ", " })?;
            match operand {
                Operand::Reg(register) => write!(f, "{}", register)?,
                Operand::Imm8(value) => write!(f, "0x{:02X}", value)?,
                Operand::Imm16(value) => write!(f, "0x{:04X}", value)?,
                Operand::Mem8(offset) if !has_register => write!(f, "byte [{:04X}]", offset)?,
                Operand::Mem16(offset) if !has_register => write!(f, "word [{:04X}]", offset)?,
                Operand::Mem8(offset) | Operand::Mem16(offset) => write!(f, "[{:04X}]", offset)?,
                Operand::Rel(target) => write!(f, "{:04X}", target)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{ByteRegister, Register};

    fn entry(opcode: u8) -> &'static Entry {
        OPCODES.decode(opcode).unwrap()
    }

    #[test]
    fn encode_layout() {
        let mov = Instruction::new(
            entry(0xB8),
            vec![Operand::Reg(RegOperand::Word(Register::Ax)), Operand::Imm16(0x0005)],
        );
        assert_eq!(mov.encode(), vec![0xB8, 0x00, 0x05, 0x00]);
        assert_eq!(mov.to_string(), "mov ax, 0x0005");

        let store = Instruction::new(
            entry(0x88),
            vec![Operand::Mem8(0x0200), Operand::Reg(RegOperand::Byte(ByteRegister::Al))],
        );
        assert_eq!(store.encode(), vec![0x88, 0x00, 0x02, 0x08]);
        assert_eq!(store.to_string(), "mov [0200], al");

        let inc = Instruction::new(entry(0x61), vec![Operand::Mem16(0x0300)]);
        assert_eq!(inc.to_string(), "inc word [0300]");

        let int = Instruction::new(entry(0xCD), vec![Operand::Imm8(0x21)]);
        assert_eq!(int.encode(), vec![0xCD, 0x21]);
        assert_eq!(int.to_string(), "int 0x21");
    }

    #[test]
    fn decode_round_trip() {
        let bytes = [0xE9, 0x10, 0x01, 0x90];
        let jmp = Instruction::decode(&bytes, 0x100).unwrap();
        assert_eq!(jmp.operands, vec![Operand::Rel(0x0110)]);
        assert_eq!(jmp.size(), 3);
        assert_eq!(jmp.encode(), &bytes[..3]);
        assert_eq!(jmp.to_string(), "jmp 0110");
    }

    #[test]
    fn decode_diagnostics() {
        assert_eq!(
            Instruction::decode(&[0xFF], 0x104),
            Err(DisassembleDiagnostic::UnknownOpcode {
                offset: 0x104,
                byte: 0xFF
            })
        );
        assert_eq!(
            Instruction::decode(&[0xB8, 0x00], 0x100),
            Err(DisassembleDiagnostic::Truncated {
                offset: 0x100,
                byte: 0xB8
            })
        );
        // Register 0x08 is `al`, which is not a word register.
        assert_eq!(
            Instruction::decode(&[0x81, 0x08], 0x100),
            Err(DisassembleDiagnostic::InvalidRegister {
                offset: 0x100,
                byte: 0x81
            })
        );
    }
}
