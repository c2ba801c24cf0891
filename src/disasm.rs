use std::fmt;

use crate::error::DisassembleDiagnostic;
use crate::instr::Instruction;

/// One element of a listing: a decoded instruction or a byte which did not decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Listing {
    Instruction {
        offset: u16,
        instruction: Instruction,
        next_offset: u16,
    },
    Diagnostic(DisassembleDiagnostic),
}

impl Listing {
    pub fn offset(&self) -> u16 {
        match self {
            Self::Instruction { offset, .. } => *offset,
            Self::Diagnostic(
                DisassembleDiagnostic::UnknownOpcode { offset, .. }
                | DisassembleDiagnostic::Truncated { offset, .. }
                | DisassembleDiagnostic::InvalidRegister { offset, .. },
            ) => *offset,
        }
    }

    /// Bytes consumed by this element.
    pub fn size(&self) -> usize {
        match self {
            Self::Instruction { instruction, .. } => instruction.size(),
            Self::Diagnostic(_) => 1,
        }
    }

    /// Text of the instruction, or of the diagnostic.
    pub fn text(&self) -> String {
        match self {
            Self::Instruction { instruction, .. } => instruction.to_string(),
            Self::Diagnostic(diagnostic) => format!("??? ; {}", diagnostic),
        }
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}  {}", self.offset(), self.text())
    }
}

/// Lazy decoder over a byte slice.
///
/// Never stops early: an undecodable byte yields one diagnostic and decoding resumes at the
/// following byte.
pub struct Disassembler<'a> {
    bytes: &'a [u8],
    origin: u16,
    position: usize,
}

/// Decode `bytes`, whose first byte lives at `origin`.
pub fn disassemble(bytes: &[u8], origin: u16) -> Disassembler<'_> {
    Disassembler {
        bytes,
        origin,
        position: 0,
    }
}

impl Iterator for Disassembler<'_> {
    type Item = Listing;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.bytes.get(self.position..).filter(|rest| !rest.is_empty())?;
        let offset = self.origin.wrapping_add(self.position as u16);
        let item = match Instruction::decode(rest, offset) {
            Ok(instruction) => {
                let next_offset = offset.wrapping_add(instruction.size() as u16);
                Listing::Instruction {
                    offset,
                    instruction,
                    next_offset,
                }
            }
            Err(diagnostic) => Listing::Diagnostic(diagnostic),
        };
        self.position += item.size();
        Some(item)
    }
}

impl std::iter::FusedIterator for Disassembler<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_offsets() {
        let bytes = [0xB8, 0x05, 0x00, 0x00, 0x90, 0xF4];
        let listing: Vec<Listing> = disassemble(&bytes, 0x100).collect();
        assert_eq!(listing.len(), 3);
        let Listing::Instruction {
            offset,
            next_offset,
            ..
        } = &listing[0]
        else {
            panic!("expected instruction");
        };
        assert_eq!((*offset, *next_offset), (0x100, 0x104));
        assert_eq!(listing[0].to_string(), "0100  mov ax, 0x0005");
        assert_eq!(listing[1].to_string(), "0104  nop");
        assert_eq!(listing[2].to_string(), "0105  hlt");
    }

    #[test]
    fn recovers_after_unknown_byte() {
        let bytes = [0x90, 0xFF, 0xFE, 0x90];
        let listing: Vec<String> = disassemble(&bytes, 0x200).map(|l| l.to_string()).collect();
        assert_eq!(
            listing,
            vec![
                "0200  nop",
                "0201  ??? ; Unknown opcode FF at 0201.",
                "0202  ??? ; Unknown opcode FE at 0202.",
                "0203  nop",
            ]
        );
    }

    #[test]
    fn truncated_tail() {
        let bytes = [0x90, 0xB8, 0xFF];
        let listing: Vec<Listing> = disassemble(&bytes, 0).collect();
        assert_eq!(listing.len(), 3);
        assert_eq!(
            listing[1],
            Listing::Diagnostic(DisassembleDiagnostic::Truncated { offset: 1, byte: 0xB8 })
        );
        assert_eq!(
            listing[2],
            Listing::Diagnostic(DisassembleDiagnostic::UnknownOpcode { offset: 2, byte: 0xFF })
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(disassemble(&[], 0).count(), 0);
    }
}
