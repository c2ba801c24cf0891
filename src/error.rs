use std::error::Error;
use std::{fmt, io};

use miette::{miette, LabeledSpan, Report, Severity};

use crate::memory::Address;
use crate::opcode::{Mnemonic, OperandShape};
use crate::span::Span;

/// Bad register or flag name.
#[derive(Debug, PartialEq, Eq)]
pub enum NameError {
    UnknownRegister(String),
    UnknownFlag(String),
}

/// Failed access to simulated memory.
#[derive(Debug, PartialEq, Eq)]
pub enum MemoryError {
    /// Page is not allocated, or a range runs past the end of its page.
    OutOfRange { address: Address, len: usize },
    /// Destination of a move overlaps its source.
    Overlap { source: (Address, u16), dest: Address },
    /// Range end comes before its start.
    InvalidRange { start: u16, end: u16 },
}

/// Failed virtual disk transfer.
#[derive(Debug)]
pub enum DiskError {
    OutOfRange {
        first_sector: usize,
        count: usize,
        sector_count: usize,
    },
    /// Byte range of `cat` past the end of the disk, or reversed.
    BytesOutOfRange {
        start: usize,
        end: usize,
        len: usize,
    },
    /// Memory side of a transfer is outside allocated pages.
    Memory(MemoryError),
    Io(io::Error),
}

/// Failed to turn one line of text into an instruction.
#[derive(Debug, PartialEq, Eq)]
pub enum AssembleError {
    UnknownMnemonic {
        token: String,
        span: Span,
    },
    OperandCount {
        mnemonic: Mnemonic,
        found: usize,
        span: Span,
    },
    MalformedOperand {
        token: String,
        span: Span,
    },
    NoMatchingForm {
        mnemonic: Mnemonic,
        shapes: Vec<OperandShape>,
        span: Span,
    },
    UnknownLabel {
        token: String,
        span: Span,
    },
    DuplicateLabel {
        token: String,
        span: Span,
    },
}

/// Byte sequence which could not be decoded. Scanning resumes at `offset + 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisassembleDiagnostic {
    UnknownOpcode { offset: u16, byte: u8 },
    /// Operand bytes run past the end of the input.
    Truncated { offset: u16, byte: u8 },
    InvalidRegister { offset: u16, byte: u8 },
}

/// Failed to execute a decoded instruction.
#[derive(Debug, PartialEq, Eq)]
pub enum ExecError {
    /// Operand kind cannot be used in this position, e.g. an immediate destination.
    OperandMismatch { mnemonic: Mnemonic },
    UnsupportedService { interrupt: u8, service: u8 },
    AddressOutOfRange(MemoryError),
    /// Instruction fetch found bytes which do not decode.
    InvalidInstruction(DisassembleDiagnostic),
}

impl Error for NameError {}
impl Error for MemoryError {}
impl Error for AssembleError {}
impl Error for DisassembleDiagnostic {}
impl Error for ExecError {}

impl Error for DiskError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            Self::Memory(error) => Some(error),
            Self::OutOfRange { .. } | Self::BytesOutOfRange { .. } => None,
        }
    }
}

impl From<io::Error> for DiskError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<MemoryError> for DiskError {
    fn from(error: MemoryError) -> Self {
        Self::Memory(error)
    }
}

impl From<MemoryError> for ExecError {
    fn from(error: MemoryError) -> Self {
        Self::AddressOutOfRange(error)
    }
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRegister(name) => write!(f, "Unknown register `{}`.", name),
            Self::UnknownFlag(name) => write!(f, "Unknown flag `{}`.", name),
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { address, len } => {
                write!(f, "Address out of range: {} (+{:x} bytes).", address, len)
            }
            Self::Overlap { source, dest } => {
                write!(
                    f,
                    "Destination {} overlaps source {}-{:04X}. Nothing was moved.",
                    dest, source.0, source.1
                )
            }
            Self::InvalidRange { start, end } => {
                write!(f, "Invalid range: {:04X} comes after {:04X}.", start, end)
            }
        }
    }
}

impl fmt::Display for DiskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange {
                first_sector,
                count,
                sector_count,
            } => {
                write!(
                    f,
                    "Sectors {:X}..{:X} out of range: disk has {:X} sectors.",
                    first_sector,
                    first_sector + count,
                    sector_count
                )
            }
            Self::BytesOutOfRange { start, end, len } => {
                write!(
                    f,
                    "Bytes {:X}..={:X} out of range: disk has {:X} bytes.",
                    start, end, len
                )
            }
            Self::Memory(error) => write!(f, "{}", error),
            Self::Io(error) => write!(f, "Disk image: {}.", error),
        }
    }
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMnemonic { token, .. } => write!(f, "Unknown mnemonic `{}`.", token),
            Self::OperandCount {
                mnemonic, found, ..
            } => {
                write!(
                    f,
                    "Wrong number of operands for `{}`: found {}.",
                    mnemonic, found
                )
            }
            Self::MalformedOperand { token, .. } => write!(f, "Malformed operand `{}`.", token),
            Self::NoMatchingForm {
                mnemonic, shapes, ..
            } => {
                write!(f, "No form of `{}` takes (", mnemonic)?;
                for (i, shape) in shapes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", shape)?;
                }
                write!(f, ").")
            }
            Self::UnknownLabel { token, .. } => write!(f, "Unknown label `{}`.", token),
            Self::DuplicateLabel { token, .. } => write!(f, "Label `{}` already defined.", token),
        }
    }
}

impl fmt::Display for DisassembleDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { offset, byte } => {
                write!(f, "Unknown opcode {:02X} at {:04X}.", byte, offset)
            }
            Self::Truncated { offset, byte } => {
                write!(f, "Truncated instruction {:02X} at {:04X}.", byte, offset)
            }
            Self::InvalidRegister { offset, byte } => {
                write!(f, "Invalid register operand in {:02X} at {:04X}.", byte, offset)
            }
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperandMismatch { mnemonic } => {
                write!(f, "Operand cannot be written by `{}`.", mnemonic)
            }
            Self::UnsupportedService { interrupt, service } => {
                write!(
                    f,
                    "Unsupported service: int {:02X}h, ah={:02X}h.",
                    interrupt, service
                )
            }
            Self::AddressOutOfRange(error) => write!(f, "{}", error),
            Self::InvalidInstruction(diagnostic) => write!(f, "{}", diagnostic),
        }
    }
}

impl AssembleError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnknownMnemonic { span, .. }
            | Self::OperandCount { span, .. }
            | Self::MalformedOperand { span, .. }
            | Self::NoMatchingForm { span, .. }
            | Self::UnknownLabel { span, .. }
            | Self::DuplicateLabel { span, .. } => *span,
        }
    }

    /// Move span from line-relative to source-relative.
    pub fn offset_span(mut self, by: usize) -> Self {
        match &mut self {
            Self::UnknownMnemonic { span, .. }
            | Self::OperandCount { span, .. }
            | Self::MalformedOperand { span, .. }
            | Self::NoMatchingForm { span, .. }
            | Self::UnknownLabel { span, .. }
            | Self::DuplicateLabel { span, .. } => *span = span.offset(by),
        }
        self
    }

    fn code(&self) -> &'static str {
        match self {
            Self::UnknownMnemonic { .. } => "asm::mnemonic",
            Self::OperandCount { .. } => "asm::operand_count",
            Self::MalformedOperand { .. } => "asm::operand",
            Self::NoMatchingForm { .. } => "asm::form",
            Self::UnknownLabel { .. } => "asm::label",
            Self::DuplicateLabel { .. } => "asm::duplicate_label",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            Self::UnknownMnemonic { .. } => "run `help` in a session to list the instruction set",
            Self::OperandCount { .. } => "operands are separated by commas",
            Self::MalformedOperand { .. } => {
                "literals may be written 0x1F, 0b101, 31 or 1Fh; memory operands as [hhhh]"
            }
            Self::NoMatchingForm { .. } => {
                "operand widths must agree; prefix memory with `byte` or `word` to pick a width"
            }
            Self::UnknownLabel { .. } => "labels are defined with `name:` on their own line",
            Self::DuplicateLabel { .. } => "label names must be unique",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::UnknownMnemonic { .. } => "unknown mnemonic",
            Self::OperandCount { .. } => "wrong operand count",
            Self::MalformedOperand { .. } => "malformed operand",
            Self::NoMatchingForm { .. } => "no matching form",
            Self::UnknownLabel { .. } => "unknown label",
            Self::DuplicateLabel { .. } => "duplicate label",
        }
    }
}

/// Render an assembler error against the source file it came from.
pub fn asm_report(error: AssembleError, src: String) -> Report {
    let span = error.span();
    miette!(
        severity = Severity::Error,
        code = error.code(),
        help = error.help(),
        labels = vec![LabeledSpan::at(span, error.label())],
        "{}",
        error,
    )
    .with_source_code(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let error = MemoryError::InvalidRange {
            start: 0x200,
            end: 0x100,
        };
        assert_eq!(error.to_string(), "Invalid range: 0200 comes after 0100.");

        let error = ExecError::UnsupportedService {
            interrupt: 0x21,
            service: 0x30,
        };
        assert_eq!(error.to_string(), "Unsupported service: int 21h, ah=30h.");

        let error = DisassembleDiagnostic::UnknownOpcode {
            offset: 0x104,
            byte: 0xFF,
        };
        assert_eq!(error.to_string(), "Unknown opcode FF at 0104.");
    }

    #[test]
    fn offset_span_moves_label() {
        let error = AssembleError::UnknownMnemonic {
            token: "mvo".to_string(),
            span: Span::new(0, 3),
        }
        .offset_span(10);
        assert_eq!(error.span(), Span::new(10, 3));
    }
}
