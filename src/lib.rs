// Engine
mod symbol;
pub use symbol::{ByteRegister, Flag, RegOperand, Register};
pub mod registers;
pub mod memory;
pub mod disk;
pub mod opcode;

// Text <-> bytes
pub mod span;
mod lexer;
pub mod instr;
pub mod asm;
pub mod disasm;
pub use asm::{assemble_program, Assembler, Context};
pub use disasm::{disassemble, Listing};

// Running
pub mod alu;
pub mod runtime;
pub use runtime::{Console, Machine, Outcome};

#[macro_use]
pub mod output;
mod session;
pub use session::{Session, SessionOptions, STEP_LIMIT};

pub mod error;
pub mod env;

pub type FxMap<K, V> = indexmap::IndexMap<K, V, fxhash::FxBuildHasher>;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
