use std::io::{stdin, stdout, BufRead, IsTerminal, Write};

use console::Term;

use crate::alu::{self, AluOutput};
use crate::error::ExecError;
use crate::instr::{Instruction, Operand};
use crate::memory::{Address, Memory};
use crate::opcode::Mnemonic;
use crate::registers::RegisterFile;
use crate::symbol::{ByteRegister, Flag, Register};

/// Longest encoded instruction.
pub const MAX_INSTRUCTION_LEN: usize = 5;

/// What the caller should do after an instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    Continue,
    /// `hlt` was executed.
    Halt,
    /// A terminate service was called with this exit code.
    Terminate(u8),
}

/// Program-facing character I/O used by interrupt services.
pub trait Console {
    fn write(&mut self, bytes: &[u8]);
    /// `None` indicates EOF.
    fn read_line(&mut self) -> Option<String>;
}

/// Standard output, and standard input or an unbuffered terminal.
pub struct StdConsole;

impl Console for StdConsole {
    fn write(&mut self, bytes: &[u8]) {
        let mut out = stdout();
        // Program output is best-effort; a closed pipe must not abort the session
        let _ = out.write_all(bytes);
        let _ = out.flush();
    }

    fn read_line(&mut self) -> Option<String> {
        if stdin().is_terminal() {
            return Term::stdout().read_line().ok();
        }
        let mut line = String::new();
        match stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

/// Complete simulated machine state.
pub struct Machine {
    pub regs: RegisterFile,
    pub memory: Memory,
}

type Handler = fn(&mut Machine, &Instruction, &mut dyn Console) -> Result<Outcome, ExecError>;

impl Machine {
    pub fn new(pages: u16) -> Self {
        Self {
            regs: RegisterFile::new(),
            memory: Memory::new(pages),
        }
    }

    /// Address of the next instruction.
    pub fn code_address(&self) -> Address {
        Address::new(self.regs.get(Register::Cs), self.regs.ip())
    }

    /// Decode the instruction at CS:IP without executing it.
    pub fn fetch(&self) -> Result<Instruction, ExecError> {
        let address = self.code_address();
        let bytes = self.memory.page_tail(address, MAX_INSTRUCTION_LEN)?;
        Instruction::decode(bytes, address.offset).map_err(ExecError::InvalidInstruction)
    }

    /// Fetch, advance IP past, and execute one instruction. On error IP is left on the failed
    /// instruction.
    pub fn step(&mut self, console: &mut dyn Console) -> Result<(Instruction, Outcome), ExecError> {
        let instruction = self.fetch()?;
        let ip = self.regs.ip();
        self.regs.set_ip(ip.wrapping_add(instruction.size() as u16));
        match self.execute(&instruction, console) {
            Ok(outcome) => Ok((instruction, outcome)),
            Err(error) => {
                self.regs.set_ip(ip);
                Err(error)
            }
        }
    }

    /// Execute a decoded instruction. IP must already point past it.
    pub fn execute(
        &mut self,
        instruction: &Instruction,
        console: &mut dyn Console,
    ) -> Result<Outcome, ExecError> {
        Self::handler(instruction.mnemonic())(self, instruction, console)
    }

    fn handler(mnemonic: Mnemonic) -> Handler {
        use Mnemonic::*;
        match mnemonic {
            Mov => Self::mov,
            Add | Sub | Cmp | And | Or | Xor => Self::binary,
            Not | Neg | Inc | Dec | Shl | Shr | Rol | Ror => Self::unary,
            Push | Pop | Pushf | Popf => Self::stack,
            Jmp | Call | Ret | Jz | Jnz | Jc | Jnc | Js | Jns | Jo | Jno | Loop => Self::branch,
            Int => Self::interrupt,
            Nop | Hlt | Clc | Stc | Cmc => Self::control,
        }
    }

    fn data_address(&self, offset: u16) -> Address {
        Address::new(self.regs.get(Register::Ds), offset)
    }

    fn read(&self, operand: &Operand) -> Result<u16, ExecError> {
        Ok(match *operand {
            Operand::Reg(register) => self.regs.get_operand(register),
            Operand::Imm8(value) => value as u16,
            Operand::Imm16(value) | Operand::Rel(value) => value,
            Operand::Mem8(offset) => self.memory.peek(self.data_address(offset))? as u16,
            Operand::Mem16(offset) => self.memory.read_word(self.data_address(offset))?,
        })
    }

    fn write(
        &mut self,
        operand: &Operand,
        value: u16,
        mnemonic: Mnemonic,
    ) -> Result<(), ExecError> {
        match *operand {
            Operand::Reg(register) => self.regs.set_operand(register, value),
            Operand::Mem8(offset) => {
                let address = self.data_address(offset);
                self.memory.poke(address, value as u8)?;
            }
            Operand::Mem16(offset) => {
                let address = self.data_address(offset);
                self.memory.write_word(address, value)?;
            }
            Operand::Imm8(_) | Operand::Imm16(_) | Operand::Rel(_) => {
                return Err(ExecError::OperandMismatch { mnemonic });
            }
        }
        Ok(())
    }

    /// Flags are only merged once the result has been stored.
    fn apply(
        &mut self,
        instruction: &Instruction,
        dest: &Operand,
        output: AluOutput,
    ) -> Result<(), ExecError> {
        if instruction.mnemonic() != Mnemonic::Cmp {
            self.write(dest, output.value, instruction.mnemonic())?;
        }
        self.regs.merge_flags(output.flags, instruction.entry.flags);
        Ok(())
    }

    pub fn push(&mut self, value: u16) -> Result<(), ExecError> {
        let sp = self.regs.get(Register::Sp).wrapping_sub(2);
        let address = Address::new(self.regs.get(Register::Ss), sp);
        self.memory.write_word(address, value)?;
        self.regs.set(Register::Sp, sp);
        Ok(())
    }

    /// Word on top of the stack, leaving SP alone.
    fn stack_top(&self) -> Result<u16, ExecError> {
        let address = Address::new(self.regs.get(Register::Ss), self.regs.get(Register::Sp));
        Ok(self.memory.read_word(address)?)
    }

    fn discard_top(&mut self) {
        let sp = self.regs.get(Register::Sp);
        self.regs.set(Register::Sp, sp.wrapping_add(2));
    }

    pub fn pop(&mut self) -> Result<u16, ExecError> {
        let value = self.stack_top()?;
        self.discard_top();
        Ok(value)
    }

    fn mov(&mut self, instruction: &Instruction, _: &mut dyn Console) -> Result<Outcome, ExecError> {
        let [dest, source] = operands(instruction)?;
        let value = self.read(source)?;
        self.write(dest, value, instruction.mnemonic())?;
        Ok(Outcome::Continue)
    }

    fn binary(
        &mut self,
        instruction: &Instruction,
        _: &mut dyn Console,
    ) -> Result<Outcome, ExecError> {
        let [dest, source] = operands(instruction)?;
        let width = instruction.entry.width();
        let (a, b) = (self.read(dest)?, self.read(source)?);
        let output = match instruction.mnemonic() {
            Mnemonic::Add => alu::add(a, b, width),
            Mnemonic::Sub | Mnemonic::Cmp => alu::sub(a, b, width),
            Mnemonic::And => alu::and(a, b, width),
            Mnemonic::Or => alu::or(a, b, width),
            Mnemonic::Xor => alu::xor(a, b, width),
            mnemonic => return Err(ExecError::OperandMismatch { mnemonic }),
        };
        self.apply(instruction, dest, output)?;
        Ok(Outcome::Continue)
    }

    fn unary(
        &mut self,
        instruction: &Instruction,
        _: &mut dyn Console,
    ) -> Result<Outcome, ExecError> {
        let [operand] = operands(instruction)?;
        let width = instruction.entry.width();
        let a = self.read(operand)?;
        let output = match instruction.mnemonic() {
            Mnemonic::Not => alu::not(a, width),
            Mnemonic::Neg => alu::neg(a, width),
            Mnemonic::Inc => alu::inc(a, width),
            Mnemonic::Dec => alu::dec(a, width),
            Mnemonic::Shl => alu::shl(a, width),
            Mnemonic::Shr => alu::shr(a, width),
            Mnemonic::Rol => alu::rol(a, width),
            Mnemonic::Ror => alu::ror(a, width),
            mnemonic => return Err(ExecError::OperandMismatch { mnemonic }),
        };
        self.apply(instruction, operand, output)?;
        Ok(Outcome::Continue)
    }

    fn stack(&mut self, instruction: &Instruction, _: &mut dyn Console) -> Result<Outcome, ExecError> {
        match instruction.mnemonic() {
            Mnemonic::Push => {
                let [operand] = operands(instruction)?;
                let value = self.read(operand)?;
                self.push(value)?;
            }
            Mnemonic::Pop => {
                let [operand] = operands(instruction)?;
                if let Operand::Reg(_) = operand {
                    let value = self.pop()?;
                    self.write(operand, value, Mnemonic::Pop)?;
                } else {
                    // SP moves only once the store has succeeded
                    let value = self.stack_top()?;
                    self.write(operand, value, Mnemonic::Pop)?;
                    self.discard_top();
                }
            }
            Mnemonic::Pushf => self.push(self.regs.flags())?,
            Mnemonic::Popf => {
                let flags = self.pop()?;
                self.regs.set_flags(flags);
            }
            mnemonic => return Err(ExecError::OperandMismatch { mnemonic }),
        }
        Ok(Outcome::Continue)
    }

    fn branch(
        &mut self,
        instruction: &Instruction,
        _: &mut dyn Console,
    ) -> Result<Outcome, ExecError> {
        use Mnemonic::*;
        let mnemonic = instruction.mnemonic();
        if mnemonic == Ret {
            let target = self.pop()?;
            self.regs.set_ip(target);
            return Ok(Outcome::Continue);
        }

        let [target] = operands(instruction)?;
        let target = self.read(target)?;
        let flags = self.regs.flags();
        let flag = |flag: Flag| flags & flag.mask() != 0;
        let taken = match mnemonic {
            Jmp | Call => true,
            Jz => flag(Flag::Zero),
            Jnz => !flag(Flag::Zero),
            Jc => flag(Flag::Carry),
            Jnc => !flag(Flag::Carry),
            Js => flag(Flag::Sign),
            Jns => !flag(Flag::Sign),
            Jo => flag(Flag::Overflow),
            Jno => !flag(Flag::Overflow),
            Loop => {
                let cx = self.regs.get(Register::Cx).wrapping_sub(1);
                self.regs.set(Register::Cx, cx);
                cx != 0
            }
            _ => return Err(ExecError::OperandMismatch { mnemonic }),
        };
        if mnemonic == Call {
            self.push(self.regs.ip())?;
        }
        if taken {
            self.regs.set_ip(target);
        }
        Ok(Outcome::Continue)
    }

    fn control(
        &mut self,
        instruction: &Instruction,
        _: &mut dyn Console,
    ) -> Result<Outcome, ExecError> {
        match instruction.mnemonic() {
            Mnemonic::Hlt => return Ok(Outcome::Halt),
            Mnemonic::Clc => self.regs.set_flag(Flag::Carry, false),
            Mnemonic::Stc => self.regs.set_flag(Flag::Carry, true),
            Mnemonic::Cmc => {
                let carry = self.regs.get_flag(Flag::Carry);
                self.regs.set_flag(Flag::Carry, !carry);
            }
            _ => (),
        }
        Ok(Outcome::Continue)
    }

    fn interrupt(
        &mut self,
        instruction: &Instruction,
        console: &mut dyn Console,
    ) -> Result<Outcome, ExecError> {
        let [number] = operands(instruction)?;
        let number = self.read(number)? as u8;
        let service = self.regs.get_byte(ByteRegister::Ah);
        match (number, service) {
            (0x20, _) => return Ok(Outcome::Terminate(0)),
            // Print character
            (0x21, 0x02) => console.write(&[self.regs.get_byte(ByteRegister::Dl)]),
            // Print `$`-terminated string
            (0x21, 0x09) => {
                let start = self.data_address(self.regs.get(Register::Dx));
                let tail = self.memory.page_tail(start, usize::MAX)?;
                let end = tail.iter().position(|b| *b == b'$').unwrap_or(tail.len());
                console.write(&tail[..end]);
            }
            // Buffered line input
            (0x21, 0x0A) => self.read_buffered(console)?,
            (0x21, 0x4C) => {
                return Ok(Outcome::Terminate(self.regs.get_byte(ByteRegister::Al)));
            }
            (interrupt, service) => {
                return Err(ExecError::UnsupportedService { interrupt, service });
            }
        }
        Ok(Outcome::Continue)
    }

    /// Buffer at DS:DX. Byte 0 is the capacity including the final CR, byte 1 receives the
    /// character count, then the characters.
    fn read_buffered(&mut self, console: &mut dyn Console) -> Result<(), ExecError> {
        let start = self.data_address(self.regs.get(Register::Dx));
        let capacity = self.memory.peek(start)? as usize;
        let line = console.read_line().unwrap_or_default();
        if capacity == 0 {
            self.memory.poke(start.wrapping_add(1), 0)?;
            return Ok(());
        }
        let mut bytes: Vec<u8> = line.bytes().take(capacity - 1).collect();
        let count = bytes.len() as u8;
        bytes.push(b'\r');
        self.memory.poke(start.wrapping_add(1), count)?;
        self.memory.poke_bytes(start.wrapping_add(2), &bytes)?;
        Ok(())
    }
}

fn operands<const N: usize>(instruction: &Instruction) -> Result<[&Operand; N], ExecError> {
    let mut result = Vec::with_capacity(N);
    result.extend(instruction.operands.iter());
    result.try_into().map_err(|_| ExecError::OperandMismatch {
        mnemonic: instruction.mnemonic(),
    })
}
