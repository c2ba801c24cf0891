//! Interactive DEBUG-style session: a small state machine over the command, assemble and ALU
//! line grammars, driving the engine one line at a time.

mod breakpoint;
mod command;
mod error;
mod parse;
mod print;
mod source;
mod watch;

use std::fmt;
use std::path::PathBuf;

use self::breakpoint::Breakpoints;
use self::command::{Command, Name, Target};
use self::source::{SourceMode, SourceReader};
use self::watch::Watches;
use crate::asm::{Assembler, Context};
use crate::disasm::disassemble;
use crate::disk::VirtualDisk;
use crate::error::{AssembleError, DiskError, MemoryError};
use crate::memory::{Address, Memory};
use crate::output::{Condition, Output, ROW_LEN};
use crate::runtime::{Machine, Outcome, StdConsole, MAX_INSTRUCTION_LEN};
use crate::symbol::Register;
use crate::{dprint, dprintln};

/// Instructions `g` executes before giving up.
pub const STEP_LIMIT: usize = 0x10000;

/// Bytes shown by `u` when no end offset is given.
const UNASSEMBLE_LEN: u16 = 0x20;

#[derive(Debug)]
pub struct SessionOptions {
    pub disk: PathBuf,
    pub sector_size: usize,
    pub sector_count: usize,
    pub pages: u16,
    /// Read session lines from this argument rather than stdin.
    pub command: Option<String>,
    pub trace: bool,
}

/// Which grammar the next line is read with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Command,
    Assemble,
    Alu,
}

type LineHandler = fn(&mut Session, &str) -> Flow;

impl Mode {
    fn handler(self) -> LineHandler {
        match self {
            Self::Command => Session::command_line,
            Self::Assemble => Session::assemble_line,
            Self::Alu => Session::alu_line,
        }
    }
}

/// What the session loop does after a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
    /// The program called a terminate service.
    Terminate(u8),
}

pub struct Session {
    machine: Machine,
    disk: VirtualDisk,
    console: StdConsole,

    mode: Mode,
    source: SourceMode,

    /// Page used when an address omits one.
    page: u16,
    /// Where the next assembled line is placed.
    assemble_at: Address,
    /// Where `d` without arguments continues.
    display_next: Address,
    /// Where `u` without arguments continues.
    unassemble_next: Address,
    assembler: Assembler,

    breakpoints: Breakpoints,
    watches: Watches,
    trace: bool,
}

/// Print the error and yield `None`.
fn report<T, E: fmt::Display>(result: Result<T, E>) -> Option<T> {
    result
        .map_err(|error| dprintln!(Always, "Error: {}", error))
        .ok()
}

impl Session {
    /// Allocate memory and load the disk image.
    pub fn new(options: SessionOptions) -> Result<Self, DiskError> {
        let mut disk = VirtualDisk::new(options.disk, options.sector_size, options.sector_count);
        disk.load()?;
        let machine = Machine::new(options.pages);
        let start = Address::new(0, machine.regs.ip());

        Ok(Self {
            machine,
            disk,
            console: StdConsole,

            mode: Mode::default(),
            source: SourceMode::from(options.command),

            page: 0,
            assemble_at: start,
            display_next: start,
            unassemble_next: start,
            assembler: Assembler::new(),

            breakpoints: Breakpoints::default(),
            watches: Watches::default(),
            trace: options.trace,
        })
    }

    /// Run until `q`, end of input or a terminate service, then save the disk.
    ///
    /// Returns the program's exit code, or 0.
    pub fn run(mut self) -> Result<u8, DiskError> {
        let code = loop {
            Output::Debugger(Condition::Always).start_new_line();
            let prompt = self.prompt();
            let Some(line) = self.source.read(&prompt) else {
                break 0;
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            match (self.mode.handler())(&mut self, &line) {
                Flow::Continue => (),
                Flow::Quit => break 0,
                Flow::Terminate(code) => {
                    dprintln!(Always, "Program terminated with exit code {}.", code);
                    break code;
                }
            }
        };

        self.disk.save()?;
        dprintln!(Sometimes, "Saved disk image {}.", self.disk.path().display());
        Ok(code)
    }

    fn prompt(&self) -> String {
        match self.mode {
            Mode::Command => "-".to_string(),
            Mode::Assemble => format!("{} ", self.assemble_at),
            Mode::Alu => "alu> ".to_string(),
        }
    }

    fn command_line(&mut self, line: &str) -> Flow {
        let command = match Command::try_from(line) {
            Ok(command) => command,
            Err(error) => {
                dprintln!(Always, "{}", error);
                dprintln!(Always, "Type `help` for a list of commands.");
                return Flow::Continue;
            }
        };
        self.run_command(command).unwrap_or(Flow::Continue)
    }

    fn assemble_line(&mut self, line: &str) -> Flow {
        if line.eq_ignore_ascii_case("q") {
            self.mode = Mode::Command;
            return Flow::Continue;
        }
        let context = Context {
            page: self.assemble_at.page,
            cursor: self.assemble_at.offset,
        };
        let bytes = match self.assembler.assemble(line, context) {
            Ok(bytes) => bytes,
            Err(error) => {
                print_assemble_error(line, &error);
                return Flow::Continue;
            }
        };
        if report(self.machine.memory.poke_bytes(self.assemble_at, &bytes)).is_some() {
            self.assemble_at = self.assemble_at.wrapping_add(bytes.len() as u16);
        }
        Flow::Continue
    }

    fn alu_line(&mut self, line: &str) -> Flow {
        if line.eq_ignore_ascii_case("q") {
            self.mode = Mode::Command;
            return Flow::Continue;
        }
        self.evaluate(line).unwrap_or(Flow::Continue)
    }

    fn run_command(&mut self, command: Command) -> Option<Flow> {
        match command {
            Command::Help => {
                dprintln!(Always, "{}", include_str!("./help.txt"));
            }
            Command::Quit => return Some(Flow::Quit),

            Command::Display { start, end } => {
                let start = start
                    .map(|location| location.resolve(self.page))
                    .unwrap_or(self.display_next);
                let (start, end) = report(Memory::display_range(start, end))?;
                let bytes = report(self.machine.memory.range(start, end))?;
                for (i, row) in bytes.chunks(ROW_LEN).enumerate() {
                    let label = start.wrapping_add((i * ROW_LEN) as u16).to_string();
                    Output::Debugger(Condition::Always).print_hex_row(&label, row);
                }
                self.display_next = start.wrapping_add(bytes.len() as u16);
            }
            Command::Enter { start, bytes } => {
                report(self.machine.memory.poke_bytes(start.resolve(self.page), &bytes))?;
            }
            Command::Fill {
                start,
                end,
                pattern,
            } => {
                report(self.machine.memory.fill(start.resolve(self.page), end, &pattern))?;
            }
            Command::Search { start, pattern } => {
                let start = start.resolve(self.page);
                let matches = report(self.machine.memory.search(start, &pattern))?;
                if matches.is_empty() {
                    dprintln!(Always, "No matches.");
                }
                for offset in matches {
                    dprintln!(Always, "{}", Address::new(start.page, offset));
                }
            }
            Command::Compare { start, end, other } => {
                let (start, other) = (start.resolve(self.page), other.resolve(self.page));
                let differences = report(self.machine.memory.compare(start, end, other))?;
                if differences.is_empty() {
                    dprintln!(Sometimes, "Ranges are identical.");
                }
                for (offset, first, second) in differences {
                    let other_offset = other.offset.wrapping_add(offset - start.offset);
                    dprintln!(
                        Always,
                        "{}  {:02X}  {:02X}  {}",
                        Address::new(start.page, offset),
                        first,
                        second,
                        Address::new(other.page, other_offset)
                    );
                }
            }
            Command::Move { start, end, dest } => {
                let (start, dest) = (start.resolve(self.page), dest.resolve(self.page));
                report(self.machine.memory.move_range(start, end, dest))?;
                dprintln!(Sometimes, "Moved {}-{:04X} to {}.", start, end, dest);
            }
            Command::HexMath { left, right } => {
                dprintln!(
                    Always,
                    "{:04X}  {:04X}",
                    left.wrapping_add(right),
                    left.wrapping_sub(right)
                );
            }

            Command::Load {
                start,
                first_sector,
                count,
            } => {
                let start = start.resolve(self.page);
                report(self.disk.read(
                    &mut self.machine.memory,
                    start,
                    first_sector as usize,
                    count as usize,
                ))?;
                dprintln!(Sometimes, "Read {:X} sector(s) from {:X} into {}.", count, first_sector, start);
            }
            Command::Write {
                start,
                first_sector,
                count,
            } => {
                let start = start.resolve(self.page);
                report(self.disk.write(
                    &self.machine.memory,
                    start,
                    first_sector as usize,
                    count as usize,
                ))?;
                dprintln!(Sometimes, "Wrote {:X} sector(s) from {} to {:X}.", count, start, first_sector);
            }
            Command::Cat { start, end } => {
                let bytes = report(self.disk.cat(start as usize, end as usize))?;
                for (i, row) in bytes.chunks(ROW_LEN).enumerate() {
                    let label = format!("{:08X}", start as usize + i * ROW_LEN);
                    Output::Debugger(Condition::Always).print_hex_row(&label, row);
                }
            }
            Command::DiskInfo => {
                dprintln!(
                    Always,
                    "{}: {} sectors of {} bytes ({} bytes)",
                    self.disk.path().display(),
                    self.disk.sector_count(),
                    self.disk.sector_size(),
                    self.disk.len()
                );
            }
            Command::Save => {
                report(self.disk.save())?;
                dprintln!(Always, "Saved disk image {}.", self.disk.path().display());
            }

            Command::SetPage { page } => {
                if page >= self.machine.memory.pages() {
                    report::<(), _>(Err(MemoryError::OutOfRange {
                        address: Address::new(page, 0),
                        len: 0,
                    }))?;
                }
                self.page = page;
                self.machine.regs.set(Register::Cs, page);
                self.machine.regs.set(Register::Ds, page);
                let ip = self.machine.regs.ip();
                self.assemble_at = Address::new(page, ip);
                self.display_next = Address::new(page, ip);
                self.unassemble_next = Address::new(page, ip);
                dprintln!(Sometimes, "Active page is {:04X}.", page);
            }
            Command::Registers => self.show_state(),
            Command::SetRegister { name, value } => match name {
                Name::Register(register) => self.machine.regs.set(register, value),
                Name::Byte(register) => self.machine.regs.set_byte(register, value as u8),
                Name::Flag(flag) => self.machine.regs.set_flag(flag, value != 0),
            },

            Command::Assemble { start } => {
                if let Some(start) = start {
                    self.assemble_at = start.resolve(self.page);
                }
                self.mode = Mode::Assemble;
                dprintln!(Sometimes, "Assembling at {}. Enter `q` to return.", self.assemble_at);
            }
            Command::Alu => {
                self.mode = Mode::Alu;
                dprintln!(Sometimes, "ALU mode. Enter `q` to return.");
            }
            Command::Eval { instruction } => return self.evaluate(instruction),
            Command::Unassemble { start, end } => {
                let start = start
                    .map(|location| location.resolve(self.page))
                    .unwrap_or(self.unassemble_next);
                self.unassemble(start, end)?;
            }
            Command::Trace { count } => {
                let flow = self.execute(count as usize, false)?;
                if flow == Flow::Continue {
                    self.show_state();
                }
                return Some(flow);
            }
            Command::Go { start } => {
                if let Some(start) = start {
                    self.machine.regs.set_ip(start);
                }
                let flow = self.execute(STEP_LIMIT, true)?;
                if flow == Flow::Continue {
                    self.show_state();
                }
                return Some(flow);
            }

            Command::BreakAdd { target } => {
                let address = self.resolve_target(target)?;
                if self.breakpoints.insert(address) {
                    dprintln!(Always, "Added breakpoint at {}.", address);
                } else {
                    dprintln!(Always, "Breakpoint already exists at {}.", address);
                }
            }
            Command::BreakClear { target } => {
                let address = self.resolve_target(target)?;
                if self.breakpoints.remove(address) {
                    dprintln!(Always, "Removed breakpoint at {}.", address);
                } else {
                    dprintln!(Always, "No breakpoint exists at {}.", address);
                }
            }
            Command::BreakList => {
                if self.breakpoints.is_empty() {
                    dprintln!(Always, "No breakpoints exist.");
                }
                for address in &self.breakpoints {
                    let labels: Vec<&str> = self
                        .assembler
                        .labels()
                        .filter(|(_, offset)| *offset == address.offset)
                        .map(|(name, _)| name)
                        .collect();
                    if labels.is_empty() {
                        dprintln!(Always, "{}", address);
                    } else {
                        dprintln!(Always, "{}  {}", address, labels.join(", "));
                    }
                }
            }
            Command::Watch { name } => {
                if self.watches.insert(name, &self.machine.regs) {
                    dprintln!(Always, "Watching {}.", name);
                } else {
                    dprintln!(Always, "Already watching {}.", name);
                }
            }
            Command::Unwatch { name } => {
                if self.watches.remove(name) {
                    dprintln!(Always, "Stopped watching {}.", name);
                } else {
                    dprintln!(Always, "Not watching {}.", name);
                }
            }
            Command::TraceMode { enabled } => {
                self.trace = enabled;
                dprintln!(Always, "Trace {}.", if enabled { "on" } else { "off" });
            }
        }
        Some(Flow::Continue)
    }

    /// Labels are offsets into the active page.
    fn resolve_target(&self, target: Target) -> Option<Address> {
        match target {
            Target::Address(location) => Some(location.resolve(self.page)),
            Target::Label(name) => {
                let Some(offset) = self.assembler.label(name) else {
                    dprintln!(Always, "Error: Label not found named `{}`.", name);
                    return None;
                };
                dprintln!(Sometimes, "Label `{}` is at {:04X}.", name, offset);
                Some(Address::new(self.page, offset))
            }
        }
    }

    /// Parse one instruction and execute it immediately, at the current IP.
    fn evaluate(&mut self, line: &str) -> Option<Flow> {
        let context = Context {
            page: self.machine.regs.get(Register::Cs),
            cursor: self.machine.regs.ip(),
        };
        let parsed = match self.assembler.parse_line(line, context) {
            Ok(parsed) => parsed,
            Err(error) => {
                print_assemble_error(line, &error);
                return None;
            }
        };
        let instruction = parsed.instruction?;

        let before = self.machine.regs.clone();
        let outcome = report(self.machine.execute(&instruction, &mut self.console))?;
        let changes = print::changes(&before, &self.machine.regs);
        if changes.is_empty() {
            dprintln!(Always, "{}  (no changes)", instruction);
        } else {
            dprintln!(Always, "{}  {}", instruction, changes);
        }
        self.report_watches();

        match outcome {
            Outcome::Terminate(code) => Some(Flow::Terminate(code)),
            Outcome::Continue | Outcome::Halt => Some(Flow::Continue),
        }
    }

    /// Step from CS:IP until `limit` instructions, `hlt` or termination. With `stop_at_breakpoints`,
    /// also stop before any breakpoint other than the starting address.
    fn execute(&mut self, limit: usize, stop_at_breakpoints: bool) -> Option<Flow> {
        for i in 0..limit {
            let address = self.machine.code_address();
            if stop_at_breakpoints && i > 0 && self.breakpoints.contains(address) {
                dprintln!(Always, "Reached breakpoint at {}.", address);
                return Some(Flow::Continue);
            }

            let before = self.machine.regs.clone();
            let (instruction, outcome) = report(self.machine.step(&mut self.console))?;
            if self.trace {
                dprintln!(
                    Always,
                    "{}",
                    print::trace_line(address, &instruction, &before, &self.machine.regs)
                );
            }
            self.report_watches();

            match outcome {
                Outcome::Continue => (),
                Outcome::Halt => {
                    dprintln!(Always, "Halted at {}.", address);
                    return Some(Flow::Continue);
                }
                Outcome::Terminate(code) => return Some(Flow::Terminate(code)),
            }
        }
        if stop_at_breakpoints {
            dprintln!(Always, "Stopped after {:X} instructions.", limit);
        }
        Some(Flow::Continue)
    }

    fn report_watches(&mut self) {
        for change in self.watches.check(&self.machine.regs) {
            dprintln!(Always, "{}", change);
        }
    }

    fn unassemble(&mut self, start: Address, end: Option<u16>) -> Option<()> {
        let end = end.unwrap_or(start.offset.saturating_add(UNASSEMBLE_LEN - 1));
        if end < start.offset {
            report::<(), _>(Err(MemoryError::InvalidRange {
                start: start.offset,
                end,
            }))?;
        }
        let last = (end - start.offset) as usize;
        // Read past `end` so the final instruction decodes whole
        let bytes = report(
            self.machine
                .memory
                .page_tail(start, last + MAX_INSTRUCTION_LEN),
        )?;

        let mut position = 0;
        for listing in disassemble(bytes, start.offset) {
            if position > last {
                break;
            }
            let size = listing.size();
            dprintln!(
                Always,
                "{}",
                print::listing_line(start.page, &listing, &bytes[position..position + size])
            );
            position += size;
        }
        self.unassemble_next = start.wrapping_add(position as u16);
        Some(())
    }

    /// Register dump followed by the instruction at CS:IP.
    fn show_state(&self) {
        dprintln!(Always, "{}", self.machine.regs);
        let address = self.machine.code_address();
        let Ok(bytes) = self.machine.memory.page_tail(address, MAX_INSTRUCTION_LEN) else {
            dprintln!(Always, "{}  (outside memory)", address);
            return;
        };
        if let Some(listing) = disassemble(bytes, address.offset).next() {
            let size = listing.size();
            dprintln!(
                Always,
                "{}",
                print::listing_line(address.page, &listing, &bytes[..size])
            );
        }
    }
}

/// Error message, with the offending token underlined unless `--minimal`.
fn print_assemble_error(line: &str, error: &AssembleError) {
    dprintln!(Always, "Error: {}", error);
    let span = error.span();
    dprint!(Sometimes, "    {}\n    ", line);
    dprintln!(
        Sometimes,
        "{}{}",
        " ".repeat(span.start()),
        "^".repeat(span.len().max(1))
    );
}
