use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};

use debug86::disk::{DEFAULT_SECTOR_COUNT, DEFAULT_SECTOR_SIZE};
use debug86::error::asm_report;
use debug86::memory::DEFAULT_PAGES;
use debug86::output::Output;
use debug86::{assemble_program, disassemble, Session, SessionOptions};

/// debug86 is an educational 8086-like assembler, disassembler and interpreter, in the style of
/// DOS DEBUG.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    subcommand: Option<Command>,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(clap::Args)]
struct SessionArgs {
    /// Backing file of the virtual disk
    #[arg(long)]
    disk: Option<PathBuf>,
    /// Number of disk sectors
    #[arg(long, default_value_t = DEFAULT_SECTOR_COUNT, value_parser = parse_nonzero)]
    sectors: usize,
    /// Bytes per disk sector
    #[arg(long, default_value_t = DEFAULT_SECTOR_SIZE, value_parser = parse_nonzero)]
    sector_size: usize,
    /// Number of 64 KiB memory pages
    #[arg(long, default_value_t = DEFAULT_PAGES, value_parser = clap::value_parser!(u16).range(1..=256))]
    pages: u16,
    /// Read session commands from argument, separated by newlines or `;`
    #[arg(short, long)]
    command: Option<String>,
    /// Produce minimal output, suited for blackbox tests
    #[arg(short, long)]
    minimal: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive session (the default)
    Session {
        #[command(flatten)]
        args: SessionArgs,
    },
    /// Assemble a text file into raw pseudo machine code
    Assemble {
        /// Source file to assemble
        name: PathBuf,
        /// Destination of the binary (default: source with `.bin` extension)
        dest: Option<PathBuf>,
        /// Offset of the first instruction, in hex
        #[arg(long, default_value = "100", value_parser = parse_origin)]
        origin: u16,
    },
    /// Check a source file without writing anything
    Check {
        /// File to check
        name: PathBuf,
        /// Offset of the first instruction, in hex
        #[arg(long, default_value = "100", value_parser = parse_origin)]
        origin: u16,
    },
    /// Print the listing of a binary file
    Disassemble {
        /// Binary file to disassemble
        name: PathBuf,
        /// Offset of the first byte, in hex
        #[arg(long, default_value = "100", value_parser = parse_origin)]
        origin: u16,
    },
}

fn main() -> Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    debug86::env::init();

    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new() //
                .context_lines(debug86::DIAGNOSTIC_CONTEXT_LINES)
                .build(),
        )
    }))?;

    match args.subcommand {
        None => session(args.session),
        Some(Command::Session { args }) => session(args),
        Some(Command::Assemble { name, dest, origin }) => {
            file_message(Green, "Assembling", &name);
            let program = assemble_file(&name, origin)?;
            let dest = dest.unwrap_or_else(|| name.with_extension("bin"));
            fs::write(&dest, &program).into_diagnostic()?;
            message(Green, "Finished", &format!("emit {} bytes", program.len()));
            file_message(Green, "Saved", &dest);
            Ok(())
        }
        Some(Command::Check { name, origin }) => {
            file_message(Green, "Checking", &name);
            assemble_file(&name, origin)?;
            message(Green, "Success", "no errors found!");
            Ok(())
        }
        Some(Command::Disassemble { name, origin }) => {
            let bytes = fs::read(&name).into_diagnostic()?;
            for listing in disassemble(&bytes, origin) {
                println!("{}", listing);
            }
            Ok(())
        }
    }
}

fn session(args: SessionArgs) -> Result<()> {
    Output::set_minimal(args.minimal);
    let options = SessionOptions {
        disk: args.disk.unwrap_or_else(debug86::env::default_disk_path),
        sector_size: args.sector_size,
        sector_count: args.sectors,
        pages: args.pages,
        command: args.command,
        trace: debug86::env::is_trace_enabled(),
    };
    let code = Session::new(options)
        .and_then(Session::run)
        .into_diagnostic()?;
    process::exit(code as i32);
}

/// Assemble a source file, reporting the first error against the whole file.
fn assemble_file(name: &Path, origin: u16) -> Result<Vec<u8>> {
    let src = fs::read_to_string(name).into_diagnostic()?;
    let lines: Vec<&str> = src
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();
    assemble_program(lines.iter().copied(), origin).map_err(|(index, error)| {
        let offset: usize = src.split('\n').take(index).map(|line| line.len() + 1).sum();
        asm_report(error.offset_span(offset), src.clone())
    })
}

fn parse_origin(text: &str) -> Result<u16, String> {
    u16::from_str_radix(text, 16).map_err(|_| format!("`{}` is not a 16-bit hex offset", text))
}

fn parse_nonzero(text: &str) -> Result<usize, String> {
    match text.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(value) => Ok(value),
        Err(error) => Err(error.to_string()),
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}
