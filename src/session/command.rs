use std::fmt;
use std::str::FromStr;

use super::error::{ArgumentError, ParseError, ValueError};
use super::parse::ArgIter;
use crate::memory::Address;
use crate::symbol::{ByteRegister, Flag, Register};

#[derive(Debug, PartialEq)]
pub enum Command<'a> {
    Help,
    Quit,
    Display {
        start: Option<Location>,
        end: Option<u16>,
    },
    Enter {
        start: Location,
        bytes: Vec<u8>,
    },
    Fill {
        start: Location,
        end: u16,
        pattern: Vec<u8>,
    },
    Search {
        start: Location,
        pattern: Vec<u8>,
    },
    Compare {
        start: Location,
        end: u16,
        other: Location,
    },
    Move {
        start: Location,
        end: u16,
        dest: Location,
    },
    HexMath {
        left: u16,
        right: u16,
    },
    Load {
        start: Location,
        first_sector: u32,
        count: u32,
    },
    Write {
        start: Location,
        first_sector: u32,
        count: u32,
    },
    Cat {
        start: u32,
        end: u32,
    },
    DiskInfo,
    Save,
    SetPage {
        page: u16,
    },
    Registers,
    SetRegister {
        name: Name,
        value: u16,
    },
    Assemble {
        start: Option<Location>,
    },
    Alu,
    Eval {
        instruction: &'a str,
    },
    Unassemble {
        start: Option<Location>,
        end: Option<u16>,
    },
    Trace {
        count: u32,
    },
    Go {
        start: Option<u16>,
    },
    BreakAdd {
        target: Target<'a>,
    },
    BreakClear {
        target: Target<'a>,
    },
    BreakList,
    Watch {
        name: Name,
    },
    Unwatch {
        name: Name,
    },
    TraceMode {
        enabled: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommandName {
    Help,
    Quit,
    Display,
    Enter,
    Fill,
    Search,
    Compare,
    Move,
    HexMath,
    Load,
    Write,
    Cat,
    DiskInfo,
    Save,
    SetPage,
    Registers,
    Assemble,
    Alu,
    Eval,
    Unassemble,
    Trace,
    Go,
    BreakAdd,
    BreakClear,
    BreakList,
    Watch,
    Unwatch,
    TraceMode,
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Help => "help",
            Self::Quit => "q",
            Self::Display => "d",
            Self::Enter => "e",
            Self::Fill => "f",
            Self::Search => "s",
            Self::Compare => "c",
            Self::Move => "m",
            Self::HexMath => "h",
            Self::Load => "l",
            Self::Write => "w",
            Self::Cat => "cat",
            Self::DiskInfo => "n",
            Self::Save => "save",
            Self::SetPage => "sp",
            Self::Registers => "r",
            Self::Assemble => "a",
            Self::Alu => "alu",
            Self::Eval => "p",
            Self::Unassemble => "u",
            Self::Trace => "t",
            Self::Go => "g",
            Self::BreakAdd => "bp",
            Self::BreakClear => "bc",
            Self::BreakList => "bl",
            Self::Watch => "watch",
            Self::Unwatch => "unwatch",
            Self::TraceMode => "trace",
        };
        write!(f, "{}", name)
    }
}

/// Command address. A missing page means the active page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    pub page: Option<u16>,
    pub offset: u16,
}

impl Location {
    pub fn resolve(self, active_page: u16) -> Address {
        Address::new(self.page.unwrap_or(active_page), self.offset)
    }
}

/// Breakpoint position: an address, or a label defined while assembling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Target<'a> {
    Address(Location),
    Label(&'a str),
}

/// Anything `r` can set or `watch` can observe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Name {
    Register(Register),
    Byte(ByteRegister),
    Flag(Flag),
}

impl FromStr for Name {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(register) = s.parse() {
            return Ok(Self::Register(register));
        }
        if let Ok(register) = s.parse() {
            return Ok(Self::Byte(register));
        }
        if let Ok(flag) = s.parse() {
            return Ok(Self::Flag(flag));
        }
        Err(ValueError::UnknownName {
            name: s.to_string(),
        })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Register(register) => register.name(),
            Self::Byte(register) => register.name(),
            Self::Flag(flag) => flag.name(),
        };
        write!(f, "{}", name.to_ascii_uppercase())
    }
}

/// Returns the first [`CommandName`] with a candidate matching `name` (case insensitive).
fn find_match(name: &str, commands: &[(CommandName, &[&str])]) -> Option<CommandName> {
    commands
        .iter()
        .find(|(_, candidates)| {
            candidates
                .iter()
                .any(|candidate| name.eq_ignore_ascii_case(candidate))
        })
        .map(|(command, _)| *command)
}

impl<'a> TryFrom<&'a str> for Command<'a> {
    type Error = ParseError;

    /// Assumes line is non-empty.
    fn try_from(line: &'a str) -> Result<Self, Self::Error> {
        let mut iter = ArgIter::from(line);
        let command_name = iter.next_command_name().unwrap_or("");

        #[rustfmt::skip]
        let commands: &[(_, &[_])] = &[
            (CommandName::Help,       &["help", "?"]),
            (CommandName::Quit,       &["q", "quit"]),
            (CommandName::Display,    &["d"]),
            (CommandName::Enter,      &["e"]),
            (CommandName::Fill,       &["f"]),
            (CommandName::Search,     &["s"]),
            (CommandName::Compare,    &["c"]),
            (CommandName::Move,       &["m"]),
            (CommandName::HexMath,    &["h"]),
            (CommandName::Load,       &["l"]),
            (CommandName::Write,      &["w"]),
            (CommandName::Cat,        &["cat"]),
            (CommandName::DiskInfo,   &["n"]),
            (CommandName::Save,       &["save"]),
            (CommandName::SetPage,    &["sp"]),
            (CommandName::Registers,  &["r"]),
            (CommandName::Assemble,   &["a"]),
            (CommandName::Alu,        &["alu"]),
            (CommandName::Eval,       &["p"]),
            (CommandName::Unassemble, &["u"]),
            (CommandName::Trace,      &["t"]),
            (CommandName::Go,         &["g"]),
            (CommandName::BreakAdd,   &["bp"]),
            (CommandName::BreakClear, &["bc"]),
            (CommandName::BreakList,  &["bl"]),
            (CommandName::Watch,      &["watch"]),
            (CommandName::Unwatch,    &["unwatch"]),
            (CommandName::TraceMode,  &["trace"]),
        ];

        let Some(name) = find_match(command_name, commands) else {
            return Err(ParseError::InvalidCommand {
                command_name: command_name.to_string(),
            });
        };
        Command::parse_arguments(name, &mut iter).map_err(|error| ParseError::InvalidArgument {
            command_name: name,
            error,
        })
    }
}

/// Largest sector number or count accepted by `l`/`w`.
const MAX_SECTOR: u32 = u16::MAX as u32;

impl<'a> Command<'a> {
    fn parse_arguments(name: CommandName, iter: &mut ArgIter<'a>) -> Result<Self, ArgumentError> {
        let mut expected_args = 0;

        let command = match name {
            // Allow trailing arguments
            CommandName::Help => return Ok(Self::Help),

            CommandName::Quit => Self::Quit,
            CommandName::Alu => Self::Alu,
            CommandName::DiskInfo => Self::DiskInfo,
            CommandName::Save => Self::Save,
            CommandName::BreakList => Self::BreakList,

            CommandName::Display | CommandName::Unassemble => {
                expected_args = 2;
                let start = iter.next_location_or_default("start")?;
                let end = match start {
                    Some(_) => iter.next_word_value_or_default("end")?,
                    None => None,
                };
                if name == CommandName::Display {
                    Self::Display { start, end }
                } else {
                    Self::Unassemble { start, end }
                }
            }
            CommandName::Enter => {
                let start = iter.next_location("start")?;
                let bytes = iter.collect_bytes("bytes")?;
                if bytes.is_empty() {
                    return Err(ArgumentError::MissingArgumentList {
                        argument_name: "bytes",
                    });
                }
                return Ok(Self::Enter { start, bytes });
            }
            CommandName::Fill => {
                let start = iter.next_location("start")?;
                let end = iter.next_word_value("end")?;
                let pattern = iter.collect_bytes("pattern")?;
                return Ok(Self::Fill {
                    start,
                    end,
                    pattern,
                });
            }
            CommandName::Search => {
                let start = iter.next_location("start")?;
                let pattern = iter.collect_bytes("pattern")?;
                if pattern.is_empty() {
                    return Err(ArgumentError::MissingArgumentList {
                        argument_name: "pattern",
                    });
                }
                return Ok(Self::Search { start, pattern });
            }
            CommandName::Compare | CommandName::Move => {
                expected_args = 3;
                let start = iter.next_location("start")?;
                let end = iter.next_word_value("end")?;
                let other = iter.next_location("dest")?;
                if name == CommandName::Compare {
                    Self::Compare { start, end, other }
                } else {
                    Self::Move {
                        start,
                        end,
                        dest: other,
                    }
                }
            }
            CommandName::HexMath => {
                expected_args = 2;
                let left = iter.next_word_value("left")?;
                let right = iter.next_word_value("right")?;
                Self::HexMath { left, right }
            }
            CommandName::Load | CommandName::Write => {
                expected_args = 3;
                let start = iter.next_location("address")?;
                let first_sector = iter.next_hex("first_sector", MAX_SECTOR)?;
                let count = iter.next_hex("count", MAX_SECTOR)?;
                if name == CommandName::Load {
                    Self::Load {
                        start,
                        first_sector,
                        count,
                    }
                } else {
                    Self::Write {
                        start,
                        first_sector,
                        count,
                    }
                }
            }
            CommandName::Cat => {
                expected_args = 2;
                let start = iter.next_hex("start", u32::MAX)?;
                let end = iter.next_hex("end", u32::MAX)?;
                Self::Cat { start, end }
            }
            CommandName::SetPage => {
                expected_args = 1;
                let page = iter.next_word_value("page")?;
                Self::SetPage { page }
            }
            CommandName::Registers => {
                expected_args = 2;
                let name = match iter.next_name_or_default("name")? {
                    Some(name) => name,
                    None => return Ok(Self::Registers),
                };
                let max = match name {
                    Name::Register(_) => u16::MAX as u32,
                    Name::Byte(_) => u8::MAX as u32,
                    Name::Flag(_) => 1,
                };
                let value = iter.next_hex("value", max)? as u16;
                Self::SetRegister { name, value }
            }
            CommandName::Assemble => {
                expected_args = 1;
                let start = iter.next_location_or_default("start")?;
                Self::Assemble { start }
            }
            CommandName::Eval => {
                let instruction = iter.collect_rest();
                if instruction.is_empty() {
                    return Err(ArgumentError::MissingArgumentList {
                        argument_name: "instruction",
                    });
                }
                return Ok(Self::Eval { instruction });
            }
            CommandName::Trace => {
                expected_args = 1;
                let count = iter.next_hex_or_default("count", u16::MAX as u32)?;
                Self::Trace {
                    count: count.unwrap_or(1).max(1),
                }
            }
            CommandName::Go => {
                expected_args = 1;
                let start = iter.next_word_value_or_default("start")?;
                Self::Go { start }
            }
            CommandName::BreakAdd | CommandName::BreakClear => {
                expected_args = 1;
                let target = iter.next_target("location")?;
                if name == CommandName::BreakAdd {
                    Self::BreakAdd { target }
                } else {
                    Self::BreakClear { target }
                }
            }
            CommandName::Watch | CommandName::Unwatch => {
                expected_args = 1;
                let target = iter.next_name("name")?;
                if name == CommandName::Watch {
                    Self::Watch { name: target }
                } else {
                    Self::Unwatch { name: target }
                }
            }
            CommandName::TraceMode => {
                expected_args = 1;
                let enabled = iter.next_switch("state")?;
                Self::TraceMode { enabled }
            }
        };

        iter.expect_end(expected_args)?;

        Ok(command)
    }
}
