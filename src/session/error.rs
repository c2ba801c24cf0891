use std::{error::Error, fmt};

use super::command::CommandName;

/// Error parsing a command line.
#[derive(Debug, PartialEq)]
pub enum ParseError {
    InvalidCommand {
        command_name: String,
    },
    InvalidArgument {
        command_name: CommandName,
        error: ArgumentError,
    },
}

/// Error parsing command arguments.
#[derive(Debug, PartialEq)]
pub enum ArgumentError {
    /// For `p`, which takes the rest of the line.
    MissingArgumentList {
        argument_name: &'static str,
    },
    MissingArgument {
        argument_name: &'static str,
    },
    TooManyArguments {
        expected_count: usize,
        actual_count: usize,
    },
    InvalidValue {
        argument_name: &'static str,
        error: ValueError,
    },
}

/// Error parsing an argument value.
#[derive(Debug, PartialEq)]
pub enum ValueError {
    MismatchedType {
        expected_type: &'static str,
        actual_type: &'static str,
    },
    MalformedHex {},
    MalformedAddress {},
    UnterminatedString {},
    IntegerTooLarge {
        max: u32,
    },
    UnknownName {
        name: String,
    },
}

impl Error for ParseError {}
impl Error for ArgumentError {}
impl Error for ValueError {}

impl ArgumentError {
    pub fn invalid_value(argument_name: &'static str, error: ValueError) -> Self {
        Self::InvalidValue {
            argument_name,
            error,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommand { command_name } => {
                write!(f, "Not a command: `{}`", command_name)
            }
            Self::InvalidArgument {
                command_name,
                error,
            } => {
                write!(f, "In command `{}`:\n    {}", command_name, error)
            }
        }
    }
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgumentList { argument_name } => {
                write!(f, "Missing argument list `{}`", argument_name)
            }
            Self::MissingArgument { argument_name } => {
                write!(f, "Missing argument `{}`", argument_name)
            }
            Self::TooManyArguments {
                expected_count,
                actual_count,
            } => {
                write!(
                    f,
                    "Too many arguments (expected {}, found {})",
                    expected_count, actual_count
                )
            }
            Self::InvalidValue {
                argument_name,
                error,
            } => {
                write!(f, "For argument `{}`:\n    {}", argument_name, error)
            }
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MismatchedType {
                expected_type,
                actual_type,
            } => {
                write!(
                    f,
                    "Incorrect value type (expected {}, found {})",
                    expected_type, actual_type
                )
            }
            Self::MalformedHex {} => write!(f, "Malformed hexadecimal number"),
            Self::MalformedAddress {} => write!(f, "Malformed address (expected `oooo` or `pppp:oooo`)"),
            Self::UnterminatedString {} => write!(f, "Unterminated string"),
            Self::IntegerTooLarge { max } => {
                write!(f, "Integer too large (maximum {:X})", max)
            }
            Self::UnknownName { name } => {
                write!(f, "Not a register or flag: `{}`", name)
            }
        }
    }
}
