use std::io::{self, IsTerminal, Read, Write};

use console::Key;

use crate::dprintln;

/// Where session lines come from.
#[allow(private_interfaces)]
#[derive(Debug)]
pub enum SourceMode {
    Argument(Argument),
    Stdin(Stdin),
    Terminal(Terminal),
}

// Stdin which is not attached to a terminal, i.e. piped.
#[derive(Debug)]
struct Stdin {
    stdin: io::Stdin,
    /// Line must be stored somewhere to be referenced
    buffer: String,
}

// Command-line argument
#[derive(Debug)]
struct Argument {
    buffer: String,
    /// Byte index
    cursor: usize,
}

// Interactive unbuffered terminal
#[derive(Debug)]
struct Terminal {
    term: console::Term,

    buffer: String,

    history: Vec<String>,
    /// Focused item in history, or new entry if index==length
    history_index: usize,
    /// Visible line cursor in terminal
    visible_cursor: usize,
}

pub trait SourceReader {
    /// `None` indicates EOF.
    /// Returned string slice MAY include leading or trailing whitespace.
    fn read(&mut self, prompt: &str) -> Option<&str>;
}

impl SourceMode {
    pub fn from(argument: Option<String>) -> Self {
        if let Some(argument) = argument {
            return SourceMode::Argument(Argument::from(argument));
        }
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return SourceMode::Terminal(Terminal::new());
        }
        SourceMode::Stdin(Stdin::from(stdin))
    }
}

impl SourceReader for SourceMode {
    fn read(&mut self, prompt: &str) -> Option<&str> {
        let line = match self {
            Self::Argument(argument) => argument.read(prompt),
            Self::Stdin(stdin) => stdin.read(prompt),
            Self::Terminal(terminal) => return terminal.read(prompt),
        };
        // Echo prompt and line for non-terminal source
        if let Some(line) = line {
            dprintln!(Sometimes, "\x1b[1m{}\x1b[0m{}", prompt, line.trim());
        }
        line
    }
}

impl Argument {
    pub fn from(source: String) -> Self {
        Self {
            buffer: source,
            cursor: 0,
        }
    }
}

impl SourceReader for Argument {
    fn read(&mut self, _prompt: &str) -> Option<&str> {
        // EOF
        if self.cursor >= self.buffer.len() {
            return None;
        }

        // Take characters until delimiter
        let start = self.cursor;
        let rest = &self.buffer[start..];
        let end = start + rest.find(['\n', ';']).unwrap_or(rest.len());
        self.cursor = end + 1; // sizeof('\n' or ';')

        self.buffer.get(start..end)
    }
}

impl Stdin {
    pub fn from(stdin: io::Stdin) -> Self {
        Self {
            stdin,
            buffer: String::new(),
        }
    }

    /// `None` indicates EOF or a read failure.
    fn read_byte(&mut self) -> Option<u8> {
        let mut buffer = [0; 1];
        match self.stdin.read(&mut buffer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(buffer[0]),
        }
    }
}

impl SourceReader for Stdin {
    fn read(&mut self, _prompt: &str) -> Option<&str> {
        let mut bytes = Vec::new();

        // Take bytes until newline. `;` is left alone so piped assembly keeps its comments
        loop {
            let Some(byte) = self.read_byte() else {
                if bytes.is_empty() {
                    return None; // First byte is EOF
                }
                break;
            };
            if byte == b'\n' {
                break;
            }
            bytes.push(byte);
        }

        self.buffer = String::from_utf8_lossy(&bytes).into_owned();
        Some(self.buffer.trim_end_matches('\r'))
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            term: console::Term::stdout(),
            buffer: String::new(),
            history: Vec::new(),
            history_index: 0,
            visible_cursor: 0,
        }
    }

    /// Run before modifying `buffer`.
    /// If focused on a historic item, clone it to `buffer` and update index.
    fn update_next(&mut self) {
        if let Some(item) = self.history.get(self.history_index) {
            self.buffer = item.clone();
            self.history_index = self.history.len();
        }
    }

    /// Next or historic line, from index
    fn get_current(&self) -> &str {
        self.history
            .get(self.history_index)
            .unwrap_or(&self.buffer)
    }

    fn print_prompt(&mut self, prompt: &str) -> io::Result<()> {
        self.term.clear_line()?;

        // Equivalent code found in non-terminal source
        write!(self.term, "\x1b[1;34m{}\x1b[0m", prompt)?;
        let current = self.get_current().to_string();
        write!(self.term, "{}", current)?;

        self.term
            .move_cursor_left(current.len().saturating_sub(self.visible_cursor))?;
        self.term.flush()
    }

    /// Return of `true` indicates to break loop
    fn read_key(&mut self) -> io::Result<bool> {
        let key = self.term.read_key()?;
        match key {
            Key::Enter | Key::Char('\n') => {
                self.update_next();
                return Ok(true);
            }

            Key::Char(ch) => match ch {
                // Ignore ASCII control characters
                '\x00'..='\x1f' | '\x7f' => (),
                _ => {
                    self.update_next();
                    self.buffer.insert(self.visible_cursor, ch);
                    self.visible_cursor += 1;
                }
            },

            Key::Backspace => {
                self.update_next();
                if self.visible_cursor > 0 && self.visible_cursor <= self.buffer.len() {
                    self.buffer.remove(self.visible_cursor - 1);
                    self.visible_cursor -= 1;
                }
            }
            Key::Del => {
                self.update_next();
                if self.visible_cursor < self.buffer.len() {
                    self.buffer.remove(self.visible_cursor);
                }
            }

            // Left/right in current input
            Key::ArrowLeft => {
                self.visible_cursor = self.visible_cursor.saturating_sub(1);
            }
            Key::ArrowRight => {
                if self.visible_cursor < self.get_current().len() {
                    self.visible_cursor += 1;
                }
            }

            // Back/forth through history
            Key::ArrowUp => {
                if self.history_index > 0 {
                    self.history_index -= 1;
                    self.visible_cursor = self.get_current().len();
                }
            }
            Key::ArrowDown => {
                if self.history_index < self.history.len() {
                    self.history_index += 1;
                    self.visible_cursor = self.get_current().len();
                }
            }

            _ => (),
        }
        Ok(false)
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<()> {
        self.buffer.clear();
        self.visible_cursor = 0;

        loop {
            self.print_prompt(prompt)?;
            if self.read_key()? {
                break;
            }
        }
        writeln!(self.term)?;

        // Push to history if different to last line
        if !self.buffer.trim().is_empty() && self.history.last() != Some(&self.buffer) {
            self.history.push(self.buffer.clone());
        }
        // Always reset index to next line
        self.history_index = self.history.len();
        Ok(())
    }
}

impl SourceReader for Terminal {
    fn read(&mut self, prompt: &str) -> Option<&str> {
        // A terminal which cannot be read from is treated as EOF
        self.read_line(prompt).ok()?;
        Some(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_lines() {
        let mut source = Argument::from("r;d 100\nq".to_string());
        assert_eq!(source.read(""), Some("r"));
        assert_eq!(source.read(""), Some("d 100"));
        assert_eq!(source.read(""), Some("q"));
        assert_eq!(source.read(""), None);

        let mut source = Argument::from("a;;q;".to_string());
        assert_eq!(source.read(""), Some("a"));
        assert_eq!(source.read(""), Some(""));
        assert_eq!(source.read(""), Some("q"));
        assert_eq!(source.read(""), None);
    }
}
