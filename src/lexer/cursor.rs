// Heavily inspired by and referenced from `rustc_lexer`, adapted to single assembly lines.
// See https://doc.rust-lang.org/beta/nightly-rustc/src/rustc_lexer/cursor.rs.html

use std::str::Chars;

/// Peekable iterator over a char sequence.
pub struct Cursor<'a> {
    len_remaining: usize,
    /// Iterator over chars in a &str
    chars: Chars<'a>,
    /// Byte index of the start of the current token
    token_start: usize,
    input_len: usize,
}

pub(crate) const EOF_CHAR: char = '\0';

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            len_remaining: input.len(),
            chars: input.chars(),
            token_start: 0,
            input_len: input.len(),
        }
    }

    /// Peek the next char without consuming it. Returns [`EOF_CHAR`] at the end.
    pub fn first(&self) -> char {
        self.chars.clone().next().unwrap_or(EOF_CHAR)
    }

    pub fn is_eof(&self) -> bool {
        self.chars.as_str().is_empty()
    }

    /// Byte length of the token consumed so far.
    pub fn pos_in_token(&self) -> usize {
        self.len_remaining - self.chars.as_str().len()
    }

    /// Byte index where the current token begins.
    pub fn token_start(&self) -> usize {
        self.token_start
    }

    pub fn reset_pos(&mut self) {
        self.len_remaining = self.chars.as_str().len();
        self.token_start = self.input_len - self.len_remaining;
    }

    pub fn bump(&mut self) -> Option<char> {
        self.chars.next()
    }

    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while predicate(self.first()) && !self.is_eof() {
            self.bump();
        }
    }
}
