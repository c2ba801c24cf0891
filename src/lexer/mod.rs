use crate::lexer::cursor::Cursor;
use crate::span::Span;

pub mod cursor;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Mnemonic, register, size prefix, label or numeric literal.
    Word,
    /// `[...]` including brackets.
    Memory { terminated: bool },
    Comma,
    /// Ends a label definition.
    Colon,
    Comment,
    Whitespace,
    Unknown,
}

impl Token {
    pub fn text<'a>(&self, line: &'a str) -> &'a str {
        &line[self.span.as_range()]
    }
}

/// Tokenize one line of assembly, including whitespace and comments.
pub fn tokenize(input: &str) -> impl Iterator<Item = Token> + '_ {
    let mut cursor = Cursor::new(input);
    std::iter::from_fn(move || cursor.advance_token())
}

/// Tokens which carry meaning: no whitespace or comments.
pub fn significant(input: &str) -> impl Iterator<Item = Token> + '_ {
    tokenize(input).filter(|token| {
        !matches!(token.kind, TokenKind::Whitespace | TokenKind::Comment)
    })
}

pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

pub(crate) fn is_word(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> Option<Token> {
        let first_char = self.bump()?;
        let kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                TokenKind::Comment
            }
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '[' => {
                self.take_while(|c| c != ']' && c != ';');
                let terminated = self.first() == ']';
                if terminated {
                    self.bump();
                }
                TokenKind::Memory { terminated }
            }
            // Signed literal
            '-' | '+' if is_word(self.first()) => {
                self.take_while(is_word);
                TokenKind::Word
            }
            c if is_word(c) => {
                self.take_while(is_word);
                TokenKind::Word
            }
            _ => TokenKind::Unknown,
        };
        let token = Token {
            kind,
            span: Span::new(self.token_start(), self.pos_in_token()),
        };
        self.reset_pos();
        Some(token)
    }
}
