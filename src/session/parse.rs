use super::command::{Location, Name, Target};
use super::error::{ArgumentError, ValueError};

/// One argument: a bare word or a quoted string.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    /// Contents without the quotes.
    Quoted(&'a str),
}

impl Token<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Self::Word(_) => "word",
            Self::Quoted(_) => "string",
        }
    }
}

/// Splits a command line on whitespace and commas. Quoted strings (`'..'` or `".."`) are kept
/// whole, including their whitespace.
pub struct ArgIter<'a> {
    buffer: &'a str,
    /// Characters before this index have been consumed.
    head: usize,
}

impl<'a> ArgIter<'a> {
    pub fn from(buffer: &'a str) -> Self {
        Self { buffer, head: 0 }
    }

    fn skip_separators(&mut self) {
        let rest = &self.buffer[self.head..];
        let trimmed = rest.trim_start_matches(|ch: char| ch.is_whitespace() || ch == ',');
        self.head += rest.len() - trimmed.len();
    }

    /// Command name: the first word, not counted as an argument.
    pub fn next_command_name(&mut self) -> Option<&'a str> {
        match self.next_token() {
            Ok(Some(Token::Word(word))) => Some(word),
            _ => None,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, ValueError> {
        self.skip_separators();
        let rest = &self.buffer[self.head..];
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        if first == '\'' || first == '"' {
            let body = &rest[1..];
            let Some(end) = body.find(first) else {
                self.head = self.buffer.len();
                return Err(ValueError::UnterminatedString {});
            };
            self.head += end + 2;
            return Ok(Some(Token::Quoted(&body[..end])));
        }

        let end = rest
            .find(|ch: char| ch.is_whitespace() || ch == ',')
            .unwrap_or(rest.len());
        self.head += end;
        Ok(Some(Token::Word(&rest[..end])))
    }

    fn next_argument(&mut self, argument_name: &'static str) -> Result<Option<Token<'a>>, ArgumentError> {
        self.next_token()
            .map_err(|error| ArgumentError::invalid_value(argument_name, error))
    }

    fn next_word(&mut self, argument_name: &'static str) -> Result<Option<&'a str>, ArgumentError> {
        match self.next_argument(argument_name)? {
            None => Ok(None),
            Some(Token::Word(word)) => Ok(Some(word)),
            Some(token) => Err(ArgumentError::invalid_value(
                argument_name,
                ValueError::MismatchedType {
                    expected_type: "word",
                    actual_type: token.kind(),
                },
            )),
        }
    }

    fn required<T>(argument_name: &'static str, value: Option<T>) -> Result<T, ArgumentError> {
        value.ok_or(ArgumentError::MissingArgument { argument_name })
    }

    /// Hex number no greater than `max`, or `None` at the end of the line.
    pub fn next_hex_or_default(
        &mut self,
        argument_name: &'static str,
        max: u32,
    ) -> Result<Option<u32>, ArgumentError> {
        self.next_word(argument_name)?
            .map(|word| {
                parse_hex(word, max).map_err(|error| ArgumentError::invalid_value(argument_name, error))
            })
            .transpose()
    }

    pub fn next_hex(&mut self, argument_name: &'static str, max: u32) -> Result<u32, ArgumentError> {
        let value = self.next_hex_or_default(argument_name, max)?;
        Self::required(argument_name, value)
    }

    /// 16-bit hex number.
    pub fn next_word_value(&mut self, argument_name: &'static str) -> Result<u16, ArgumentError> {
        Ok(self.next_hex(argument_name, u16::MAX as u32)? as u16)
    }

    pub fn next_word_value_or_default(
        &mut self,
        argument_name: &'static str,
    ) -> Result<Option<u16>, ArgumentError> {
        Ok(self
            .next_hex_or_default(argument_name, u16::MAX as u32)?
            .map(|value| value as u16))
    }

    pub fn next_location_or_default(
        &mut self,
        argument_name: &'static str,
    ) -> Result<Option<Location>, ArgumentError> {
        self.next_word(argument_name)?
            .map(|word| {
                parse_location(word).map_err(|error| ArgumentError::invalid_value(argument_name, error))
            })
            .transpose()
    }

    pub fn next_location(&mut self, argument_name: &'static str) -> Result<Location, ArgumentError> {
        let location = self.next_location_or_default(argument_name)?;
        Self::required(argument_name, location)
    }

    /// Address, or a label name when the word is not one.
    pub fn next_target(&mut self, argument_name: &'static str) -> Result<Target<'a>, ArgumentError> {
        let word = self.next_word(argument_name)?;
        let word = Self::required(argument_name, word)?;
        match parse_location(word) {
            Ok(location) => Ok(Target::Address(location)),
            Err(ValueError::MalformedAddress {}) if is_label(word) => Ok(Target::Label(word)),
            Err(error) => Err(ArgumentError::invalid_value(argument_name, error)),
        }
    }

    pub fn next_name_or_default(
        &mut self,
        argument_name: &'static str,
    ) -> Result<Option<Name>, ArgumentError> {
        self.next_word(argument_name)?
            .map(|word| {
                word.parse()
                    .map_err(|error| ArgumentError::invalid_value(argument_name, error))
            })
            .transpose()
    }

    pub fn next_name(&mut self, argument_name: &'static str) -> Result<Name, ArgumentError> {
        let name = self.next_name_or_default(argument_name)?;
        Self::required(argument_name, name)
    }

    /// Case-insensitive `on`/`off`.
    pub fn next_switch(&mut self, argument_name: &'static str) -> Result<bool, ArgumentError> {
        let word = self.next_word(argument_name)?;
        match Self::required(argument_name, word)? {
            word if word.eq_ignore_ascii_case("on") => Ok(true),
            word if word.eq_ignore_ascii_case("off") => Ok(false),
            _ => Err(ArgumentError::invalid_value(
                argument_name,
                ValueError::MismatchedType {
                    expected_type: "`on` or `off`",
                    actual_type: "word",
                },
            )),
        }
    }

    /// Every remaining argument as bytes: hex words are single bytes, strings are copied verbatim.
    pub fn collect_bytes(&mut self, argument_name: &'static str) -> Result<Vec<u8>, ArgumentError> {
        let mut bytes = Vec::new();
        while let Some(token) = self.next_argument(argument_name)? {
            match token {
                Token::Word(word) => {
                    let byte = parse_hex(word, u8::MAX as u32)
                        .map_err(|error| ArgumentError::invalid_value(argument_name, error))?;
                    bytes.push(byte as u8);
                }
                Token::Quoted(text) => bytes.extend_from_slice(text.as_bytes()),
            }
        }
        Ok(bytes)
    }

    /// Unparsed remainder of the line, trimmed.
    pub fn collect_rest(&mut self) -> &'a str {
        let rest = self.buffer[self.head..].trim();
        self.head = self.buffer.len();
        rest
    }

    /// Fails if any argument remains. `expected_count` is only used in the error.
    pub fn expect_end(&mut self, expected_count: usize) -> Result<(), ArgumentError> {
        let mut actual_count = expected_count;
        while let Ok(Some(_)) = self.next_token() {
            actual_count += 1;
        }
        if actual_count > expected_count {
            return Err(ArgumentError::TooManyArguments {
                expected_count,
                actual_count,
            });
        }
        Ok(())
    }
}

/// Bare hexadecimal, at most `max`.
pub fn parse_hex(text: &str, max: u32) -> Result<u32, ValueError> {
    if text.is_empty() || !text.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(ValueError::MalformedHex {});
    }
    match u32::from_str_radix(text, 16) {
        Ok(value) if value <= max => Ok(value),
        _ => Err(ValueError::IntegerTooLarge { max }),
    }
}

/// Label names start with a letter or `_`, like those the assembler defines.
fn is_label(word: &str) -> bool {
    let mut chars = word.chars();
    chars
        .next()
        .is_some_and(|ch| ch.is_ascii_alphabetic() || ch == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// `oooo` or `pppp:oooo`.
pub fn parse_location(text: &str) -> Result<Location, ValueError> {
    let (page, offset) = match text.split_once(':') {
        Some((page, offset)) => (Some(page), offset),
        None => (None, text),
    };
    let parse = |text: &str| match parse_hex(text, u16::MAX as u32) {
        Ok(value) => Ok(value as u16),
        Err(ValueError::MalformedHex {}) => Err(ValueError::MalformedAddress {}),
        Err(error) => Err(error),
    };
    Ok(Location {
        page: page.map(parse).transpose()?,
        offset: parse(offset)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        let mut iter = ArgIter::from("e 100 'hello, world' 41,42 \"x\"");
        assert_eq!(iter.next_command_name(), Some("e"));
        assert_eq!(iter.next_token(), Ok(Some(Token::Word("100"))));
        assert_eq!(iter.next_token(), Ok(Some(Token::Quoted("hello, world"))));
        assert_eq!(iter.next_token(), Ok(Some(Token::Word("41"))));
        assert_eq!(iter.next_token(), Ok(Some(Token::Word("42"))));
        assert_eq!(iter.next_token(), Ok(Some(Token::Quoted("x"))));
        assert_eq!(iter.next_token(), Ok(None));

        let mut iter = ArgIter::from("'abc");
        assert_eq!(iter.next_token(), Err(ValueError::UnterminatedString {}));
        assert_eq!(iter.next_token(), Ok(None));
    }

    #[test]
    fn hex_values() {
        assert_eq!(parse_hex("1f", 0xFF), Ok(0x1F));
        assert_eq!(parse_hex("FFFF", 0xFFFF), Ok(0xFFFF));
        assert_eq!(
            parse_hex("100", 0xFF),
            Err(ValueError::IntegerTooLarge { max: 0xFF })
        );
        assert_eq!(parse_hex("0x10", 0xFFFF), Err(ValueError::MalformedHex {}));
        assert_eq!(parse_hex("", 0xFFFF), Err(ValueError::MalformedHex {}));
        assert_eq!(
            parse_hex("123456789", u32::MAX),
            Err(ValueError::IntegerTooLarge { max: u32::MAX })
        );
    }

    #[test]
    fn locations() {
        assert_eq!(
            parse_location("0100"),
            Ok(Location {
                page: None,
                offset: 0x100
            })
        );
        assert_eq!(
            parse_location("2:1a0"),
            Ok(Location {
                page: Some(2),
                offset: 0x1A0
            })
        );
        assert_eq!(parse_location("2:"), Err(ValueError::MalformedAddress {}));
        assert_eq!(parse_location("zz"), Err(ValueError::MalformedAddress {}));
        assert_eq!(
            parse_location("10000"),
            Err(ValueError::IntegerTooLarge { max: 0xFFFF })
        );
    }

    #[test]
    fn targets() {
        let mut iter = ArgIter::from("104 emit 2:10 face 1:emit");
        assert_eq!(
            iter.next_target("location"),
            Ok(Target::Address(Location {
                page: None,
                offset: 0x104
            }))
        );
        assert_eq!(iter.next_target("location"), Ok(Target::Label("emit")));
        assert_eq!(
            iter.next_target("location"),
            Ok(Target::Address(Location {
                page: Some(2),
                offset: 0x10
            }))
        );
        // Hex wins over a label of the same spelling
        assert_eq!(
            iter.next_target("location"),
            Ok(Target::Address(Location {
                page: None,
                offset: 0xFACE
            }))
        );
        assert_eq!(
            iter.next_target("location"),
            Err(ArgumentError::invalid_value(
                "location",
                ValueError::MalformedAddress {}
            ))
        );
        assert_eq!(
            iter.next_target("location"),
            Err(ArgumentError::MissingArgument {
                argument_name: "location"
            })
        );
    }

    #[test]
    fn byte_lists() {
        let mut iter = ArgIter::from("41 'BC' 44");
        assert_eq!(iter.collect_bytes("bytes"), Ok(b"ABCD".to_vec()));
        assert_eq!(iter.expect_end(0), Ok(()));

        let line = vec!["00"; 300].join(" ");
        let mut iter = ArgIter::from(&line);
        assert_eq!(iter.collect_bytes("bytes"), Ok(vec![0; 300]));

        let mut iter = ArgIter::from("41 141");
        assert_eq!(
            iter.collect_bytes("bytes"),
            Err(ArgumentError::invalid_value(
                "bytes",
                ValueError::IntegerTooLarge { max: 0xFF }
            ))
        );
    }

    #[test]
    fn trailing_arguments() {
        let mut iter = ArgIter::from("100 200 300");
        assert_eq!(iter.next_word_value("start"), Ok(0x100));
        assert_eq!(
            iter.expect_end(1),
            Err(ArgumentError::TooManyArguments {
                expected_count: 1,
                actual_count: 3
            })
        );

        let line = format!("1 {}", vec!["2"; 300].join(" "));
        let mut iter = ArgIter::from(&line);
        assert_eq!(iter.next_word_value("left"), Ok(1));
        assert_eq!(
            iter.expect_end(1),
            Err(ArgumentError::TooManyArguments {
                expected_count: 1,
                actual_count: 301
            })
        );
    }
}
