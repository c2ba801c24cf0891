use crate::error::AssembleError;
use crate::instr::{Instruction, Operand};
use crate::lexer::{self, Token, TokenKind};
use crate::opcode::{self, Mnemonic, OperandShape, Syntax, Width};
use crate::span::Span;
use crate::symbol::RegOperand;
use crate::FxMap;

/// Where the next line will be placed.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Context {
    pub page: u16,
    pub cursor: u16,
}

/// One assembled line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Line {
    pub label: Option<String>,
    pub instruction: Option<Instruction>,
}

impl Line {
    pub fn bytes(&self) -> Vec<u8> {
        self.instruction
            .as_ref()
            .map(|instruction| instruction.encode())
            .unwrap_or_default()
    }
}

/// Line assembler. Remembers labels across lines.
#[derive(Debug, Default)]
pub struct Assembler {
    labels: FxMap<String, u16>,
    /// Accept unknown labels as target `0000`. Used by the first pass over a whole program.
    lenient: bool,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self, name: &str) -> Option<u16> {
        self.labels.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, u16)> {
        self.labels.iter().map(|(name, offset)| (name.as_str(), *offset))
    }

    /// Assemble one line into pseudo machine code. Blank, comment and label-only lines give no
    /// bytes.
    pub fn assemble(&mut self, line: &str, context: Context) -> Result<Vec<u8>, AssembleError> {
        Ok(self.parse_line(line, context)?.bytes())
    }

    /// Parse one line, defining its label (if any) at the context cursor.
    pub fn parse_line(&mut self, line: &str, context: Context) -> Result<Line, AssembleError> {
        let tokens: Vec<Token> = lexer::significant(line).collect();
        let mut rest = &tokens[..];

        let mut label = None;
        if let [name, colon, tail @ ..] = rest {
            if name.kind == TokenKind::Word && colon.kind == TokenKind::Colon {
                let text = name.text(line).to_ascii_lowercase();
                self.define(text.clone(), context.cursor, name.span)?;
                label = Some(text);
                rest = tail;
            }
        }

        let instruction = match rest {
            [] => None,
            [mnemonic, operands @ ..] => Some(self.parse_instruction(line, mnemonic, operands)?),
        };
        Ok(Line { label, instruction })
    }

    fn define(&mut self, name: String, offset: u16, span: Span) -> Result<(), AssembleError> {
        match self.labels.get(&name) {
            Some(existing) if *existing != offset => {
                Err(AssembleError::DuplicateLabel { token: name, span })
            }
            _ => {
                self.labels.insert(name, offset);
                Ok(())
            }
        }
    }

    fn parse_instruction(
        &self,
        line: &str,
        mnemonic_token: &Token,
        tokens: &[Token],
    ) -> Result<Instruction, AssembleError> {
        let text = mnemonic_token.text(line);
        let mnemonic: Mnemonic = match mnemonic_token.kind {
            TokenKind::Word => text.parse().ok(),
            _ => None,
        }
        .ok_or_else(|| AssembleError::UnknownMnemonic {
            token: text.to_string(),
            span: mnemonic_token.span,
        })?;

        let groups = split_operands(line, tokens)?;
        let whole = groups
            .iter()
            .fold(mnemonic_token.span, |span, (_, operand)| span.join(*operand));

        let arities = opcode::OPCODES.arities(mnemonic);
        if !arities.contains(&groups.len()) {
            return Err(AssembleError::OperandCount {
                mnemonic,
                found: groups.len(),
                span: whole,
            });
        }

        let syntax = groups
            .iter()
            .map(|(group, span)| parse_operand(line, group, *span))
            .collect::<Result<Vec<_>, _>>()?;

        let entry = opcode::resolve(mnemonic, &syntax).ok_or_else(|| {
            AssembleError::NoMatchingForm {
                mnemonic,
                shapes: syntax.iter().map(opcode::classify).collect(),
                span: whole,
            }
        })?;

        let operands = entry
            .shapes
            .iter()
            .zip(syntax.iter().zip(&groups))
            .map(|(shape, (syntax, (_, span)))| self.operand(*shape, syntax, line, *span))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Instruction::new(entry, operands))
    }

    /// Convert matched syntax into an encoded operand.
    fn operand(
        &self,
        shape: OperandShape,
        syntax: &Syntax,
        line: &str,
        span: Span,
    ) -> Result<Operand, AssembleError> {
        Ok(match (shape, syntax) {
            (_, Syntax::Register(register)) => Operand::Reg(*register),
            (OperandShape::I8, Syntax::Number { value, .. }) => Operand::Imm8(*value as u8),
            (OperandShape::I16, Syntax::Number { value, .. }) => Operand::Imm16(*value as u16),
            (OperandShape::M8, Syntax::Memory { offset, .. }) => Operand::Mem8(*offset),
            (OperandShape::M16, Syntax::Memory { offset, .. }) => Operand::Mem16(*offset),
            (OperandShape::Rel8 | OperandShape::Rel16, _) => {
                Operand::Rel(self.target(syntax, &line[span.as_range()], span)?)
            }
            _ => {
                return Err(AssembleError::MalformedOperand {
                    token: line[span.as_range()].to_string(),
                    span,
                })
            }
        })
    }

    /// Jump target: bare hex, a prefixed literal, or a label.
    fn target(&self, syntax: &Syntax, text: &str, span: Span) -> Result<u16, AssembleError> {
        match syntax {
            Syntax::Number {
                bare: Some(bare), ..
            } => parse_hex(bare).ok_or_else(|| malformed(text, span)),
            Syntax::Number { value, .. } => Ok(*value as u16),
            Syntax::Name(name) => {
                if let Some(offset) = self.label(name) {
                    return Ok(offset);
                }
                if let Some(offset) = parse_hex(name) {
                    return Ok(offset);
                }
                if self.lenient {
                    return Ok(0);
                }
                Err(AssembleError::UnknownLabel {
                    token: name.clone(),
                    span,
                })
            }
            _ => Err(malformed(text, span)),
        }
    }
}

/// Assemble a whole program placed at `origin`. Labels may be used before they are defined.
///
/// On failure, returns the zero-based line index with the error.
pub fn assemble_program<'a>(
    lines: impl IntoIterator<Item = &'a str> + Clone,
    origin: u16,
) -> Result<Vec<u8>, (usize, AssembleError)> {
    // Every form has a fixed size, so the first pass places labels exactly.
    let mut first = Assembler {
        lenient: true,
        ..Assembler::default()
    };
    let mut cursor = origin;
    for (i, line) in lines.clone().into_iter().enumerate() {
        let bytes = first
            .assemble(line, Context { page: 0, cursor })
            .map_err(|error| (i, error))?;
        cursor = cursor.wrapping_add(bytes.len() as u16);
    }

    let mut second = Assembler {
        labels: first.labels,
        lenient: false,
    };
    let mut program = Vec::new();
    let mut cursor = origin;
    for (i, line) in lines.into_iter().enumerate() {
        let bytes = second
            .assemble(line, Context { page: 0, cursor })
            .map_err(|error| (i, error))?;
        cursor = cursor.wrapping_add(bytes.len() as u16);
        program.extend(bytes);
    }
    Ok(program)
}

/// Group tokens into comma-separated operands.
fn split_operands<'t>(
    line: &str,
    tokens: &'t [Token],
) -> Result<Vec<(&'t [Token], Span)>, AssembleError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let mut groups = Vec::new();
    for group in tokens.split(|token| token.kind == TokenKind::Comma) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            // Empty operand between commas
            let at = tokens
                .iter()
                .find(|token| token.kind == TokenKind::Comma)
                .map(|token| token.span)
                .unwrap_or_default();
            return Err(malformed(&line[at.as_range()], at));
        };
        groups.push((group, first.span.join(last.span)));
    }
    Ok(groups)
}

fn malformed(text: &str, span: Span) -> AssembleError {
    AssembleError::MalformedOperand {
        token: text.to_string(),
        span,
    }
}

/// Parse the tokens of one operand.
fn parse_operand(line: &str, tokens: &[Token], span: Span) -> Result<Syntax, AssembleError> {
    let text = |token: &Token| token.text(line);
    match tokens {
        [word] if word.kind == TokenKind::Word => {
            let word = text(word);
            if let Ok(register) = word.parse::<RegOperand>() {
                return Ok(Syntax::Register(register));
            }
            if let Some((value, bare)) = parse_number(word) {
                return Ok(Syntax::Number {
                    value,
                    bare: bare.then(|| word.to_string()),
                });
            }
            if word.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
                || parse_hex(word).is_some()
            {
                return Ok(Syntax::Name(word.to_ascii_lowercase()));
            }
            Err(malformed(word, span))
        }
        [memory] if matches!(memory.kind, TokenKind::Memory { .. }) => {
            parse_memory(text(memory), None, span)
        }
        [size, memory] if matches!(memory.kind, TokenKind::Memory { .. }) => {
            let width = match text(size).to_ascii_lowercase().as_str() {
                "byte" => Width::Byte,
                "word" => Width::Word,
                _ => return Err(malformed(&line[span.as_range()], span)),
            };
            parse_memory(text(memory), Some(width), span)
        }
        _ => Err(malformed(&line[span.as_range()], span)),
    }
}

/// `[hhhh]`: bare hex offset, or any prefixed literal.
fn parse_memory(text: &str, width: Option<Width>, span: Span) -> Result<Syntax, AssembleError> {
    let inner = text
        .strip_prefix('[')
        .and_then(|text| text.strip_suffix(']'))
        .map(str::trim)
        .ok_or_else(|| malformed(text, span))?;
    let offset = parse_hex(inner)
        .or_else(|| match parse_number(inner) {
            Some((value, false)) => u16::try_from(value).ok(),
            _ => None,
        })
        .ok_or_else(|| malformed(text, span))?;
    Ok(Syntax::Memory { offset, width })
}

/// Bare hexadecimal, as used for addresses and jump targets.
pub fn parse_hex(text: &str) -> Option<u16> {
    if text.is_empty() || text.len() > 4 {
        return None;
    }
    u16::from_str_radix(text, 16).ok()
}

/// Parse an assembler literal: `0x1F`, `0b101`, `1Fh` or decimal `31`, optionally signed.
///
/// Returns the value and whether it was bare decimal digits.
pub fn parse_number(text: &str) -> Option<(i32, bool)> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let lower = digits.to_ascii_lowercase();
    let (radix, body, bare) = if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex.to_string(), false)
    } else if let Some(binary) = lower.strip_prefix("0b") {
        (2, binary.to_string(), false)
    } else if let Some(hex) = lower
        .strip_suffix('h')
        .filter(|hex| hex.starts_with(|c: char| c.is_ascii_digit()))
    {
        (16, hex.to_string(), false)
    } else {
        (10, lower.clone(), !negative && text == digits)
    };
    if body.is_empty() {
        return None;
    }
    let value = i32::from_str_radix(&body, radix).ok()?;
    if value > 0xFFFF {
        return None;
    }
    Some((if negative { -value } else { value }, bare))
}
