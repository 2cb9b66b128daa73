//! Instruction framing.
//!
//! Wire format (one WebSocket text frame may carry several instructions):
//! ```text
//! <len>.<value>,<len>.<value>,...;
//! ```
//! `len` is the decimal length of `value` in UTF-16 code units, which is how
//! the server counts string length. Values are taken by length, so they may
//! contain `,` `;` or `.` without escaping.

use std::fmt::Write;

use crate::error::ProtocolError;

pub fn encode<S: AsRef<str>>(fields: &[S]) -> String {
    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        let field = field.as_ref();
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{}.{}", utf16_len(field), field);
    }
    out.push(';');
    out
}

/// Splits a frame into instructions. Iteration stops after the first
/// malformed instruction; trailing whitespace after the last `;` is ignored.
pub fn decode(frame: &str) -> Instructions<'_> {
    Instructions { rest: frame, failed: false }
}

pub struct Instructions<'a> {
    rest: &'a str,
    failed: bool,
}

impl Iterator for Instructions<'_> {
    type Item = Result<Vec<String>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.trim().is_empty() {
            return None;
        }
        match parse_instruction(self.rest) {
            Ok((fields, consumed)) => {
                self.rest = &self.rest[consumed..];
                Some(Ok(fields))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Parses one instruction from the front of `input`, returning its fields and
/// the number of bytes consumed including the terminating `;`.
fn parse_instruction(input: &str) -> Result<(Vec<String>, usize), ProtocolError> {
    let mut fields = Vec::new();
    let mut pos = 0;

    loop {
        let dot = input[pos..].find('.').ok_or(ProtocolError::MissingSeparator(pos))?;
        let len_str = &input[pos..pos + dot];
        if len_str.is_empty() || !len_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::BadLength(len_str.to_string()));
        }
        let wanted: usize = len_str
            .parse()
            .map_err(|_| ProtocolError::BadLength(len_str.to_string()))?;

        let start = pos + dot + 1;
        let mut end = start;
        let mut units = 0;
        let mut chars = input[start..].chars();
        while units < wanted {
            match chars.next() {
                Some(c) => {
                    units += c.len_utf16();
                    end += c.len_utf8();
                }
                None => return Err(ProtocolError::Truncated { wanted, got: units }),
            }
        }
        // A length that splits a surrogate pair cannot be honoured.
        if units != wanted {
            return Err(ProtocolError::BadLength(len_str.to_string()));
        }
        fields.push(input[start..end].to_string());

        match input[end..].chars().next() {
            Some(',') => pos = end + 1,
            Some(';') => return Ok((fields, end + 1)),
            Some(c) => return Err(ProtocolError::UnexpectedCharacter(c)),
            None => return Err(ProtocolError::UnterminatedInstruction),
        }
    }
}
