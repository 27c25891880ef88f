//! Turns a command descriptor into the argument vector sent to the target.
//!
//! Escape decoding (`command_binary`) runs first and yields raw bytes; quote
//! splitting (`command_split`) then runs on those bytes. Without the split flag
//! a line is broken on ASCII whitespace the way the reference client splits a
//! multi-word command name: text lines always, decoded byte lines only when they
//! contain a space.

use thiserror::Error;

use crate::corpus::{CommandDescriptor, TestCase};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterializeError {
    #[error("dangling backslash at offset {offset}")]
    DanglingEscape { offset: usize },
    #[error("\\x escape at offset {offset} is not followed by two hex digits")]
    MalformedHexEscape { offset: usize },
    #[error("character {ch:?} at offset {offset} does not fit in one byte")]
    WideCharacter { offset: usize, ch: char },
    #[error("command has no arguments")]
    EmptyCommand,
}

/// Decode `\\ \" \n \r \t \a \b \xHH` escapes into bytes.
///
/// Any other character, including the backslash of an unrecognized escape such
/// as `\z`, is copied as the byte equal to its code point. Offsets in errors
/// count characters, not bytes.
pub fn decode_escapes(template: &str) -> Result<Vec<u8>, MaterializeError> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut idx = 0;
    while idx < chars.len() {
        let ch = chars[idx];
        if ch != '\\' {
            out.push(char_byte(ch, idx)?);
            idx += 1;
            continue;
        }
        let Some(&next) = chars.get(idx + 1) else {
            return Err(MaterializeError::DanglingEscape { offset: idx });
        };
        let simple = match next {
            '\\' => Some(b'\\'),
            '"' => Some(b'"'),
            'n' => Some(b'\n'),
            'r' => Some(b'\r'),
            't' => Some(b'\t'),
            'a' => Some(0x07),
            'b' => Some(0x08),
            _ => None,
        };
        if let Some(byte) = simple {
            out.push(byte);
            idx += 2;
        } else if next == 'x' {
            let hex = |pos: usize| chars.get(pos).and_then(|digit| digit.to_digit(16));
            match (hex(idx + 2), hex(idx + 3)) {
                (Some(high), Some(low)) => {
                    out.push((high * 16 + low) as u8);
                    idx += 4;
                }
                _ => return Err(MaterializeError::MalformedHexEscape { offset: idx }),
            }
        } else {
            out.push(b'\\');
            idx += 1;
        }
    }
    Ok(out)
}

fn char_byte(ch: char, offset: usize) -> Result<u8, MaterializeError> {
    u8::try_from(u32::from(ch)).map_err(|_| MaterializeError::WideCharacter { offset, ch })
}

/// Split on spaces outside double quotes; quote bytes toggle the quoted state
/// and are dropped. The final token is always emitted, even when empty or when
/// a quote was left open.
#[must_use]
pub fn split_quoted(raw: &[u8]) -> Vec<Vec<u8>> {
    let mut parts = Vec::new();
    let mut current = Vec::new();
    let mut in_quote = false;
    for &byte in raw {
        match byte {
            b'"' => in_quote = !in_quote,
            b' ' if !in_quote => parts.push(std::mem::take(&mut current)),
            _ => current.push(byte),
        }
    }
    parts.push(current);
    parts
}

/// Split on runs of ASCII whitespace, dropping empty tokens.
#[must_use]
pub fn split_whitespace(raw: &[u8]) -> Vec<Vec<u8>> {
    raw.split(|&byte| matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
        .filter(|token| !token.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}

/// Build the argument vector for one of `case`'s commands.
pub fn materialize(
    case: &TestCase,
    descriptor: &CommandDescriptor,
) -> Result<Vec<Vec<u8>>, MaterializeError> {
    let args = match descriptor {
        CommandDescriptor::Line(line) if case.command_binary => {
            let raw = decode_escapes(line)?;
            if case.command_split {
                split_quoted(&raw)
            } else if raw.contains(&b' ') {
                split_whitespace(&raw)
            } else {
                vec![raw]
            }
        }
        CommandDescriptor::Line(line) if case.command_split => split_quoted(line.as_bytes()),
        CommandDescriptor::Line(line) => split_whitespace(line.as_bytes()),
        CommandDescriptor::Argv(items) => items
            .iter()
            .map(|item| {
                if case.command_binary {
                    decode_escapes(item)
                } else {
                    Ok(item.as_bytes().to_vec())
                }
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    if args.is_empty() {
        return Err(MaterializeError::EmptyCommand);
    }
    Ok(args)
}
