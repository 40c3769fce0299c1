// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reversible textual form of a [`Stream`].
//!
//! ```text
//! Message 0 = Invoke
//!   Argument 0 = id_value {1}
//!   Argument 1 = string_value {SetValues}
//!   Argument 2 = float64_array {0.5 -1.0 nan:0x7ff8000000000000}
//!   Argument 3 = stream_value {
//!     Message 0 = Reply
//!       Argument 0 = bool_value {true}
//!   }
//! ```
//!
//! Floats use the shortest decimal that reads back to the same bits; NaNs spell out their bits.
//! Strings escape `\`, `{`, `}` and control characters and write non-ASCII characters as
//! `\u{..}`, so the whole form is ASCII and one argument never spans more than one line.
//!
//! Only streams without live object pointers read back: `object_pointer {0x..}` is rejected with
//! [`TextErrorKind::UnresolvedObject`].

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::{self, Write as _};
use core::str::FromStr;

use crate::format::MAX_NESTING_DEPTH;
use crate::stream::{Command, Message, Stream};
use crate::value::{Argument, ArgumentType, Id, object_address};

/// The reason a textual stream could not be parsed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextErrorKind {
    /// A line is neither a message header, an argument, nor a closing brace.
    MalformedLine,
    /// A message index is not the next one in sequence.
    BadMessageIndex,
    /// An argument index is not the next one in its message.
    BadArgumentIndex,
    /// A command name is not recognized.
    UnknownCommand,
    /// An argument type name is not recognized.
    UnknownArgumentType,
    /// A payload does not parse as its declared type.
    BadValue,
    /// A string payload contains an invalid escape or an unescaped brace.
    BadEscape,
    /// An argument line appears before any message header.
    ArgumentOutsideMessage,
    /// A closing brace appears outside any nested stream.
    UnexpectedClose,
    /// The input ended inside a nested stream.
    UnclosedStream,
    /// A non-null object pointer was found; addresses cannot be resolved from text.
    UnresolvedObject,
    /// Nested streams exceed [`MAX_NESTING_DEPTH`].
    NestingTooDeep,
}

impl fmt::Display for TextErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine => write!(f, "malformed line"),
            Self::BadMessageIndex => write!(f, "message index out of sequence"),
            Self::BadArgumentIndex => write!(f, "argument index out of sequence"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::UnknownArgumentType => write!(f, "unknown argument type"),
            Self::BadValue => write!(f, "bad value"),
            Self::BadEscape => write!(f, "bad escape in string"),
            Self::ArgumentOutsideMessage => write!(f, "argument outside of a message"),
            Self::UnexpectedClose => write!(f, "unexpected `}}`"),
            Self::UnclosedStream => write!(f, "unclosed nested stream"),
            Self::UnresolvedObject => write!(f, "cannot resolve object pointer"),
            Self::NestingTooDeep => write!(f, "nested streams too deep"),
        }
    }
}

/// A parse failure, located by its 1-based line number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TextError {
    /// The 1-based line on which parsing failed.
    pub line: usize,
    /// What went wrong.
    pub kind: TextErrorKind,
}

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl core::error::Error for TextError {}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_stream(f, self, 0)
    }
}

impl Stream {
    /// Returns the textual form of the committed messages.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Replaces the contents of this stream with the parsed `text`.
    ///
    /// On error the stream is left empty.
    pub fn set_from_text(&mut self, text: &str) -> Result<(), TextError> {
        match text.parse::<Self>() {
            Ok(s) => {
                *self = s;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }
}

impl FromStr for Stream {
    type Err = TextError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut p = Parser {
            lines: text.lines(),
            line: 0,
        };
        p.parse_stream(0)
    }
}

fn write_stream(f: &mut fmt::Formatter<'_>, s: &Stream, indent: usize) -> fmt::Result {
    for (i, m) in s.messages.iter().enumerate() {
        writeln!(f, "{:indent$}Message {i} = {}", "", m.command)?;
        for (j, a) in m.arguments.iter().enumerate() {
            write!(f, "{:indent$}  Argument {j} = {} {{", "", a.argument_type())?;
            if let Argument::Stream(nested) = a {
                f.write_char('\n')?;
                write_stream(f, nested, indent + 4)?;
                writeln!(f, "{:indent$}  }}", "")?;
            } else {
                write_payload(f, a)?;
                f.write_str("}\n")?;
            }
        }
    }
    Ok(())
}

fn write_f32(f: &mut fmt::Formatter<'_>, v: f32) -> fmt::Result {
    if v.is_nan() {
        write!(f, "nan:0x{:08x}", v.to_bits())
    } else {
        write!(f, "{v:?}")
    }
}

fn write_f64(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        write!(f, "nan:0x{:016x}", v.to_bits())
    } else {
        write!(f, "{v:?}")
    }
}

fn write_list<T: Copy>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut one: impl FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
) -> fmt::Result {
    for (k, x) in items.iter().enumerate() {
        if k > 0 {
            f.write_char(' ')?;
        }
        one(f, *x)?;
    }
    Ok(())
}

fn display<T: fmt::Display>(f: &mut fmt::Formatter<'_>, v: T) -> fmt::Result {
    write!(f, "{v}")
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '{' => f.write_str("\\{")?,
            '}' => f.write_str("\\}")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_ascii_control() => write!(f, "\\x{:02x}", u32::from(c))?,
            c if !c.is_ascii() => write!(f, "\\u{{{:x}}}", u32::from(c))?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

fn write_payload(f: &mut fmt::Formatter<'_>, a: &Argument) -> fmt::Result {
    match a {
        Argument::Int8(v) => write!(f, "{v}"),
        Argument::Int16(v) => write!(f, "{v}"),
        Argument::Int32(v) => write!(f, "{v}"),
        Argument::Int64(v) => write!(f, "{v}"),
        Argument::UInt8(v) => write!(f, "{v}"),
        Argument::UInt16(v) => write!(f, "{v}"),
        Argument::UInt32(v) => write!(f, "{v}"),
        Argument::UInt64(v) => write!(f, "{v}"),
        Argument::Float32(v) => write_f32(f, *v),
        Argument::Float64(v) => write_f64(f, *v),
        Argument::Bool(v) => write!(f, "{v}"),
        Argument::String(v) => write_escaped(f, v),
        Argument::Id(v) => write!(f, "{v}"),
        Argument::Object(None) => f.write_str("null"),
        Argument::Object(Some(o)) => write!(f, "{:#x}", object_address(o)),
        Argument::Stream(_) | Argument::LastResult => Ok(()),
        Argument::Int8Array(v) => write_list(f, v, display),
        Argument::Int16Array(v) => write_list(f, v, display),
        Argument::Int32Array(v) => write_list(f, v, display),
        Argument::Int64Array(v) => write_list(f, v, display),
        Argument::UInt8Array(v) => write_list(f, v, display),
        Argument::UInt16Array(v) => write_list(f, v, display),
        Argument::UInt32Array(v) => write_list(f, v, display),
        Argument::UInt64Array(v) => write_list(f, v, display),
        Argument::Float32Array(v) => write_list(f, v, write_f32),
        Argument::Float64Array(v) => write_list(f, v, write_f64),
    }
}

struct Parser<'a> {
    lines: core::str::Lines<'a>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, kind: TextErrorKind) -> TextError {
        TextError {
            line: self.line,
            kind,
        }
    }

    /// Returns the next non-blank line with its indentation removed.
    fn next_line(&mut self) -> Option<&'a str> {
        loop {
            let raw = self.lines.next()?;
            self.line += 1;
            let line = raw.trim();
            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    fn parse_stream(&mut self, depth: usize) -> Result<Stream, TextError> {
        let mut messages: Vec<Message> = Vec::new();
        loop {
            let Some(line) = self.next_line() else {
                if depth > 0 {
                    return Err(TextError {
                        line: self.line + 1,
                        kind: TextErrorKind::UnclosedStream,
                    });
                }
                return Ok(Stream::from_messages(messages));
            };

            if line == "}" {
                if depth == 0 {
                    return Err(self.error(TextErrorKind::UnexpectedClose));
                }
                return Ok(Stream::from_messages(messages));
            }

            if let Some(rest) = line.strip_prefix("Message ") {
                let (index, name) = self.split_assignment(rest)?;
                if index != messages.len() {
                    return Err(self.error(TextErrorKind::BadMessageIndex));
                }
                let command = Command::from_name(name)
                    .ok_or_else(|| self.error(TextErrorKind::UnknownCommand))?;
                messages.push(Message::new(command));
            } else if let Some(rest) = line.strip_prefix("Argument ") {
                let Some(m) = messages.last_mut() else {
                    return Err(self.error(TextErrorKind::ArgumentOutsideMessage));
                };
                let (index, value) = self.split_assignment(rest)?;
                if index != m.arguments.len() {
                    return Err(self.error(TextErrorKind::BadArgumentIndex));
                }
                let arg = self.parse_argument(value, depth)?;
                m.arguments.push(arg);
            } else {
                return Err(self.error(TextErrorKind::MalformedLine));
            }
        }
    }

    /// Splits `"<index> = <rest>"`.
    fn split_assignment<'s>(&self, s: &'s str) -> Result<(usize, &'s str), TextError> {
        let (index, rest) = s
            .split_once(" = ")
            .ok_or_else(|| self.error(TextErrorKind::MalformedLine))?;
        let index = index
            .parse()
            .map_err(|_| self.error(TextErrorKind::MalformedLine))?;
        Ok((index, rest))
    }

    fn parse_argument(&mut self, value: &str, depth: usize) -> Result<Argument, TextError> {
        let (name, payload) = value
            .split_once(' ')
            .ok_or_else(|| self.error(TextErrorKind::MalformedLine))?;
        let ty = ArgumentType::from_name(name)
            .filter(|t| *t != ArgumentType::End)
            .ok_or_else(|| self.error(TextErrorKind::UnknownArgumentType))?;

        if ty == ArgumentType::StreamValue {
            return match payload {
                "{}" => Ok(Argument::Stream(Stream::new())),
                "{" if depth >= MAX_NESTING_DEPTH => {
                    Err(self.error(TextErrorKind::NestingTooDeep))
                }
                "{" => Ok(Argument::Stream(self.parse_stream(depth + 1)?)),
                _ => Err(self.error(TextErrorKind::MalformedLine)),
            };
        }

        let inner = payload
            .strip_prefix('{')
            .and_then(|p| p.strip_suffix('}'))
            .ok_or_else(|| self.error(TextErrorKind::MalformedLine))?;
        parse_payload(ty, inner).map_err(|kind| self.error(kind))
    }
}

fn scalar<T: FromStr>(s: &str) -> Result<T, TextErrorKind> {
    s.parse().map_err(|_| TextErrorKind::BadValue)
}

fn list<T>(
    s: &str,
    one: impl Fn(&str) -> Result<T, TextErrorKind>,
) -> Result<Vec<T>, TextErrorKind> {
    s.split_ascii_whitespace().map(one).collect()
}

fn parse_f32(s: &str) -> Result<f32, TextErrorKind> {
    match s.strip_prefix("nan:0x") {
        Some(hex) => {
            let v = f32::from_bits(
                u32::from_str_radix(hex, 16).map_err(|_| TextErrorKind::BadValue)?,
            );
            v.is_nan().then_some(v).ok_or(TextErrorKind::BadValue)
        }
        None => scalar(s),
    }
}

fn parse_f64(s: &str) -> Result<f64, TextErrorKind> {
    match s.strip_prefix("nan:0x") {
        Some(hex) => {
            let v = f64::from_bits(
                u64::from_str_radix(hex, 16).map_err(|_| TextErrorKind::BadValue)?,
            );
            v.is_nan().then_some(v).ok_or(TextErrorKind::BadValue)
        }
        None => scalar(s),
    }
}

fn hex_char(digits: &str) -> Result<char, TextErrorKind> {
    let v = u32::from_str_radix(digits, 16).map_err(|_| TextErrorKind::BadEscape)?;
    char::from_u32(v).ok_or(TextErrorKind::BadEscape)
}

fn unescape(s: &str) -> Result<String, TextErrorKind> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        match c {
            '{' | '}' => return Err(TextErrorKind::BadEscape),
            '\\' => {}
            c => {
                out.push(c);
                continue;
            }
        }
        let e = rest.chars().next().ok_or(TextErrorKind::BadEscape)?;
        rest = &rest[e.len_utf8()..];
        match e {
            '\\' | '{' | '}' => out.push(e),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'x' => {
                let digits = rest.get(..2).ok_or(TextErrorKind::BadEscape)?;
                out.push(hex_char(digits)?);
                rest = &rest[2..];
            }
            'u' => {
                let body = rest.strip_prefix('{').ok_or(TextErrorKind::BadEscape)?;
                let end = body.find('}').ok_or(TextErrorKind::BadEscape)?;
                out.push(hex_char(&body[..end])?);
                rest = &body[end + 1..];
            }
            _ => return Err(TextErrorKind::BadEscape),
        }
    }
    Ok(out)
}

fn parse_payload(ty: ArgumentType, s: &str) -> Result<Argument, TextErrorKind> {
    Ok(match ty {
        ArgumentType::Int8Value => Argument::Int8(scalar(s)?),
        ArgumentType::Int16Value => Argument::Int16(scalar(s)?),
        ArgumentType::Int32Value => Argument::Int32(scalar(s)?),
        ArgumentType::Int64Value => Argument::Int64(scalar(s)?),
        ArgumentType::UInt8Value => Argument::UInt8(scalar(s)?),
        ArgumentType::UInt16Value => Argument::UInt16(scalar(s)?),
        ArgumentType::UInt32Value => Argument::UInt32(scalar(s)?),
        ArgumentType::UInt64Value => Argument::UInt64(scalar(s)?),
        ArgumentType::Float32Value => Argument::Float32(parse_f32(s)?),
        ArgumentType::Float64Value => Argument::Float64(parse_f64(s)?),
        ArgumentType::BoolValue => Argument::Bool(scalar(s)?),
        ArgumentType::StringValue => Argument::String(unescape(s)?),
        ArgumentType::IdValue => Argument::Id(Id(scalar(s)?)),
        ArgumentType::ObjectPointer => match s {
            "null" => Argument::Object(None),
            _ => return Err(TextErrorKind::UnresolvedObject),
        },
        ArgumentType::LastResult if s.is_empty() => Argument::LastResult,
        ArgumentType::Int8Array => Argument::Int8Array(list(s, scalar)?),
        ArgumentType::Int16Array => Argument::Int16Array(list(s, scalar)?),
        ArgumentType::Int32Array => Argument::Int32Array(list(s, scalar)?),
        ArgumentType::Int64Array => Argument::Int64Array(list(s, scalar)?),
        ArgumentType::UInt8Array => Argument::UInt8Array(list(s, scalar)?),
        ArgumentType::UInt16Array => Argument::UInt16Array(list(s, scalar)?),
        ArgumentType::UInt32Array => Argument::UInt32Array(list(s, scalar)?),
        ArgumentType::UInt64Array => Argument::UInt64Array(list(s, scalar)?),
        ArgumentType::Float32Array => Argument::Float32Array(list(s, parse_f32)?),
        ArgumentType::Float64Array => Argument::Float64Array(list(s, parse_f64)?),
        ArgumentType::LastResult | ArgumentType::StreamValue | ArgumentType::End => {
            return Err(TextErrorKind::BadValue);
        }
    })
}
