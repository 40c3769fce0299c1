// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary encoding and decoding of [`Stream`]s.
//!
//! Non-null object pointers are written as addresses and rejected when read back.

use alloc::string::String;
use alloc::vec::Vec;

use crate::format::{ByteOrder, DecodeError, MAX_NESTING_DEPTH, Reader, Writer};
use crate::stream::{Command, Message, Stream};
use crate::value::{Argument, ArgumentType, Id, object_address};

impl Stream {
    /// Encodes the committed messages in the host byte order.
    ///
    /// # Panics
    ///
    /// Panics if a string, array or nested stream is longer than `u32::MAX` bytes or elements.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data_with_order(ByteOrder::NATIVE)
    }

    /// Encodes the committed messages in `order`.
    ///
    /// Decoders on any host accept either order; this exists so a foreign-endian producer can be
    /// simulated.
    ///
    /// # Panics
    ///
    /// Panics if a string, array or nested stream is longer than `u32::MAX` bytes or elements.
    #[must_use]
    pub fn data_with_order(&self, order: ByteOrder) -> Vec<u8> {
        let mut w = Writer::new(order);
        encode_stream(&mut w, self);
        w.finish()
    }

    /// Replaces the contents of this stream with the decoded `bytes`.
    ///
    /// On error the stream is left empty.
    pub fn set_data(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        match Self::from_data(bytes) {
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

    /// Decodes a stream from `bytes`.
    ///
    /// A non-null object pointer fails with [`DecodeError::UnresolvedObject`].
    pub fn from_data(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode_stream(bytes, 0)
    }

    /// Writes the native-order encoding to `writer`.
    #[cfg(feature = "std")]
    pub fn write_to(&self, mut writer: impl std::io::Write) -> std::io::Result<()> {
        writer.write_all(&self.data())
    }

    /// Reads `reader` to the end and decodes it.
    ///
    /// Malformed input is reported as [`std::io::ErrorKind::InvalidData`].
    #[cfg(feature = "std")]
    pub fn read_from(mut reader: impl std::io::Read) -> std::io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_data(&bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn encode_stream(w: &mut Writer, s: &Stream) {
    w.write_u8(w.order().tag());
    for m in &s.messages {
        w.write_u32(m.command as u32);
        for a in &m.arguments {
            encode_argument(w, a);
        }
        w.write_u32(ArgumentType::End as u32);
    }
}

fn write_len(w: &mut Writer, len: usize) {
    let Ok(len) = u32::try_from(len) else {
        panic!("length {len} does not fit the u32 length field");
    };
    w.write_u32(len);
}

macro_rules! encode_array {
    ($w:expr, $v:expr, $write:ident) => {{
        write_len($w, $v.len());
        for x in $v {
            $w.$write(*x);
        }
    }};
}

fn encode_argument(w: &mut Writer, a: &Argument) {
    w.write_u32(a.argument_type() as u32);
    match a {
        Argument::Int8(v) => w.write_i8(*v),
        Argument::Int16(v) => w.write_i16(*v),
        Argument::Int32(v) => w.write_i32(*v),
        Argument::Int64(v) => w.write_i64(*v),
        Argument::UInt8(v) => w.write_u8(*v),
        Argument::UInt16(v) => w.write_u16(*v),
        Argument::UInt32(v) => w.write_u32(*v),
        Argument::UInt64(v) => w.write_u64(*v),
        Argument::Float32(v) => w.write_f32(*v),
        Argument::Float64(v) => w.write_f64(*v),
        Argument::Bool(v) => w.write_u8(u8::from(*v)),
        Argument::String(v) => {
            write_len(w, v.len());
            w.write_bytes(v.as_bytes());
        }
        Argument::Id(v) => w.write_u32(v.as_u32()),
        Argument::Object(v) => w.write_u64(v.as_ref().map_or(0, object_address)),
        Argument::Stream(v) => {
            let at = w.len();
            w.write_u32(0);
            encode_stream(w, v);
            let len = w.len() - at - 4;
            let Ok(len) = u32::try_from(len) else {
                panic!("nested stream of {len} bytes does not fit the u32 length field");
            };
            w.patch_u32(at, len);
        }
        Argument::LastResult => {}
        Argument::Int8Array(v) => encode_array!(w, v, write_i8),
        Argument::Int16Array(v) => encode_array!(w, v, write_i16),
        Argument::Int32Array(v) => encode_array!(w, v, write_i32),
        Argument::Int64Array(v) => encode_array!(w, v, write_i64),
        Argument::UInt8Array(v) => {
            write_len(w, v.len());
            w.write_bytes(v);
        }
        Argument::UInt16Array(v) => encode_array!(w, v, write_u16),
        Argument::UInt32Array(v) => encode_array!(w, v, write_u32),
        Argument::UInt64Array(v) => encode_array!(w, v, write_u64),
        Argument::Float32Array(v) => encode_array!(w, v, write_f32),
        Argument::Float64Array(v) => encode_array!(w, v, write_f64),
    }
}

fn decode_stream(bytes: &[u8], depth: usize) -> Result<Stream, DecodeError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(DecodeError::NestingTooDeep);
    }
    let (&tag, body) = bytes.split_first().ok_or(DecodeError::UnexpectedEof)?;
    let order = ByteOrder::from_tag(tag).ok_or(DecodeError::BadByteOrder(tag))?;
    let mut r = Reader::new(body, order);

    let mut messages = Vec::new();
    while !r.is_empty() {
        let code = r.read_u32()?;
        let command = Command::from_u32(code).ok_or(DecodeError::BadCommand(code))?;
        let mut m = Message::new(command);
        loop {
            let code = r.read_u32().map_err(|e| match e {
                DecodeError::UnexpectedEof => DecodeError::UnterminatedMessage,
                e => e,
            })?;
            let ty = ArgumentType::from_u32(code).ok_or(DecodeError::BadArgumentType(code))?;
            if ty == ArgumentType::End {
                break;
            }
            m.arguments.push(decode_argument(&mut r, ty, depth)?);
        }
        messages.push(m);
    }
    Ok(Stream::from_messages(messages))
}

fn decode_array<'a, T>(
    r: &mut Reader<'a>,
    mut read: impl FnMut(&mut Reader<'a>) -> Result<T, DecodeError>,
) -> Result<Vec<T>, DecodeError> {
    let n = r.read_len()?;
    // The count is untrusted; a bogus one fails on EOF rather than on allocation.
    let mut out = Vec::with_capacity(n.min(4096));
    for _ in 0..n {
        out.push(read(r)?);
    }
    Ok(out)
}

fn decode_argument(
    r: &mut Reader<'_>,
    ty: ArgumentType,
    depth: usize,
) -> Result<Argument, DecodeError> {
    Ok(match ty {
        ArgumentType::Int8Value => Argument::Int8(r.read_i8()?),
        ArgumentType::Int16Value => Argument::Int16(r.read_i16()?),
        ArgumentType::Int32Value => Argument::Int32(r.read_i32()?),
        ArgumentType::Int64Value => Argument::Int64(r.read_i64()?),
        ArgumentType::UInt8Value => Argument::UInt8(r.read_u8()?),
        ArgumentType::UInt16Value => Argument::UInt16(r.read_u16()?),
        ArgumentType::UInt32Value => Argument::UInt32(r.read_u32()?),
        ArgumentType::UInt64Value => Argument::UInt64(r.read_u64()?),
        ArgumentType::Float32Value => Argument::Float32(r.read_f32()?),
        ArgumentType::Float64Value => Argument::Float64(r.read_f64()?),
        ArgumentType::BoolValue => match r.read_u8()? {
            0 => Argument::Bool(false),
            1 => Argument::Bool(true),
            b => return Err(DecodeError::InvalidBool(b)),
        },
        ArgumentType::StringValue => {
            let len = r.read_len()?;
            let bytes = r.read_bytes(len)?;
            let s = core::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
            Argument::String(String::from(s))
        }
        ArgumentType::IdValue => Argument::Id(Id(r.read_u32()?)),
        ArgumentType::ObjectPointer => match r.read_u64()? {
            0 => Argument::Object(None),
            addr => return Err(DecodeError::UnresolvedObject(addr)),
        },
        ArgumentType::StreamValue => {
            let len = r.read_len()?;
            let nested = r.read_bytes(len)?;
            Argument::Stream(decode_stream(nested, depth + 1)?)
        }
        ArgumentType::LastResult => Argument::LastResult,
        ArgumentType::Int8Array => Argument::Int8Array(decode_array(r, Reader::read_i8)?),
        ArgumentType::Int16Array => Argument::Int16Array(decode_array(r, Reader::read_i16)?),
        ArgumentType::Int32Array => Argument::Int32Array(decode_array(r, Reader::read_i32)?),
        ArgumentType::Int64Array => Argument::Int64Array(decode_array(r, Reader::read_i64)?),
        ArgumentType::UInt8Array => {
            let len = r.read_len()?;
            Argument::UInt8Array(r.read_bytes(len)?.to_vec())
        }
        ArgumentType::UInt16Array => Argument::UInt16Array(decode_array(r, Reader::read_u16)?),
        ArgumentType::UInt32Array => Argument::UInt32Array(decode_array(r, Reader::read_u32)?),
        ArgumentType::UInt64Array => Argument::UInt64Array(decode_array(r, Reader::read_u64)?),
        ArgumentType::Float32Array => Argument::Float32Array(decode_array(r, Reader::read_f32)?),
        ArgumentType::Float64Array => Argument::Float64Array(decode_array(r, Reader::read_f64)?),
        // `End` is consumed by the message loop and never reaches here.
        ArgumentType::End => return Err(DecodeError::BadArgumentType(ArgumentType::End as u32)),
    })
}
