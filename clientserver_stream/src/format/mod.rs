// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binary format helpers.
//!
//! The serialized form of a stream starts with a single byte-order tag. Every multi-byte integer
//! and float that follows is written in that order, so the reader byte-swaps only when the
//! producer's order differs from its own.

use alloc::vec::Vec;
use core::fmt;

/// Maximum number of nested `stream_value` levels accepted by the decoder and text parser.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Byte order of a serialized stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least-significant byte first.
    Little,
    /// Most-significant byte first.
    Big,
}

impl ByteOrder {
    /// The byte order of the running machine.
    #[cfg(target_endian = "little")]
    pub const NATIVE: Self = Self::Little;
    /// The byte order of the running machine.
    #[cfg(target_endian = "big")]
    pub const NATIVE: Self = Self::Big;

    /// Returns the leading tag byte written for this order.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Little => 0,
            Self::Big => 1,
        }
    }

    /// Decodes a leading tag byte.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Little),
            1 => Some(Self::Big),
            _ => None,
        }
    }
}

/// Errors produced while decoding serialized streams.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The input ended unexpectedly.
    UnexpectedEof,
    /// A length or count does not fit the platform.
    OutOfBounds,
    /// The leading byte-order tag is not recognized.
    BadByteOrder(u8),
    /// A message command code is not recognized.
    BadCommand(u32),
    /// An argument type tag is not recognized.
    BadArgumentType(u32),
    /// A string payload is not valid UTF-8.
    InvalidUtf8,
    /// A boolean payload is neither 0 nor 1.
    InvalidBool(u8),
    /// A non-null object address was found; addresses cannot be resolved outside their process.
    UnresolvedObject(u64),
    /// Nested streams exceed [`MAX_NESTING_DEPTH`].
    NestingTooDeep,
    /// The input ended inside a message, before its End tag.
    UnterminatedMessage,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of input"),
            Self::OutOfBounds => write!(f, "length out of bounds"),
            Self::BadByteOrder(b) => write!(f, "bad byte-order tag {b}"),
            Self::BadCommand(c) => write!(f, "bad command code {c}"),
            Self::BadArgumentType(t) => write!(f, "bad argument type tag {t}"),
            Self::InvalidUtf8 => write!(f, "invalid utf-8"),
            Self::InvalidBool(b) => write!(f, "invalid bool byte {b}"),
            Self::UnresolvedObject(a) => write!(f, "cannot resolve object address {a:#x}"),
            Self::NestingTooDeep => write!(f, "nested streams too deep"),
            Self::UnterminatedMessage => write!(f, "message is missing its end tag"),
        }
    }
}

impl core::error::Error for DecodeError {}

macro_rules! write_num {
    ($($name:ident: $t:ty),* $(,)?) => {
        $(
            pub(crate) fn $name(&mut self, v: $t) {
                match self.order {
                    ByteOrder::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
                    ByteOrder::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
                }
            }
        )*
    };
}

macro_rules! read_num {
    ($($name:ident: $t:ty),* $(,)?) => {
        $(
            pub(crate) fn $name(&mut self) -> Result<$t, DecodeError> {
                let bytes = self.read_array::<{ size_of::<$t>() }>()?;
                Ok(match self.order {
                    ByteOrder::Little => <$t>::from_le_bytes(bytes),
                    ByteOrder::Big => <$t>::from_be_bytes(bytes),
                })
            }
        )*
    };
}

/// Order-aware byte sink.
#[derive(Clone, Debug)]
pub(crate) struct Writer {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl Writer {
    pub(crate) fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    pub(crate) fn order(&self) -> ByteOrder {
        self.order
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn write_i8(&mut self, v: i8) {
        self.buf.push(v.to_ne_bytes()[0]);
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Overwrites a previously written `u32` at `at`.
    pub(crate) fn patch_u32(&mut self, at: usize, v: u32) {
        let bytes = match self.order {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        };
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    write_num! {
        write_u16: u16,
        write_u32: u32,
        write_u64: u64,
        write_i16: i16,
        write_i32: i32,
        write_i64: i64,
    }

    pub(crate) fn write_f32(&mut self, v: f32) {
        self.write_u32(v.to_bits());
    }

    pub(crate) fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Order-aware cursor over a byte slice.
#[derive(Clone, Debug)]
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    order: ByteOrder,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8], order: ByteOrder) -> Self {
        Self {
            bytes,
            offset: 0,
            order,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(DecodeError::OutOfBounds)?;
        let out = self
            .bytes
            .get(self.offset..end)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.offset = end;
        Ok(out)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(crate) fn read_i8(&mut self) -> Result<i8, DecodeError> {
        Ok(i8::from_ne_bytes(self.read_array::<1>()?))
    }

    read_num! {
        read_u16: u16,
        read_u32: u32,
        read_u64: u64,
        read_i16: i16,
        read_i32: i32,
        read_i64: i64,
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    /// Reads a `u32` length or count and widens it to `usize`.
    pub(crate) fn read_len(&mut self) -> Result<usize, DecodeError> {
        usize::try_from(self.read_u32()?).map_err(|_| DecodeError::OutOfBounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_honors_byte_order() {
        let mut le = Writer::new(ByteOrder::Little);
        le.write_u32(0x0102_0304);
        assert_eq!(le.finish(), [4, 3, 2, 1]);

        let mut be = Writer::new(ByteOrder::Big);
        be.write_u32(0x0102_0304);
        be.write_i16(-2);
        assert_eq!(be.finish(), [1, 2, 3, 4, 0xff, 0xfe]);
    }

    #[test]
    fn reader_swaps_for_foreign_order() {
        let bytes = [0, 0, 0, 7, 0x3f, 0xf0, 0, 0, 0, 0, 0, 0];
        let mut r = Reader::new(&bytes, ByteOrder::Big);
        assert_eq!(r.read_u32().unwrap(), 7);
        assert_eq!(r.read_f64().unwrap(), 1.0);
        assert!(r.is_empty());
        assert_eq!(r.read_u8().unwrap_err(), DecodeError::UnexpectedEof);
    }

    #[test]
    fn patched_length_uses_writer_order() {
        let mut w = Writer::new(ByteOrder::Big);
        w.write_u32(0);
        w.write_u8(9);
        w.patch_u32(0, 1);
        assert_eq!(w.finish(), [0, 0, 0, 1, 9]);
    }

    #[test]
    fn byte_order_tags() {
        assert_eq!(ByteOrder::from_tag(ByteOrder::Big.tag()), Some(ByteOrder::Big));
        assert_eq!(ByteOrder::from_tag(ByteOrder::Little.tag()), Some(ByteOrder::Little));
        assert_eq!(ByteOrder::from_tag(2), None);
    }
}
