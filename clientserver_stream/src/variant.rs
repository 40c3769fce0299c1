// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composite "variant" values.
//!
//! A [`Variant`] occupies more than one argument slot: a `uint8_value` kind slot, followed by one
//! value slot unless the variant is [`Variant::Invalid`]. This is the one reader where the
//! number of wire arguments consumed differs from the number of logical values read, so
//! [`Stream::variant`] advances the caller's argument index itself.

use alloc::string::String;

use crate::stream::Stream;
use crate::value::{Argument, Id, ObjectRef};

/// A dynamically typed scalar.
#[derive(Clone, Debug)]
pub enum Variant {
    /// No value.
    Invalid,
    /// `i8`.
    Int8(i8),
    /// `i16`.
    Int16(i16),
    /// `i32`.
    Int32(i32),
    /// `i64`.
    Int64(i64),
    /// `u8`.
    UInt8(u8),
    /// `u16`.
    UInt16(u16),
    /// `u32`.
    UInt32(u32),
    /// `u64`.
    UInt64(u64),
    /// `f32`.
    Float32(f32),
    /// `f64`.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Object handle (`None` is null).
    Object(Option<ObjectRef>),
    /// Identifier.
    Id(Id),
}

impl Variant {
    fn kind(&self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Int8(_) => 1,
            Self::Int16(_) => 2,
            Self::Int32(_) => 3,
            Self::Int64(_) => 4,
            Self::UInt8(_) => 5,
            Self::UInt16(_) => 6,
            Self::UInt32(_) => 7,
            Self::UInt64(_) => 8,
            Self::Float32(_) => 9,
            Self::Float64(_) => 10,
            Self::Bool(_) => 11,
            Self::String(_) => 12,
            Self::Object(_) => 13,
            Self::Id(_) => 14,
        }
    }

    fn value_argument(&self) -> Option<Argument> {
        Some(match self {
            Self::Invalid => return None,
            Self::Int8(v) => Argument::Int8(*v),
            Self::Int16(v) => Argument::Int16(*v),
            Self::Int32(v) => Argument::Int32(*v),
            Self::Int64(v) => Argument::Int64(*v),
            Self::UInt8(v) => Argument::UInt8(*v),
            Self::UInt16(v) => Argument::UInt16(*v),
            Self::UInt32(v) => Argument::UInt32(*v),
            Self::UInt64(v) => Argument::UInt64(*v),
            Self::Float32(v) => Argument::Float32(*v),
            Self::Float64(v) => Argument::Float64(*v),
            Self::Bool(v) => Argument::Bool(*v),
            Self::String(v) => Argument::String(v.clone()),
            Self::Object(v) => Argument::Object(v.clone()),
            Self::Id(v) => Argument::Id(*v),
        })
    }

    /// Rebuilds a variant from its kind code and value slot; the value type must match exactly.
    fn from_parts(kind: u8, value: &Argument) -> Option<Self> {
        Some(match (kind, value) {
            (1, Argument::Int8(v)) => Self::Int8(*v),
            (2, Argument::Int16(v)) => Self::Int16(*v),
            (3, Argument::Int32(v)) => Self::Int32(*v),
            (4, Argument::Int64(v)) => Self::Int64(*v),
            (5, Argument::UInt8(v)) => Self::UInt8(*v),
            (6, Argument::UInt16(v)) => Self::UInt16(*v),
            (7, Argument::UInt32(v)) => Self::UInt32(*v),
            (8, Argument::UInt64(v)) => Self::UInt64(*v),
            (9, Argument::Float32(v)) => Self::Float32(*v),
            (10, Argument::Float64(v)) => Self::Float64(*v),
            (11, Argument::Bool(v)) => Self::Bool(*v),
            (12, Argument::String(v)) => Self::String(v.clone()),
            (13, Argument::Object(v)) => Self::Object(v.clone()),
            (14, Argument::Id(v)) => Self::Id(*v),
            _ => return None,
        })
    }

    /// Returns the number of argument slots this variant occupies.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        match self {
            Self::Invalid => 1,
            _ => 2,
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind() && self.value_argument() == other.value_argument()
    }
}

impl Stream {
    /// Appends `value` to the open message as a kind slot plus an optional value slot.
    pub fn push_variant(&mut self, value: &Variant) -> &mut Self {
        self.arg(value.kind());
        if let Some(arg) = value.value_argument() {
            self.arg(arg);
        }
        self
    }

    /// Reads a variant starting at `*argument` of `message`.
    ///
    /// On success `*argument` is advanced past every slot consumed (one for
    /// [`Variant::Invalid`], two otherwise). On failure it is left untouched.
    pub fn variant(&self, message: usize, argument: &mut usize) -> Option<Variant> {
        let Argument::UInt8(kind) = *self.argument(message, *argument)? else {
            return None;
        };
        if kind == 0 {
            *argument += 1;
            return Some(Variant::Invalid);
        }
        let value = self.argument(message, *argument + 1)?;
        let v = Variant::from_parts(kind, value)?;
        *argument += 2;
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Command;

    #[test]
    fn variant_consumes_a_variable_number_of_slots() {
        let mut s = Stream::new();
        s.begin(Command::Reply)
            .push_variant(&Variant::Int32(7))
            .push_variant(&Variant::Invalid)
            .push_variant(&Variant::String("x".into()))
            .arg(99_i64)
            .end();

        // 2 + 1 + 2 wire slots for three variants, then one plain argument.
        assert_eq!(s.argument_count(0), Some(6));

        let mut j = 0;
        assert_eq!(s.variant(0, &mut j), Some(Variant::Int32(7)));
        assert_eq!(j, 2);
        assert_eq!(s.variant(0, &mut j), Some(Variant::Invalid));
        assert_eq!(j, 3);
        assert_eq!(s.variant(0, &mut j), Some(Variant::String("x".into())));
        assert_eq!(j, 5);
        assert_eq!(s.get::<i64>(0, j), Some(99));
    }

    #[test]
    fn mismatched_variant_leaves_index_untouched() {
        let mut s = Stream::new();
        // Kind says `i32` but the value slot is a string.
        s.begin(Command::Reply).arg(3_u8).arg("nope").arg(1.0_f64).end();

        let mut j = 0;
        assert_eq!(s.variant(0, &mut j), None);
        assert_eq!(j, 0);

        // A non-`uint8` first slot is not a variant at all.
        let mut j = 2;
        assert_eq!(s.variant(0, &mut j), None);
        assert_eq!(j, 2);

        // Kind slot present but value slot missing.
        let mut t = Stream::new();
        t.begin(Command::Reply).arg(10_u8).end();
        let mut j = 0;
        assert_eq!(t.variant(0, &mut j), None);
        assert_eq!(j, 0);
    }

    #[test]
    fn slot_count_matches_encoding() {
        assert_eq!(Variant::Invalid.slot_count(), 1);
        assert_eq!(Variant::Float64(1.0).slot_count(), 2);
    }
}
