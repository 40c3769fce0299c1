// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Argument model for `clientserver_stream`.
//!
//! Every value that can appear inside a message is an [`Argument`]. Arguments are tagged on the
//! wire by [`ArgumentType`], so a reader never needs an external schema to skip or copy one.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use crate::stream::Stream;

/// An opaque handle naming a result registered with an interpreter.
///
/// `Id(0)` is reserved and never refers to a registered result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct Id(pub u32);

impl Id {
    /// The reserved, always-invalid identifier.
    pub const NULL: Self = Self(0);

    /// Creates an identifier from its raw value.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer backing this id.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns `true` unless this is [`Id::NULL`].
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A live object that can be created, invoked and deleted through a stream.
///
/// The only thing the stream layer needs from an object is its runtime class name, which the
/// interpreter uses to pick a dispatch function.
pub trait Object: Any + fmt::Debug {
    /// Returns the runtime class name of this object.
    fn class_name(&self) -> &str;
}

impl dyn Object {
    /// Returns `true` if the concrete type of this object is `T`.
    #[inline]
    pub fn is<T: Object>(&self) -> bool {
        (self as &dyn Any).is::<T>()
    }

    /// Downcasts to the concrete object type `T`.
    #[inline]
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}

/// Shared, reference-counted handle to a live object.
///
/// Streams and interpreter registries each hold one strong reference for as long as they embed
/// the object.
pub type ObjectRef = Rc<dyn Object>;

/// Returns `true` if `a` and `b` refer to the same object allocation.
#[inline]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    core::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Returns the in-process address of `object`.
///
/// The address is only meaningful inside the process that produced it.
#[inline]
pub fn object_address(object: &ObjectRef) -> u64 {
    Rc::as_ptr(object).cast::<()>().addr() as u64
}

/// Marker that appends an "insert the interpreter's last result here" argument.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LastResult;

/// The wire tag of an argument.
///
/// The discriminants are the on-wire `u32` codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ArgumentType {
    /// `i8`.
    Int8Value = 0,
    /// `[i8]`.
    Int8Array = 1,
    /// `i16`.
    Int16Value = 2,
    /// `[i16]`.
    Int16Array = 3,
    /// `i32`.
    Int32Value = 4,
    /// `[i32]`.
    Int32Array = 5,
    /// `i64`.
    Int64Value = 6,
    /// `[i64]`.
    Int64Array = 7,
    /// `u8`.
    UInt8Value = 8,
    /// `[u8]`.
    UInt8Array = 9,
    /// `u16`.
    UInt16Value = 10,
    /// `[u16]`.
    UInt16Array = 11,
    /// `u32`.
    UInt32Value = 12,
    /// `[u32]`.
    UInt32Array = 13,
    /// `u64`.
    UInt64Value = 14,
    /// `[u64]`.
    UInt64Array = 15,
    /// `f32`.
    Float32Value = 16,
    /// `[f32]`.
    Float32Array = 17,
    /// `f64`.
    Float64Value = 18,
    /// `[f64]`.
    Float64Array = 19,
    /// `bool`.
    BoolValue = 20,
    /// UTF-8 string.
    StringValue = 21,
    /// Registered-result identifier.
    IdValue = 22,
    /// In-process object handle.
    ObjectPointer = 23,
    /// Nested, self-contained stream.
    StreamValue = 24,
    /// Placeholder for the interpreter's current last result.
    LastResult = 25,
    /// End-of-message marker.
    End = 26,
}

impl ArgumentType {
    const ALL: [Self; 27] = [
        Self::Int8Value,
        Self::Int8Array,
        Self::Int16Value,
        Self::Int16Array,
        Self::Int32Value,
        Self::Int32Array,
        Self::Int64Value,
        Self::Int64Array,
        Self::UInt8Value,
        Self::UInt8Array,
        Self::UInt16Value,
        Self::UInt16Array,
        Self::UInt32Value,
        Self::UInt32Array,
        Self::UInt64Value,
        Self::UInt64Array,
        Self::Float32Value,
        Self::Float32Array,
        Self::Float64Value,
        Self::Float64Array,
        Self::BoolValue,
        Self::StringValue,
        Self::IdValue,
        Self::ObjectPointer,
        Self::StreamValue,
        Self::LastResult,
        Self::End,
    ];

    /// Decodes a wire tag.
    #[must_use]
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(v).ok()?).copied()
    }

    /// Returns the name used by the textual stream form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8Value => "int8_value",
            Self::Int8Array => "int8_array",
            Self::Int16Value => "int16_value",
            Self::Int16Array => "int16_array",
            Self::Int32Value => "int32_value",
            Self::Int32Array => "int32_array",
            Self::Int64Value => "int64_value",
            Self::Int64Array => "int64_array",
            Self::UInt8Value => "uint8_value",
            Self::UInt8Array => "uint8_array",
            Self::UInt16Value => "uint16_value",
            Self::UInt16Array => "uint16_array",
            Self::UInt32Value => "uint32_value",
            Self::UInt32Array => "uint32_array",
            Self::UInt64Value => "uint64_value",
            Self::UInt64Array => "uint64_array",
            Self::Float32Value => "float32_value",
            Self::Float32Array => "float32_array",
            Self::Float64Value => "float64_value",
            Self::Float64Array => "float64_array",
            Self::BoolValue => "bool_value",
            Self::StringValue => "string_value",
            Self::IdValue => "id_value",
            Self::ObjectPointer => "object_pointer",
            Self::StreamValue => "stream_value",
            Self::LastResult => "last_result",
            Self::End => "end",
        }
    }

    /// Looks up a type by its textual name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One typed value inside a message.
#[derive(Clone, Debug)]
pub enum Argument {
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
    /// Identifier of a registered result.
    Id(Id),
    /// Live object handle (`None` is a null pointer).
    Object(Option<ObjectRef>),
    /// Nested stream.
    Stream(Stream),
    /// Placeholder expanded to the interpreter's last result.
    LastResult,
    /// `[i8]`.
    Int8Array(Vec<i8>),
    /// `[i16]`.
    Int16Array(Vec<i16>),
    /// `[i32]`.
    Int32Array(Vec<i32>),
    /// `[i64]`.
    Int64Array(Vec<i64>),
    /// `[u8]`.
    UInt8Array(Vec<u8>),
    /// `[u16]`.
    UInt16Array(Vec<u16>),
    /// `[u32]`.
    UInt32Array(Vec<u32>),
    /// `[u64]`.
    UInt64Array(Vec<u64>),
    /// `[f32]`.
    Float32Array(Vec<f32>),
    /// `[f64]`.
    Float64Array(Vec<f64>),
}

impl Argument {
    /// Returns the wire tag of this argument.
    #[must_use]
    pub fn argument_type(&self) -> ArgumentType {
        match self {
            Self::Int8(_) => ArgumentType::Int8Value,
            Self::Int16(_) => ArgumentType::Int16Value,
            Self::Int32(_) => ArgumentType::Int32Value,
            Self::Int64(_) => ArgumentType::Int64Value,
            Self::UInt8(_) => ArgumentType::UInt8Value,
            Self::UInt16(_) => ArgumentType::UInt16Value,
            Self::UInt32(_) => ArgumentType::UInt32Value,
            Self::UInt64(_) => ArgumentType::UInt64Value,
            Self::Float32(_) => ArgumentType::Float32Value,
            Self::Float64(_) => ArgumentType::Float64Value,
            Self::Bool(_) => ArgumentType::BoolValue,
            Self::String(_) => ArgumentType::StringValue,
            Self::Id(_) => ArgumentType::IdValue,
            Self::Object(_) => ArgumentType::ObjectPointer,
            Self::Stream(_) => ArgumentType::StreamValue,
            Self::LastResult => ArgumentType::LastResult,
            Self::Int8Array(_) => ArgumentType::Int8Array,
            Self::Int16Array(_) => ArgumentType::Int16Array,
            Self::Int32Array(_) => ArgumentType::Int32Array,
            Self::Int64Array(_) => ArgumentType::Int64Array,
            Self::UInt8Array(_) => ArgumentType::UInt8Array,
            Self::UInt16Array(_) => ArgumentType::UInt16Array,
            Self::UInt32Array(_) => ArgumentType::UInt32Array,
            Self::UInt64Array(_) => ArgumentType::UInt64Array,
            Self::Float32Array(_) => ArgumentType::Float32Array,
            Self::Float64Array(_) => ArgumentType::Float64Array,
        }
    }

    /// Returns `true` if this argument (or any nested stream) embeds a non-null object handle.
    #[must_use]
    pub fn holds_object(&self) -> bool {
        match self {
            Self::Object(o) => o.is_some(),
            Self::Stream(s) => s.holds_objects(),
            _ => false,
        }
    }
}

fn bits_eq_f32(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn bits_eq_f64(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

/// Floats compare by bit pattern and objects by identity, so equality means "encodes to the same
/// bytes".
impl PartialEq for Argument {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int8(a), Self::Int8(b)) => a == b,
            (Self::Int16(a), Self::Int16(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::UInt8(a), Self::UInt8(b)) => a == b,
            (Self::UInt16(a), Self::UInt16(b)) => a == b,
            (Self::UInt32(a), Self::UInt32(b)) => a == b,
            (Self::UInt64(a), Self::UInt64(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a.to_bits() == b.to_bits(),
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Id(a), Self::Id(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => same_object(a, b),
                _ => false,
            },
            (Self::Stream(a), Self::Stream(b)) => a == b,
            (Self::LastResult, Self::LastResult) => true,
            (Self::Int8Array(a), Self::Int8Array(b)) => a == b,
            (Self::Int16Array(a), Self::Int16Array(b)) => a == b,
            (Self::Int32Array(a), Self::Int32Array(b)) => a == b,
            (Self::Int64Array(a), Self::Int64Array(b)) => a == b,
            (Self::UInt8Array(a), Self::UInt8Array(b)) => a == b,
            (Self::UInt16Array(a), Self::UInt16Array(b)) => a == b,
            (Self::UInt32Array(a), Self::UInt32Array(b)) => a == b,
            (Self::UInt64Array(a), Self::UInt64Array(b)) => a == b,
            (Self::Float32Array(a), Self::Float32Array(b)) => bits_eq_f32(a, b),
            (Self::Float64Array(a), Self::Float64Array(b)) => bits_eq_f64(a, b),
            _ => false,
        }
    }
}

macro_rules! argument_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Argument {
                #[inline]
                fn from(v: $t) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

argument_from! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    bool => Bool,
    String => String,
    Id => Id,
    Option<ObjectRef> => Object,
    Stream => Stream,
    Vec<i8> => Int8Array,
    Vec<i16> => Int16Array,
    Vec<i32> => Int32Array,
    Vec<i64> => Int64Array,
    Vec<u8> => UInt8Array,
    Vec<u16> => UInt16Array,
    Vec<u32> => UInt32Array,
    Vec<u64> => UInt64Array,
    Vec<f32> => Float32Array,
    Vec<f64> => Float64Array,
}

macro_rules! argument_from_slice {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<&[$t]> for Argument {
                #[inline]
                fn from(v: &[$t]) -> Self {
                    Self::$variant(v.to_vec())
                }
            }
        )*
    };
}

argument_from_slice! {
    i8 => Int8Array,
    i16 => Int16Array,
    i32 => Int32Array,
    i64 => Int64Array,
    u8 => UInt8Array,
    u16 => UInt16Array,
    u32 => UInt32Array,
    u64 => UInt64Array,
    f32 => Float32Array,
    f64 => Float64Array,
}

impl From<&str> for Argument {
    #[inline]
    fn from(v: &str) -> Self {
        Self::String(v.into())
    }
}

impl From<ObjectRef> for Argument {
    #[inline]
    fn from(v: ObjectRef) -> Self {
        Self::Object(Some(v))
    }
}

impl From<&ObjectRef> for Argument {
    #[inline]
    fn from(v: &ObjectRef) -> Self {
        Self::Object(Some(v.clone()))
    }
}

impl From<&Stream> for Argument {
    #[inline]
    fn from(v: &Stream) -> Self {
        Self::Stream(v.clone())
    }
}

impl From<LastResult> for Argument {
    #[inline]
    fn from(_: LastResult) -> Self {
        Self::LastResult
    }
}

/// Typed extraction of an [`Argument`].
///
/// Integer targets accept any stored integer width as long as the value fits. Float targets accept
/// floats of equal or smaller width and integers that are exactly representable. Everything else
/// must match the stored type exactly; a mismatch yields `None`.
pub trait FromArgument: Sized {
    /// Converts `arg`, or returns `None` if the stored type cannot represent `Self` losslessly.
    fn from_argument(arg: &Argument) -> Option<Self>;
}

macro_rules! integer_from_argument {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromArgument for $t {
                fn from_argument(arg: &Argument) -> Option<Self> {
                    match *arg {
                        Argument::Int8(v) => Self::try_from(v).ok(),
                        Argument::Int16(v) => Self::try_from(v).ok(),
                        Argument::Int32(v) => Self::try_from(v).ok(),
                        Argument::Int64(v) => Self::try_from(v).ok(),
                        Argument::UInt8(v) => Self::try_from(v).ok(),
                        Argument::UInt16(v) => Self::try_from(v).ok(),
                        Argument::UInt32(v) => Self::try_from(v).ok(),
                        Argument::UInt64(v) => Self::try_from(v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

integer_from_argument!(i8, i16, i32, i64, u8, u16, u32, u64);

/// Returns the stored integer as `(negative, magnitude)`, if the argument is an integer.
fn integer_magnitude(arg: &Argument) -> Option<(bool, u64)> {
    let signed = |v: i64| (v < 0, v.unsigned_abs());
    match *arg {
        Argument::Int8(v) => Some(signed(i64::from(v))),
        Argument::Int16(v) => Some(signed(i64::from(v))),
        Argument::Int32(v) => Some(signed(i64::from(v))),
        Argument::Int64(v) => Some(signed(v)),
        Argument::UInt8(v) => Some((false, u64::from(v))),
        Argument::UInt16(v) => Some((false, u64::from(v))),
        Argument::UInt32(v) => Some((false, u64::from(v))),
        Argument::UInt64(v) => Some((false, v)),
        _ => None,
    }
}

impl FromArgument for f64 {
    fn from_argument(arg: &Argument) -> Option<Self> {
        match *arg {
            Argument::Float64(v) => Some(v),
            Argument::Float32(v) => Some(Self::from(v)),
            _ => {
                let (negative, magnitude) = integer_magnitude(arg)?;
                if magnitude > (1_u64 << Self::MANTISSA_DIGITS) {
                    return None;
                }
                // Exact: magnitude is bounded by the mantissa width.
                let v = magnitude as Self;
                Some(if negative { -v } else { v })
            }
        }
    }
}

impl FromArgument for f32 {
    fn from_argument(arg: &Argument) -> Option<Self> {
        match *arg {
            Argument::Float32(v) => Some(v),
            _ => {
                let (negative, magnitude) = integer_magnitude(arg)?;
                if magnitude > (1_u64 << Self::MANTISSA_DIGITS) {
                    return None;
                }
                // Exact: magnitude is bounded by the mantissa width.
                let v = magnitude as Self;
                Some(if negative { -v } else { v })
            }
        }
    }
}

impl FromArgument for bool {
    fn from_argument(arg: &Argument) -> Option<Self> {
        match *arg {
            Argument::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl FromArgument for String {
    fn from_argument(arg: &Argument) -> Option<Self> {
        match arg {
            Argument::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromArgument for Id {
    fn from_argument(arg: &Argument) -> Option<Self> {
        match *arg {
            Argument::Id(v) => Some(v),
            _ => None,
        }
    }
}

impl FromArgument for Option<ObjectRef> {
    fn from_argument(arg: &Argument) -> Option<Self> {
        match arg {
            Argument::Object(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// Succeeds only for non-null object handles.
impl FromArgument for ObjectRef {
    fn from_argument(arg: &Argument) -> Option<Self> {
        match arg {
            Argument::Object(v) => v.clone(),
            _ => None,
        }
    }
}

impl FromArgument for Stream {
    fn from_argument(arg: &Argument) -> Option<Self> {
        match arg {
            Argument::Stream(v) => Some(v.clone()),
            _ => None,
        }
    }
}

macro_rules! array_from_argument {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromArgument for Vec<$t> {
                fn from_argument(arg: &Argument) -> Option<Self> {
                    match arg {
                        Argument::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

array_from_argument! {
    i8 => Int8Array,
    i16 => Int16Array,
    i32 => Int32Array,
    i64 => Int64Array,
    u8 => UInt8Array,
    u16 => UInt16Array,
    u32 => UInt32Array,
    u64 => UInt64Array,
    f32 => Float32Array,
    f64 => Float64Array,
}
