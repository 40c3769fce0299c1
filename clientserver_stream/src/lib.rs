// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `clientserver_stream`: a self-describing message buffer for driving objects across a process
//! or serialization boundary.
//!
//! A [`Stream`] holds zero or more messages. Each message is a [`Command`] followed by typed
//! [`Argument`]s. Streams convert losslessly to bytes ([`Stream::data`] / [`Stream::set_data`])
//! and to a reversible ASCII form ([`Display`](core::fmt::Display) / [`Stream::set_from_text`]).
//!
//! Both forms round-trip streams without live object pointers. A non-null
//! [`Argument::Object`] is a process-local handle: it is written as an address, but reading it
//! back fails, even in the process that wrote it. Null object pointers round-trip.
//!
//! ## Example
//!
//! ```
//! use clientserver_stream::{ByteOrder, Command, Id, Stream};
//!
//! let mut s = Stream::new();
//! s.begin(Command::New).arg("Widget").arg(Id(1)).end();
//! s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(42_i32).end();
//!
//! // A big-endian producer and a little-endian consumer agree on every value.
//! let bytes = s.data_with_order(ByteOrder::Big);
//! let back = Stream::from_data(&bytes)?;
//! assert_eq!(back, s);
//!
//! let text = s.to_string();
//! assert!(text.starts_with("Message 0 = New\n  Argument 0 = string_value {Widget}\n"));
//! assert_eq!(text.parse::<Stream>().unwrap(), s);
//! # Ok::<(), clientserver_stream::DecodeError>(())
//! ```
//!
//! A live object does not survive either form:
//!
//! ```
//! use std::rc::Rc;
//!
//! use clientserver_stream::{Command, DecodeError, Object, ObjectRef, Stream};
//!
//! #[derive(Debug)]
//! struct Widget;
//!
//! impl Object for Widget {
//!     fn class_name(&self) -> &str {
//!         "Widget"
//!     }
//! }
//!
//! let object: ObjectRef = Rc::new(Widget);
//! let mut s = Stream::new();
//! s.begin(Command::Reply).arg(object).end();
//!
//! assert!(matches!(
//!     Stream::from_data(&s.data()),
//!     Err(DecodeError::UnresolvedObject(_))
//! ));
//! assert!(s.to_text().parse::<Stream>().is_err());
//! ```

#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

mod codec;
pub mod format;
pub mod stream;
mod text;
pub mod value;
pub mod variant;

pub use format::{ByteOrder, DecodeError};
pub use stream::{Command, Stream};
pub use text::{TextError, TextErrorKind};
pub use value::{
    Argument, ArgumentType, FromArgument, Id, LastResult, Object, ObjectRef, object_address,
    same_object,
};
pub use variant::Variant;
