// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `clientserver_interpreter`: executes [`clientserver_stream`] messages against live objects.
//!
//! An [`Interpreter`] owns three things:
//! - a registry mapping [`Id`](clientserver_stream::Id)s to `Reply` messages (the results of `New`
//!   and `Assign`),
//! - per-class factory and command-function tables, filled by the host or by loaded modules,
//! - the last result, which `last_result` arguments of the next message splice in.
//!
//! This crate is `std`-only and single-threaded.
//!
//! ## Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use clientserver_interpreter::{DispatchError, Interpreter, command_function, new_instance_function};
//! use clientserver_stream::{Command, Id, Object, Stream};
//!
//! #[derive(Debug, Default)]
//! struct Widget {
//!     value: Cell<i32>,
//! }
//!
//! impl Object for Widget {
//!     fn class_name(&self) -> &str {
//!         "Widget"
//!     }
//! }
//!
//! let mut interp = Interpreter::new();
//! interp.add_new_instance_function("Widget", new_instance_function(|| Rc::new(Widget::default())))?;
//! interp.add_command_function(
//!     "Widget",
//!     command_function(|call| {
//!         let widget = call.target::<Widget>().ok_or(DispatchError::UnknownMethod)?;
//!         match call.method() {
//!             "SetValue" => widget.value.set(call.arg(0)?),
//!             _ => return Err(DispatchError::UnknownMethod),
//!         }
//!         Ok(())
//!     }),
//! )?;
//!
//! let mut s = Stream::new();
//! s.begin(Command::New).arg("Widget").arg(Id(1)).end();
//! s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(42_i32).end();
//! interp.process_stream(&s)?;
//!
//! let widget = interp.object_from_id(Id(1)).unwrap();
//! assert_eq!(widget.downcast_ref::<Widget>().unwrap().value.get(), 42);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod dispatch;
mod interpreter;
#[allow(unsafe_code, reason = "modules are shared libraries opened through libloading")]
mod module;
mod observer;
mod process;
mod registry;

pub use dispatch::{
    Call, CommandFunction, DispatchError, NewInstanceFunction, RegisterError, command_function,
    new_instance_function,
};
pub use interpreter::{Interpreter, Limits};
pub use module::{LoadError, ModuleInitializer};
pub use observer::{ErrorInfo, InterpreterObserver, ObserverId};
pub use process::{ErrorKind, ProcessError};
