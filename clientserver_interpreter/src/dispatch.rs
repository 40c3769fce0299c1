// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-class function tables.
//!
//! Two string-keyed tables drive the interpreter: class name to factory (used by `New`) and class
//! name to command function (used by `Invoke`). `Invoke` looks the command function up by the
//! runtime [`class_name`](clientserver_stream::Object::class_name) of the resolved target, so
//! dispatch follows whatever concrete object an id currently holds.

use std::boxed::Box;
use std::rc::Rc;
use std::string::String;

use clientserver_stream::{Argument, Command, FromArgument, Object, ObjectRef, Stream};

use crate::interpreter::Interpreter;

/// Constructs a new instance of one class.
pub type NewInstanceFunction = Rc<dyn Fn() -> ObjectRef>;

/// Applies a named method to an object of one class.
///
/// Objects are shared through [`ObjectRef`], so methods that mutate state do so through interior
/// mutability.
pub type CommandFunction = Rc<dyn Fn(&mut Call<'_>) -> Result<(), DispatchError>>;

/// Wraps a closure as a [`NewInstanceFunction`].
pub fn new_instance_function(f: impl Fn() -> ObjectRef + 'static) -> NewInstanceFunction {
    Rc::new(f)
}

/// Wraps a closure as a [`CommandFunction`].
pub fn command_function(
    f: impl Fn(&mut Call<'_>) -> Result<(), DispatchError> + 'static,
) -> CommandFunction {
    Rc::new(f)
}

/// Failure reported by a [`CommandFunction`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The class has no method with the requested name.
    #[error("no such method")]
    UnknownMethod,
    /// The method was called with the wrong number of arguments.
    #[error("expected {expected} argument(s), got {actual}")]
    WrongArgumentCount {
        /// Arguments the method takes.
        expected: usize,
        /// Arguments supplied.
        actual: usize,
    },
    /// A method argument has the wrong type.
    #[error("argument {index} has the wrong type")]
    BadArgument {
        /// Zero-based method argument index (the target and method name are not counted).
        index: usize,
    },
    /// The method ran and failed.
    #[error("{0}")]
    Failed(String),
}

/// Failure to register a function.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    /// A different function is already registered under this class name; it was kept.
    #[error("a different function is already registered for class \"{class}\"")]
    Conflict {
        /// The class name.
        class: String,
    },
}

/// One method invocation, as seen by a [`CommandFunction`].
///
/// The message has already been expanded: ids, last-result markers and nested streams have been
/// replaced by literal values.
#[derive(Debug)]
pub struct Call<'a> {
    pub(crate) interpreter: &'a mut Interpreter,
    pub(crate) object: &'a ObjectRef,
    pub(crate) method: &'a str,
    pub(crate) message: &'a Stream,
    pub(crate) result: &'a mut Stream,
}

impl Call<'_> {
    /// Method arguments start after the target and the method name.
    const FIRST_ARGUMENT: usize = 2;

    /// The interpreter processing this call.
    pub fn interpreter(&mut self) -> &mut Interpreter {
        self.interpreter
    }

    /// The resolved target object.
    #[must_use]
    pub fn object(&self) -> &ObjectRef {
        self.object
    }

    /// Downcasts the target object to its concrete type.
    #[must_use]
    pub fn target<T: Object>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// The method name.
    #[must_use]
    pub fn method(&self) -> &str {
        self.method
    }

    /// The full expanded message: target, method name, then method arguments.
    #[must_use]
    pub fn message(&self) -> &Stream {
        self.message
    }

    /// Returns the number of method arguments.
    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.message
            .argument_count(0)
            .unwrap_or(0)
            .saturating_sub(Self::FIRST_ARGUMENT)
    }

    /// Borrows method argument `index`.
    #[must_use]
    pub fn argument(&self, index: usize) -> Option<&Argument> {
        self.message.argument(0, Self::FIRST_ARGUMENT + index)
    }

    /// Extracts method argument `index` as `T`.
    pub fn arg<T: FromArgument>(&self, index: usize) -> Result<T, DispatchError> {
        self.message
            .get(0, Self::FIRST_ARGUMENT + index)
            .ok_or(DispatchError::BadArgument { index })
    }

    /// Fails unless exactly `expected` method arguments were supplied.
    pub fn expect_arg_count(&self, expected: usize) -> Result<(), DispatchError> {
        let actual = self.arg_count();
        if actual == expected {
            Ok(())
        } else {
            Err(DispatchError::WrongArgumentCount { expected, actual })
        }
    }

    /// The result stream. It starts empty; an empty result becomes an empty `Reply`.
    pub fn result(&mut self) -> &mut Stream {
        self.result
    }

    /// Replaces the result with a one-value `Reply`.
    pub fn reply(&mut self, value: impl Into<Argument>) {
        self.result.reset();
        self.result.begin(Command::Reply).arg(value).end();
    }
}

impl Interpreter {
    /// Registers the factory used by `New` for `class`.
    ///
    /// Registering the same function again is a no-op. Registering a different function for a
    /// class that already has one keeps the first and reports [`RegisterError::Conflict`].
    pub fn add_new_instance_function(
        &mut self,
        class: &str,
        function: NewInstanceFunction,
    ) -> Result<(), RegisterError> {
        if let Some(existing) = self.new_instance_functions.get(class) {
            if Rc::ptr_eq(existing, &function) {
                return Ok(());
            }
            tracing::warn!(class, "conflicting factory registration ignored");
            return Err(RegisterError::Conflict {
                class: class.into(),
            });
        }
        self.new_instance_functions
            .insert(Box::from(class), function);
        Ok(())
    }

    /// Registers the command function used by `Invoke` for objects of `class`.
    ///
    /// Same duplicate rules as [`add_new_instance_function`](Self::add_new_instance_function).
    pub fn add_command_function(
        &mut self,
        class: &str,
        function: CommandFunction,
    ) -> Result<(), RegisterError> {
        if let Some(existing) = self.command_functions.get(class) {
            if Rc::ptr_eq(existing, &function) {
                return Ok(());
            }
            tracing::warn!(class, "conflicting command function registration ignored");
            return Err(RegisterError::Conflict {
                class: class.into(),
            });
        }
        self.command_functions.insert(Box::from(class), function);
        Ok(())
    }

    /// Returns `true` if `class` has a factory.
    #[must_use]
    pub fn has_new_instance_function(&self, class: &str) -> bool {
        self.new_instance_functions.contains_key(class)
    }

    /// Returns `true` if `class` has a command function.
    #[must_use]
    pub fn has_command_function(&self, class: &str) -> bool {
        self.command_functions.contains_key(class)
    }

    /// Returns the factory registered for `class`.
    #[must_use]
    pub fn new_instance_function(&self, class: &str) -> Option<NewInstanceFunction> {
        self.new_instance_functions.get(class).cloned()
    }

    /// Returns the command function registered for `class`.
    #[must_use]
    pub fn command_function(&self, class: &str) -> Option<CommandFunction> {
        self.command_functions.get(class).cloned()
    }
}
