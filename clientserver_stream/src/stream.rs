// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The message buffer.
//!
//! A [`Stream`] is an ordered list of messages. Each message is a [`Command`] followed by typed
//! [`Argument`]s and is committed by [`Stream::end`]. Only committed messages are visible to the
//! readers, the codec and the textual form.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::value::{Argument, ArgumentType, FromArgument, LastResult};

/// The command carried by a message.
///
/// The discriminants are the on-wire `u32` codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Command {
    /// Create an instance of a class under an identifier.
    New = 0,
    /// Invoke a named method on an object.
    Invoke = 1,
    /// Release the result stored under an identifier.
    Delete = 2,
    /// Register already-computed values under a fresh identifier.
    Assign = 3,
    /// A successful result.
    Reply = 4,
    /// A failure result carrying a description.
    Error = 5,
    /// Not a command; producers use it when no real command applies.
    EndOfCommands = 6,
}

impl Command {
    const ALL: [Self; 7] = [
        Self::New,
        Self::Invoke,
        Self::Delete,
        Self::Assign,
        Self::Reply,
        Self::Error,
        Self::EndOfCommands,
    ];

    /// Decodes a wire command code.
    #[must_use]
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::ALL.get(usize::try_from(v).ok()?).copied()
    }

    /// Returns the name used by the textual stream form.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Invoke => "Invoke",
            Self::Delete => "Delete",
            Self::Assign => "Assign",
            Self::Reply => "Reply",
            Self::Error => "Error",
            Self::EndOfCommands => "EndOfCommands",
        }
    }

    /// Looks up a command by its textual name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Message {
    pub(crate) command: Command,
    pub(crate) arguments: Vec<Argument>,
}

impl Message {
    pub(crate) fn new(command: Command) -> Self {
        Self {
            command,
            arguments: Vec::new(),
        }
    }
}

/// A buffer of zero or more messages.
///
/// ## Building
///
/// ```
/// use clientserver_stream::{Command, Id, Stream};
///
/// let mut s = Stream::new();
/// s.begin(Command::New).arg("Widget").arg(Id(1)).end();
/// s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(42_i32).end();
///
/// assert_eq!(s.message_count(), 2);
/// assert_eq!(s.get::<i64>(1, 2), Some(42));
/// ```
///
/// [`begin`](Self::begin) while a message is still open commits the open message first.
/// Arguments appended while no message is open are dropped.
///
/// ## Reading
///
/// Readers address arguments by `(message, argument)` index and return `None` for out-of-range
/// indices or type mismatches.
///
/// `Clone` copies the whole buffer, including the strong references held on embedded objects.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stream {
    pub(crate) messages: Vec<Message>,
    open: Option<Message>,
}

impl Stream {
    /// Creates an empty stream.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
            open: None,
        }
    }

    /// Truncates to zero messages, keeping the allocated capacity.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.open = None;
    }

    /// Opens a new message with `command`.
    pub fn begin(&mut self, command: Command) -> &mut Self {
        if let Some(open) = self.open.take() {
            self.messages.push(open);
        }
        self.open = Some(Message::new(command));
        self
    }

    /// Appends an argument to the open message.
    pub fn arg(&mut self, value: impl Into<Argument>) -> &mut Self {
        if let Some(open) = self.open.as_mut() {
            open.arguments.push(value.into());
        }
        self
    }

    /// Appends an "insert the last result here" placeholder to the open message.
    pub fn last_result(&mut self) -> &mut Self {
        self.arg(LastResult)
    }

    /// Commits the open message.
    pub fn end(&mut self) -> &mut Self {
        if let Some(open) = self.open.take() {
            self.messages.push(open);
        }
        self
    }

    /// Appends a complete message.
    pub fn push_message(&mut self, command: Command, arguments: Vec<Argument>) -> &mut Self {
        self.end();
        self.messages.push(Message { command, arguments });
        self
    }

    /// Returns `true` if a message has been opened but not yet committed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Returns the number of committed messages.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if there are no committed messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the command of `message`.
    #[must_use]
    pub fn command(&self, message: usize) -> Option<Command> {
        self.messages.get(message).map(|m| m.command)
    }

    /// Returns the number of arguments of `message` (the End marker is not counted).
    #[must_use]
    pub fn argument_count(&self, message: usize) -> Option<usize> {
        self.messages.get(message).map(|m| m.arguments.len())
    }

    /// Returns the wire type of argument `argument` of `message`.
    #[must_use]
    pub fn argument_type(&self, message: usize, argument: usize) -> Option<ArgumentType> {
        self.argument(message, argument).map(Argument::argument_type)
    }

    /// Returns argument `argument` of `message`.
    #[must_use]
    pub fn argument(&self, message: usize, argument: usize) -> Option<&Argument> {
        self.messages.get(message)?.arguments.get(argument)
    }

    /// Returns all arguments of `message`.
    #[must_use]
    pub fn arguments(&self, message: usize) -> Option<&[Argument]> {
        self.messages.get(message).map(|m| m.arguments.as_slice())
    }

    /// Extracts argument `argument` of `message` as `T`.
    ///
    /// See [`FromArgument`] for the accepted conversions.
    #[must_use]
    pub fn get<T: FromArgument>(&self, message: usize, argument: usize) -> Option<T> {
        T::from_argument(self.argument(message, argument)?)
    }

    /// Borrows a string argument.
    #[must_use]
    pub fn str_argument(&self, message: usize, argument: usize) -> Option<&str> {
        match self.argument(message, argument)? {
            Argument::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns a copy of `message` as a stream of its own.
    #[must_use]
    pub fn message(&self, message: usize) -> Option<Self> {
        let m = self.messages.get(message)?;
        Some(Self {
            messages: alloc::vec![m.clone()],
            open: None,
        })
    }

    /// Appends a copy of `message` of `other` as a committed message.
    ///
    /// Returns `false` if `message` is out of range.
    pub fn copy_message_from(&mut self, other: &Self, message: usize) -> bool {
        let Some(m) = other.messages.get(message) else {
            return false;
        };
        self.end();
        self.messages.push(m.clone());
        true
    }

    /// Appends arguments `start..` of `message` of `other` to the open message.
    ///
    /// Returns `false` if `message` is out of range or no message is open.
    pub fn copy_arguments_from(&mut self, other: &Self, message: usize, start: usize) -> bool {
        let Some(m) = other.messages.get(message) else {
            return false;
        };
        let Some(open) = self.open.as_mut() else {
            return false;
        };
        open.arguments.extend(m.arguments.iter().skip(start).cloned());
        true
    }

    /// Returns `true` if any committed message embeds a non-null object handle.
    #[must_use]
    pub fn holds_objects(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.arguments.iter().any(Argument::holds_object))
    }

    /// Returns the first string argument of the first `Error` message, if any.
    ///
    /// Interpreters describe failures this way.
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        let index = self
            .messages
            .iter()
            .position(|m| m.command == Command::Error)?;
        self.str_argument(index, 0)
    }

    /// Creates a one-message `Error` stream describing a failure.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        let mut s = Self::new();
        s.begin(Command::Error).arg(text.into()).end();
        s
    }

    pub(crate) fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            open: None,
        }
    }
}
