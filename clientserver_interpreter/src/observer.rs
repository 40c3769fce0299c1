// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interpreter notifications.

use std::boxed::Box;
use std::string::String;

use clientserver_stream::{Id, ObjectRef, Stream};

use crate::interpreter::Interpreter;

/// Details of a failed message.
#[derive(Clone, Debug)]
pub struct ErrorInfo {
    /// Index of the failing message within the stream being processed.
    pub message_index: usize,
    /// The failing message, unexpanded, as a one-message stream.
    pub message: Stream,
    /// Human-readable description; also the text of the `Error` last result.
    pub text: String,
}

/// Receives interpreter events.
///
/// All methods default to no-ops.
pub trait InterpreterObserver {
    /// Called after `New` registers an instance of `class` under `id`.
    fn instance_created(&mut self, _class: &str, _id: Id) {}

    /// Called before the object stored under `id` is released.
    fn instance_deleting(&mut self, _id: Id, _object: &ObjectRef) {}

    /// Called for every failed message, including messages of nested streams.
    fn error(&mut self, _info: &ErrorInfo) {}
}

/// Handle returned by [`Interpreter::add_observer`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl Interpreter {
    /// Adds an observer; it is notified until removed.
    pub fn add_observer(&mut self, observer: Box<dyn InterpreterObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    /// Removes and returns an observer.
    pub fn remove_observer(&mut self, id: ObserverId) -> Option<Box<dyn InterpreterObserver>> {
        let index = self.observers.iter().position(|(o, _)| *o == id)?;
        Some(self.observers.remove(index).1)
    }

    pub(crate) fn notify(&mut self, mut event: impl FnMut(&mut dyn InterpreterObserver)) {
        for (_, observer) in &mut self.observers {
            event(observer.as_mut());
        }
    }
}
