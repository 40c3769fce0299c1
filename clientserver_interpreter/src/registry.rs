// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The identifier registry.
//!
//! Every entry maps a non-zero [`Id`] to a one-message `Reply` stream. For objects created by
//! `New`, the object handle inside that reply is the registry's only strong reference; deleting
//! the entry releases it.

use clientserver_stream::{Command, Id, ObjectRef, Stream, same_object};

use crate::interpreter::Interpreter;
use crate::process::ErrorKind;

impl Interpreter {
    /// Returns a fresh identifier, or `None` once every `u32` id has been handed out or passed.
    ///
    /// Identifiers increase strictly for the lifetime of the interpreter and are never reused,
    /// including ids chosen by a producer and registered through `New` or `Assign`.
    pub fn next_available_id(&mut self) -> Option<Id> {
        let id = u32::try_from(self.next_id).ok()?;
        self.next_id += 1;
        Some(Id(id))
    }

    /// Registers `object` under `id` as a `Reply` holding the object.
    pub fn new_instance(&mut self, object: ObjectRef, id: Id) -> Result<(), ErrorKind> {
        let mut reply = Stream::new();
        reply.begin(Command::Reply).arg(object).end();
        self.register(id, reply)
    }

    /// Stores `reply` under `id`, refusing the reserved id and ids already in use.
    pub(crate) fn register(&mut self, id: Id, reply: Stream) -> Result<(), ErrorKind> {
        self.check_unused(id)?;
        self.next_id = self.next_id.max(u64::from(id.as_u32()) + 1);
        self.ids.insert(id, reply);
        Ok(())
    }

    pub(crate) fn check_unused(&self, id: Id) -> Result<(), ErrorKind> {
        if !id.is_valid() {
            return Err(ErrorKind::InvalidId);
        }
        if self.ids.contains_key(&id) {
            return Err(ErrorKind::IdInUse(id));
        }
        Ok(())
    }

    /// Returns the object stored under `id`, if the entry holds a non-null object.
    #[must_use]
    pub fn object_from_id(&self, id: Id) -> Option<ObjectRef> {
        self.ids.get(&id)?.get::<ObjectRef>(0, 0)
    }

    /// Returns the lowest id whose stored reply holds `object` as its first value.
    ///
    /// This is a linear scan over the registry.
    #[must_use]
    pub fn id_from_object(&self, object: &ObjectRef) -> Option<Id> {
        self.ids.iter().find_map(|(id, reply)| {
            reply
                .get::<ObjectRef>(0, 0)
                .is_some_and(|o| same_object(&o, object))
                .then_some(*id)
        })
    }

    /// Returns the reply stored under `id`.
    #[must_use]
    pub fn message_from_id(&self, id: Id) -> Option<&Stream> {
        self.ids.get(&id)
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains_id(&self, id: Id) -> bool {
        self.ids.contains_key(&id)
    }

    /// Returns the number of registered ids.
    #[must_use]
    pub fn id_count(&self) -> usize {
        self.ids.len()
    }

    /// Removes the entry for `id`.
    ///
    /// Observers are told about a stored object before the registry lets go of it.
    pub fn delete_id(&mut self, id: Id) -> Result<(), ErrorKind> {
        if !id.is_valid() {
            return Err(ErrorKind::InvalidId);
        }
        if !self.ids.contains_key(&id) {
            return Err(ErrorKind::IdNotFound(id));
        }
        if let Some(object) = self.object_from_id(id) {
            self.notify(|o| o.instance_deleting(id, &object));
        }
        self.ids.remove(&id);
        tracing::debug!(%id, "deleted id");
        Ok(())
    }
}
