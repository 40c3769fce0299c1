// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for the `clientserver` conformance tests.
//!
//! [`Widget`] is a minimal scriptable object: it stores one integer and records every method call
//! it receives, so tests can check both effects and dispatch.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use clientserver_interpreter::{
    DispatchError, ErrorInfo, Interpreter, InterpreterObserver, RegisterError, command_function,
    new_instance_function,
};
use clientserver_stream::{Argument, Command, Id, Object, ObjectRef};

/// Class name under which [`Widget`] is registered.
pub const WIDGET: &str = "Widget";

/// A scriptable object holding one integer.
#[derive(Debug, Default)]
pub struct Widget {
    value: Cell<i64>,
    calls: RefCell<Vec<(String, Vec<Argument>)>>,
}

impl Widget {
    /// Current value.
    pub fn value(&self) -> i64 {
        self.value.get()
    }

    /// Every method call so far, with its expanded method arguments.
    pub fn calls(&self) -> Vec<(String, Vec<Argument>)> {
        self.calls.borrow().clone()
    }
}

impl Object for Widget {
    fn class_name(&self) -> &str {
        WIDGET
    }
}

/// Registers [`Widget`]'s factory and command function.
///
/// Methods:
/// - `SetValue(v)` stores an integer.
/// - `GetValue()` replies with the stored integer.
/// - `Echo(..)` replies with its arguments unchanged.
/// - `Handle()` replies with the lowest id the widget is registered under.
///
/// Fails if another `Widget` factory or command function is already registered.
pub fn register_widget(interp: &mut Interpreter) -> Result<(), RegisterError> {
    let mut registered = Ok(());
    interp.initialize_module("widgets", |interp| {
        registered = add_widget_functions(interp);
    });
    registered
}

fn add_widget_functions(interp: &mut Interpreter) -> Result<(), RegisterError> {
    interp.add_new_instance_function(
        WIDGET,
        new_instance_function(|| Rc::new(Widget::default())),
    )?;
    interp.add_command_function(
        WIDGET,
        command_function(|call| {
            let widget = call
                .target::<Widget>()
                .ok_or_else(|| DispatchError::Failed("target is not a Widget".into()))?;
            let arguments = (0..call.arg_count())
                .filter_map(|i| call.argument(i).cloned())
                .collect::<Vec<_>>();
            widget
                .calls
                .borrow_mut()
                .push((call.method().into(), arguments.clone()));
            match call.method() {
                "SetValue" => {
                    call.expect_arg_count(1)?;
                    widget.value.set(call.arg(0)?);
                }
                "GetValue" => {
                    call.expect_arg_count(0)?;
                    let value = widget.value.get();
                    call.reply(value);
                }
                "Echo" => {
                    call.result().push_message(Command::Reply, arguments);
                }
                "Handle" => {
                    let object = call.object().clone();
                    let id = call.interpreter().id_from_object(&object);
                    call.reply(id.unwrap_or(Id::NULL));
                }
                _ => return Err(DispatchError::UnknownMethod),
            }
            Ok(())
        }),
    )?;
    Ok(())
}

/// Returns an interpreter with [`Widget`] registered.
pub fn widget_interpreter() -> Result<Interpreter, RegisterError> {
    let mut interp = Interpreter::new();
    register_widget(&mut interp)?;
    Ok(interp)
}

/// Returns the object registered under `id` if it is a [`Widget`].
pub fn widget(interp: &Interpreter, id: Id) -> Option<ObjectRef> {
    interp
        .object_from_id(id)
        .filter(|object| object.is::<Widget>())
}

/// Returns the value of the [`Widget`] registered under `id`.
pub fn widget_value(interp: &Interpreter, id: Id) -> Option<i64> {
    let object = widget(interp, id)?;
    object.downcast_ref::<Widget>().map(Widget::value)
}

/// Collects every error notification.
#[derive(Clone, Debug, Default)]
pub struct ErrorLog(pub Rc<RefCell<Vec<ErrorInfo>>>);

impl InterpreterObserver for ErrorLog {
    fn error(&mut self, info: &ErrorInfo) {
        self.0.borrow_mut().push(info.clone());
    }
}
