// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Message processing.
//!
//! Each message is handled on its own: its command handler either succeeds and replaces the last
//! result with its reply, or fails, leaving an `Error` last result and stopping the stream.
//! Effects of messages that already succeeded are kept.
//!
//! `Invoke` and `Assign` expand their arguments first:
//! - `id_value` splices in every value stored under that id. Only the message's own arguments
//!   are walked; values that are themselves ids are not chased further.
//! - `last_result` splices in the values of the current last result.
//! - `stream_value` is processed as a whole stream, with its own last result, and the values of
//!   its final result are spliced in.

use std::io::Write as _;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::string::{String, ToString};

use clientserver_stream::{Argument, Command, Id, ObjectRef, Stream};

use crate::dispatch::{Call, DispatchError};
use crate::interpreter::Interpreter;
use crate::observer::ErrorInfo;

/// Why a message failed.
///
/// The `Display` text is the description carried by the `Error` last result.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// The stream has no message at the requested index.
    #[error("Message does not exist.")]
    NoMessage,
    /// The command is not one an interpreter executes.
    #[error("Invalid command {0}.")]
    UnknownCommand(Command),
    /// The message has the wrong number of arguments for its command.
    #[error("{command} expects {expected} argument(s) but has {actual}.")]
    WrongArgumentCount {
        /// The command.
        command: Command,
        /// What the command accepts, e.g. `"2"` or `"at least 1"`.
        expected: &'static str,
        /// Arguments present.
        actual: usize,
    },
    /// An argument has the wrong type.
    #[error("Argument {index} of {command} must be {expected}.")]
    BadArgument {
        /// The command.
        command: Command,
        /// Zero-based argument index.
        index: usize,
        /// Description of the expected value.
        expected: &'static str,
    },
    /// Id 0 was given where a new id is required.
    #[error("Attempt to use ID 0, which is reserved.")]
    InvalidId,
    /// The id is already registered.
    #[error("Attempt to create ID {0} which already exists.")]
    IdInUse(Id),
    /// The id is not registered.
    #[error("Attempt to use ID {0} which does not exist.")]
    IdNotFound(Id),
    /// No factory is registered for the class.
    #[error("Cannot create object of type \"{0}\".")]
    NoFactory(String),
    /// The `Invoke` target did not resolve to a live object.
    #[error("Invoke target is not an object.")]
    NotAnObject,
    /// No command function is registered for the target's runtime class.
    #[error("Wrapper function not found for class \"{0}\".")]
    NoCommandFunction(String),
    /// The command function reported a failure.
    #[error("Method \"{method}\" of class \"{class}\" failed: {source}.")]
    Dispatch {
        /// Runtime class of the target.
        class: String,
        /// Method name.
        method: String,
        /// The command function's error.
        source: DispatchError,
    },
    /// Nested streams exceed [`Limits::max_stream_depth`](crate::Limits::max_stream_depth).
    #[error("Nested streams exceed the depth limit of {0}.")]
    NestingTooDeep(usize),
    /// A nested stream failed; carries the nested failure's description.
    #[error("Nested stream failed: {0}")]
    SubStreamFailed(String),
}

/// A failed message, located by its index in the processed stream.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("message {message}: {kind}")]
pub struct ProcessError {
    /// Index of the failed message.
    pub message: usize,
    /// What went wrong.
    pub kind: ErrorKind,
}

/// Swaps in a fresh last result for the lifetime of the guard and restores the outer one on drop.
struct LastResultScope<'a> {
    interpreter: &'a mut Interpreter,
    outer: Stream,
}

impl<'a> LastResultScope<'a> {
    fn enter(interpreter: &'a mut Interpreter) -> Self {
        let outer = mem::take(&mut interpreter.last_result);
        interpreter.depth += 1;
        Self { interpreter, outer }
    }
}

impl Deref for LastResultScope<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interpreter
    }
}

impl DerefMut for LastResultScope<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interpreter
    }
}

impl Drop for LastResultScope<'_> {
    fn drop(&mut self) {
        self.interpreter.depth -= 1;
        self.interpreter.last_result = mem::take(&mut self.outer);
    }
}

fn expect_count(
    command: Command,
    message: &Stream,
    ok: impl Fn(usize) -> bool,
    expected: &'static str,
) -> Result<(), ErrorKind> {
    let actual = message.argument_count(0).unwrap_or(0);
    if ok(actual) {
        Ok(())
    } else {
        Err(ErrorKind::WrongArgumentCount {
            command,
            expected,
            actual,
        })
    }
}

fn id_argument(command: Command, message: &Stream, index: usize) -> Result<Id, ErrorKind> {
    match message.argument(0, index) {
        Some(Argument::Id(id)) => Ok(*id),
        _ => Err(ErrorKind::BadArgument {
            command,
            index,
            expected: "an id",
        }),
    }
}

impl Interpreter {
    /// Processes every message of `stream` in order, stopping at the first failure.
    ///
    /// Messages before the failing one keep their effects.
    pub fn process_stream(&mut self, stream: &Stream) -> Result<(), ProcessError> {
        for index in 0..stream.message_count() {
            self.process_message(stream, index)?;
        }
        Ok(())
    }

    /// Processes message `index` of `stream`.
    ///
    /// On success the last result holds the command's reply. On failure it holds an `Error`
    /// message, observers are notified and the failure is returned.
    pub fn process_message(&mut self, stream: &Stream, index: usize) -> Result<(), ProcessError> {
        let message = stream.message(index).unwrap_or_default();
        tracing::debug!(
            index,
            command = ?message.command(0),
            depth = self.depth,
            "processing message"
        );

        let outcome = match message.command(0) {
            None => Err(ErrorKind::NoMessage),
            Some(command) => self.execute(command, &message),
        };

        let failure = match outcome {
            Ok(reply) => {
                self.last_result = reply;
                None
            }
            Err(kind) => {
                let text = kind.to_string();
                tracing::error!(index, depth = self.depth, "{text}");
                self.last_result = Stream::error(text.as_str());
                let info = ErrorInfo {
                    message_index: index,
                    message: message.clone(),
                    text,
                };
                self.notify(|o| o.error(&info));
                Some(ProcessError {
                    message: index,
                    kind,
                })
            }
        };

        self.write_log(index, &message);
        failure.map_or(Ok(()), Err)
    }

    fn write_log(&mut self, index: usize, message: &Stream) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        let written = write!(
            log,
            "Processing message {index}:\n{message}Result:\n{}\n",
            self.last_result
        )
        .and_then(|()| log.flush());
        if let Err(e) = written {
            tracing::warn!(error = %e, "failed to write message log");
        }
    }

    fn execute(&mut self, command: Command, message: &Stream) -> Result<Stream, ErrorKind> {
        match command {
            Command::New => self.execute_new(message),
            Command::Invoke => self.execute_invoke(message),
            Command::Delete => self.execute_delete(message),
            Command::Assign => self.execute_assign(message),
            Command::Reply | Command::Error | Command::EndOfCommands => {
                Err(ErrorKind::UnknownCommand(command))
            }
        }
    }

    fn execute_new(&mut self, message: &Stream) -> Result<Stream, ErrorKind> {
        let command = Command::New;
        expect_count(command, message, |n| n == 2, "2")?;
        let class = message
            .str_argument(0, 0)
            .ok_or(ErrorKind::BadArgument {
                command,
                index: 0,
                expected: "a class name",
            })?;
        let id = id_argument(command, message, 1)?;
        self.check_unused(id)?;
        let factory = self
            .new_instance_function(class)
            .ok_or_else(|| ErrorKind::NoFactory(class.into()))?;

        let object = factory();
        self.new_instance(object.clone(), id)?;
        tracing::debug!(class, %id, "created instance");
        self.notify(|o| o.instance_created(class, id));

        let mut reply = Stream::new();
        reply.begin(Command::Reply).arg(object).end();
        Ok(reply)
    }

    fn execute_invoke(&mut self, message: &Stream) -> Result<Stream, ErrorKind> {
        let command = Command::Invoke;
        let expanded = self.expand(message, 0)?;
        expect_count(command, &expanded, |n| n >= 2, "at least 2")?;
        let Some(Argument::Object(Some(object))) = expanded.argument(0, 0) else {
            return Err(ErrorKind::NotAnObject);
        };
        let object: ObjectRef = object.clone();
        let method = expanded
            .str_argument(0, 1)
            .ok_or(ErrorKind::BadArgument {
                command,
                index: 1,
                expected: "a method name",
            })?;
        let class = object.class_name();
        let function = self
            .command_function(class)
            .ok_or_else(|| ErrorKind::NoCommandFunction(class.into()))?;

        let mut result = Stream::new();
        let mut call = Call {
            interpreter: self,
            object: &object,
            method,
            message: &expanded,
            result: &mut result,
        };
        function(&mut call).map_err(|source| ErrorKind::Dispatch {
            class: class.into(),
            method: method.into(),
            source,
        })?;

        result.end();
        if result.is_empty() {
            result.begin(Command::Reply).end();
        }
        Ok(result)
    }

    fn execute_delete(&mut self, message: &Stream) -> Result<Stream, ErrorKind> {
        let command = Command::Delete;
        expect_count(command, message, |n| n == 1, "1")?;
        let id = id_argument(command, message, 0)?;
        self.delete_id(id)?;
        Ok(Stream::new())
    }

    fn execute_assign(&mut self, message: &Stream) -> Result<Stream, ErrorKind> {
        let command = Command::Assign;
        expect_count(command, message, |n| n >= 1, "at least 1")?;
        let id = id_argument(command, message, 0)?;
        // Reject before expanding: nested streams have side effects.
        self.check_unused(id)?;
        let expanded = self.expand(message, 1)?;

        let mut reply = Stream::new();
        reply.begin(Command::Reply);
        reply.copy_arguments_from(&expanded, 0, 1);
        reply.end();
        self.register(id, reply.clone())?;
        tracing::debug!(%id, values = reply.argument_count(0), "assigned id");
        Ok(reply)
    }

    /// Returns a copy of `message` with arguments from `first` on expanded.
    fn expand(&mut self, message: &Stream, first: usize) -> Result<Stream, ErrorKind> {
        let mut out = Stream::new();
        let Some(command) = message.command(0) else {
            return Ok(out);
        };
        out.begin(command);
        for (j, arg) in message.arguments(0).unwrap_or_default().iter().enumerate() {
            if j < first {
                out.arg(arg.clone());
                continue;
            }
            match arg {
                Argument::Id(id) if !id.is_valid() => {
                    out.arg(Option::<ObjectRef>::None);
                }
                Argument::Id(id) => {
                    let stored = self.ids.get(id).ok_or(ErrorKind::IdNotFound(*id))?;
                    out.copy_arguments_from(stored, 0, 0);
                }
                Argument::LastResult => {
                    out.copy_arguments_from(&self.last_result, 0, 0);
                }
                Argument::Stream(nested) => {
                    let result = self.process_nested(nested)?;
                    out.copy_arguments_from(&result, 0, 0);
                }
                other => {
                    out.arg(other.clone());
                }
            }
        }
        out.end();
        Ok(out)
    }

    fn process_nested(&mut self, nested: &Stream) -> Result<Stream, ErrorKind> {
        if self.depth >= self.limits.max_stream_depth {
            return Err(ErrorKind::NestingTooDeep(self.limits.max_stream_depth));
        }
        let mut scope = LastResultScope::enter(self);
        let outcome = scope.process_stream(nested);
        let result = mem::take(&mut scope.last_result);
        drop(scope);
        match outcome {
            Ok(()) => Ok(result),
            Err(_) => Err(ErrorKind::SubStreamFailed(
                result.error_text().unwrap_or_default().into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{command_function, new_instance_function};
    use crate::observer::InterpreterObserver;
    use crate::Limits;
    use clientserver_stream::Object;
    use std::boxed::Box;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, Default)]
    struct Widget {
        value: Cell<i32>,
    }

    impl Object for Widget {
        fn class_name(&self) -> &str {
            "Widget"
        }
    }

    /// Records every method call as `(method, argument count)`.
    fn widget_interpreter() -> (Interpreter, Rc<RefCell<Vec<(String, usize)>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut interp = Interpreter::new();
        interp
            .add_new_instance_function(
                "Widget",
                new_instance_function(|| Rc::new(Widget::default())),
            )
            .unwrap();
        let log = calls.clone();
        interp
            .add_command_function(
                "Widget",
                command_function(move |call| {
                    log.borrow_mut()
                        .push((call.method().into(), call.arg_count()));
                    let Some(w) = call.target::<Widget>() else {
                        return Err(DispatchError::Failed("not a widget".into()));
                    };
                    match call.method() {
                        "SetValue" => {
                            call.expect_arg_count(1)?;
                            w.value.set(call.arg(0)?);
                            Ok(())
                        }
                        "GetValue" => {
                            let v = w.value.get();
                            call.reply(v);
                            Ok(())
                        }
                        "Echo" => {
                            let values = call.message().arguments(0).unwrap_or_default()[2..]
                                .to_vec();
                            let result = call.result();
                            result.push_message(Command::Reply, values);
                            Ok(())
                        }
                        _ => Err(DispatchError::UnknownMethod),
                    }
                }),
            )
            .unwrap();
        (interp, calls)
    }

    fn widget(interp: &Interpreter, id: u32) -> Rc<dyn Object> {
        interp.object_from_id(Id(id)).unwrap()
    }

    fn value_of(interp: &Interpreter, id: u32) -> i32 {
        widget(interp, id).downcast_ref::<Widget>().unwrap().value.get()
    }

    #[test]
    fn new_invoke_delete() {
        let (mut interp, calls) = widget_interpreter();
        let mut s = Stream::new();
        s.begin(Command::New).arg("Widget").arg(Id(1)).end();
        interp.process_stream(&s).unwrap();
        assert_eq!(interp.last_result().command(0), Some(Command::Reply));
        assert!(interp.last_result().get::<ObjectRef>(0, 0).is_some());

        s.reset();
        s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(42_i32).end();
        interp.process_stream(&s).unwrap();
        assert_eq!(value_of(&interp, 1), 42);
        assert_eq!(*calls.borrow(), [(String::from("SetValue"), 1)]);
        // Nothing written by the command function: an empty reply.
        assert_eq!(interp.last_result().command(0), Some(Command::Reply));
        assert_eq!(interp.last_result().argument_count(0), Some(0));

        s.reset();
        s.begin(Command::Delete).arg(Id(1)).end();
        interp.process_stream(&s).unwrap();
        assert!(interp.last_result().is_empty());

        s.reset();
        s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(1_i32).end();
        let err = interp.process_stream(&s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IdNotFound(Id(1)));
        assert_eq!(
            interp.last_result().error_text(),
            Some("Attempt to use ID 1 which does not exist.")
        );
    }

    #[test]
    fn new_validates_before_creating() {
        let (mut interp, _) = widget_interpreter();
        let cases: Vec<(Stream, ErrorKind)> = vec![
            (
                {
                    let mut s = Stream::new();
                    s.begin(Command::New).arg("Widget").end();
                    s
                },
                ErrorKind::WrongArgumentCount {
                    command: Command::New,
                    expected: "2",
                    actual: 1,
                },
            ),
            (
                {
                    let mut s = Stream::new();
                    s.begin(Command::New).arg(3_i32).arg(Id(1)).end();
                    s
                },
                ErrorKind::BadArgument {
                    command: Command::New,
                    index: 0,
                    expected: "a class name",
                },
            ),
            (
                {
                    let mut s = Stream::new();
                    s.begin(Command::New).arg("Widget").arg(Id(0)).end();
                    s
                },
                ErrorKind::InvalidId,
            ),
            (
                {
                    let mut s = Stream::new();
                    s.begin(Command::New).arg("Gadget").arg(Id(1)).end();
                    s
                },
                ErrorKind::NoFactory("Gadget".into()),
            ),
        ];
        for (s, kind) in cases {
            assert_eq!(interp.process_stream(&s).unwrap_err().kind, kind);
            assert_eq!(interp.id_count(), 0);
        }
    }

    #[test]
    fn double_creation_keeps_the_first_entry() {
        let (mut interp, _) = widget_interpreter();
        let mut s = Stream::new();
        s.begin(Command::New).arg("Widget").arg(Id(1)).end();
        interp.process_stream(&s).unwrap();
        let first = widget(&interp, 1);

        assert_eq!(
            interp.process_stream(&s).unwrap_err().kind,
            ErrorKind::IdInUse(Id(1))
        );
        assert!(clientserver_stream::same_object(&widget(&interp, 1), &first));
    }

    #[test]
    fn new_announces_only_created_instances() {
        struct Created(Rc<RefCell<Vec<(String, Id)>>>);
        impl InterpreterObserver for Created {
            fn instance_created(&mut self, class: &str, id: Id) {
                self.0.borrow_mut().push((class.into(), id));
            }
        }

        let (mut interp, _) = widget_interpreter();
        let events = Rc::new(RefCell::new(Vec::new()));
        interp.add_observer(Box::new(Created(events.clone())));

        let mut s = Stream::new();
        s.begin(Command::New).arg("Widget").arg(Id(1)).end();
        interp.process_stream(&s).unwrap();
        assert_eq!(*events.borrow(), [(String::from("Widget"), Id(1))]);

        // Id in use, unknown class: nothing is created, nothing is announced.
        assert!(interp.process_stream(&s).is_err());
        s.reset();
        s.begin(Command::New).arg("Gadget").arg(Id(2)).end();
        assert!(interp.process_stream(&s).is_err());
        assert_eq!(events.borrow().len(), 1);
    }

    #[test]
    fn reply_and_error_are_not_executable() {
        let mut interp = Interpreter::new();
        for command in [Command::Reply, Command::Error, Command::EndOfCommands] {
            let mut s = Stream::new();
            s.begin(command).end();
            assert_eq!(
                interp.process_stream(&s).unwrap_err().kind,
                ErrorKind::UnknownCommand(command)
            );
        }
        assert_eq!(
            interp.process_message(&Stream::new(), 3).unwrap_err(),
            ProcessError {
                message: 3,
                kind: ErrorKind::NoMessage
            }
        );
    }

    #[test]
    fn invoke_dispatches_on_runtime_class() {
        let (mut interp, _) = widget_interpreter();

        #[derive(Debug)]
        struct Gadget;
        impl Object for Gadget {
            fn class_name(&self) -> &str {
                "Gadget"
            }
        }
        interp.new_instance(Rc::new(Gadget), Id(2)).unwrap();

        let mut s = Stream::new();
        s.begin(Command::Invoke).arg(Id(2)).arg("SetValue").arg(1_i32).end();
        let err = interp.process_stream(&s).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoCommandFunction("Gadget".into()));
        assert_eq!(
            interp.last_result().error_text(),
            Some("Wrapper function not found for class \"Gadget\".")
        );

        // A non-object target.
        let mut reply = Stream::new();
        reply.begin(Command::Reply).arg(5_i32).end();
        interp.register(Id(3), reply).unwrap();
        s.reset();
        s.begin(Command::Invoke).arg(Id(3)).arg("SetValue").end();
        assert_eq!(
            interp.process_stream(&s).unwrap_err().kind,
            ErrorKind::NotAnObject
        );

        // Id 0 is a null object.
        s.reset();
        s.begin(Command::Invoke).arg(Id::NULL).arg("SetValue").end();
        assert_eq!(
            interp.process_stream(&s).unwrap_err().kind,
            ErrorKind::NotAnObject
        );
    }

    #[test]
    fn dispatch_errors_are_described() {
        let (mut interp, _) = widget_interpreter();
        interp.new_instance(Rc::new(Widget::default()), Id(1)).unwrap();

        let mut s = Stream::new();
        s.begin(Command::Invoke).arg(Id(1)).arg("Explode").end();
        let err = interp.process_stream(&s).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Dispatch {
                class: "Widget".into(),
                method: "Explode".into(),
                source: DispatchError::UnknownMethod,
            }
        );
        assert_eq!(
            interp.last_result().error_text(),
            Some("Method \"Explode\" of class \"Widget\" failed: no such method.")
        );

        s.reset();
        s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg("x").end();
        assert!(matches!(
            interp.process_stream(&s).unwrap_err().kind,
            ErrorKind::Dispatch {
                source: DispatchError::BadArgument { index: 0 },
                ..
            }
        ));
    }

    #[test]
    fn partial_failure_keeps_earlier_effects() {
        let (mut interp, calls) = widget_interpreter();
        let mut s = Stream::new();
        s.begin(Command::New).arg("Widget").arg(Id(1)).end();
        s.begin(Command::Delete).arg(Id(9)).end();
        s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(5_i32).end();

        let err = interp.process_stream(&s).unwrap_err();
        assert_eq!(err.message, 1);
        assert_eq!(err.kind, ErrorKind::IdNotFound(Id(9)));
        assert!(interp.object_from_id(Id(1)).is_some());
        assert!(calls.borrow().is_empty());
        assert_eq!(value_of(&interp, 1), 0);
    }

    #[test]
    fn assign_aliases_expanded_values() {
        let (mut interp, calls) = widget_interpreter();
        let mut s = Stream::new();
        s.begin(Command::New).arg("Widget").arg(Id(1)).end();
        s.begin(Command::Assign)
            .arg(Id(5))
            .arg(1_i32)
            .arg("two")
            .arg(3.0_f64)
            .end();
        s.begin(Command::Invoke).arg(Id(1)).arg("Echo").arg(Id(5)).end();
        interp.process_stream(&s).unwrap();

        assert_eq!(*calls.borrow(), [(String::from("Echo"), 3)]);
        let r = interp.last_result();
        assert_eq!(r.get::<i32>(0, 0), Some(1));
        assert_eq!(r.str_argument(0, 1), Some("two"));
        assert_eq!(r.get::<f64>(0, 2), Some(3.0));
        assert_eq!(r.argument_count(0), Some(3));

        let stored = interp.message_from_id(Id(5)).unwrap();
        assert_eq!(stored.command(0), Some(Command::Reply));
        assert_eq!(stored.argument_count(0), Some(3));

        // The id is checked before anything is expanded.
        s.reset();
        s.begin(Command::Assign).arg(Id(5)).arg(Id(77)).end();
        assert_eq!(
            interp.process_stream(&s).unwrap_err().kind,
            ErrorKind::IdInUse(Id(5))
        );
        s.reset();
        s.begin(Command::Assign).arg(7_i32).end();
        assert!(matches!(
            interp.process_stream(&s).unwrap_err().kind,
            ErrorKind::BadArgument { index: 0, .. }
        ));
    }

    #[test]
    fn id_expansion_is_one_level_deep() {
        let (mut interp, _) = widget_interpreter();
        let mut s = Stream::new();
        s.begin(Command::New).arg("Widget").arg(Id(1)).end();
        s.begin(Command::Assign).arg(Id(2)).arg(10_i32).end();
        // Id 3 stores the literal id 2; expanding id 3 must not chase it.
        s.begin(Command::Assign).arg(Id(3)).arg(Argument::Id(Id(2))).end();
        interp.process_stream(&s).unwrap();
        // Assign expanded its own argument list, so id 3 already holds 10.
        assert_eq!(interp.message_from_id(Id(3)).unwrap().get::<i32>(0, 0), Some(10));

        // Store an unexpanded id directly and reference it: it is spliced in as-is.
        let mut reply = Stream::new();
        reply.begin(Command::Reply).arg(Id(2)).end();
        interp.register(Id(4), reply).unwrap();
        s.reset();
        s.begin(Command::Invoke).arg(Id(1)).arg("Echo").arg(Id(4)).end();
        interp.process_stream(&s).unwrap();
        assert_eq!(interp.last_result().get::<Id>(0, 0), Some(Id(2)));
    }

    #[test]
    fn last_result_is_read_at_expansion_time() {
        let (mut interp, _) = widget_interpreter();
        let mut s = Stream::new();
        s.begin(Command::New).arg("Widget").arg(Id(1)).end();
        s.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(8_i32).end();
        s.begin(Command::Invoke).arg(Id(1)).arg("GetValue").end();
        s.begin(Command::Invoke)
            .arg(Id(1))
            .arg("SetValue")
            .last_result()
            .end();
        s.begin(Command::Invoke).arg(Id(1)).arg("Echo").last_result().end();
        interp.process_stream(&s).unwrap();
        assert_eq!(value_of(&interp, 1), 8);
        // The SetValue reply was empty, so Echo saw nothing.
        assert_eq!(interp.last_result().argument_count(0), Some(0));

        // The first message of New's result is the object itself.
        s.reset();
        s.begin(Command::New).arg("Widget").arg(Id(2)).end();
        s.begin(Command::Invoke).last_result().arg("SetValue").arg(3_i32).end();
        interp.process_stream(&s).unwrap();
        assert_eq!(value_of(&interp, 2), 3);
    }

    #[test]
    fn nested_streams_run_in_their_own_scope() {
        let (mut interp, _) = widget_interpreter();
        let mut setup = Stream::new();
        setup.begin(Command::New).arg("Widget").arg(Id(1)).end();
        setup.begin(Command::Invoke).arg(Id(1)).arg("SetValue").arg(6_i32).end();
        interp.process_stream(&setup).unwrap();

        let mut inner = Stream::new();
        inner.begin(Command::Invoke).arg(Id(1)).arg("GetValue").end();

        let mut s = Stream::new();
        s.begin(Command::Assign).arg(Id(7)).arg(99_i32).end();
        s.begin(Command::Invoke)
            .arg(Id(1))
            .arg("Echo")
            .arg(&inner)
            .last_result()
            .end();
        interp.process_stream(&s).unwrap();

        // The nested stream's result was spliced first; the outer last result (from the first
        // message) was back in place for the marker that followed it.
        let r = interp.last_result();
        assert_eq!(r.get::<i32>(0, 0), Some(6));
        assert_eq!(r.get::<i32>(0, 1), Some(99));
        assert_eq!(r.argument_count(0), Some(2));
        assert_eq!(interp.depth, 0);
    }

    #[test]
    fn nested_failures_surface_and_restore_scope() {
        struct Errors(Rc<RefCell<Vec<String>>>);
        impl InterpreterObserver for Errors {
            fn error(&mut self, info: &ErrorInfo) {
                self.0.borrow_mut().push(info.text.clone());
            }
        }

        let (mut interp, _) = widget_interpreter();
        let seen = Rc::new(RefCell::new(Vec::new()));
        interp.add_observer(Box::new(Errors(seen.clone())));

        let mut inner = Stream::new();
        inner.begin(Command::Delete).arg(Id(40)).end();
        let mut s = Stream::new();
        s.begin(Command::New).arg("Widget").arg(Id(1)).end();
        s.begin(Command::Invoke).arg(Id(1)).arg("Echo").arg(&inner).end();

        let err = interp.process_stream(&s).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::SubStreamFailed("Attempt to use ID 40 which does not exist.".into())
        );
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(interp.depth, 0);
        assert_eq!(
            interp.last_result().error_text(),
            Some("Nested stream failed: Attempt to use ID 40 which does not exist.")
        );
    }

    #[test]
    fn nesting_depth_is_limited() {
        let mut interp = Interpreter::with_limits(Limits {
            max_stream_depth: 2,
        });

        let mut s = Stream::new();
        s.begin(Command::Assign).arg(Id(9)).arg(1_i32).end();
        for raw in 10..13 {
            let mut outer = Stream::new();
            outer.begin(Command::Assign).arg(Id(raw)).arg(s).end();
            s = outer;
        }
        let err = interp.process_stream(&s).unwrap_err();
        assert!(
            matches!(&err.kind, ErrorKind::SubStreamFailed(text) if text.ends_with("depth limit of 2.")),
            "{err}"
        );
        assert_eq!(interp.depth, 0);
        assert_eq!(interp.id_count(), 0);
    }

    #[test]
    fn message_log_records_messages_and_results() {
        #[derive(Clone, Default)]
        struct Shared(Rc<RefCell<Vec<u8>>>);
        impl std::io::Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let (mut interp, _) = widget_interpreter();
        let sink = Shared::default();
        interp.set_log_writer(Some(Box::new(sink.clone())));

        let mut s = Stream::new();
        s.begin(Command::Delete).arg(Id(3)).end();
        assert!(interp.process_stream(&s).is_err());

        let text = String::from_utf8(sink.0.borrow().clone()).unwrap();
        assert!(text.starts_with("Processing message 0:\nMessage 0 = Delete\n"), "{text}");
        assert!(text.contains("Result:\nMessage 0 = Error\n"), "{text}");
    }
}
