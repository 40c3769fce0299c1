// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::boxed::Box;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::vec::Vec;

use clientserver_stream::{Id, Stream};
use hashbrown::HashMap;

use crate::dispatch::{CommandFunction, NewInstanceFunction};
use crate::module::LoadedModule;
use crate::observer::{InterpreterObserver, ObserverId};

/// Processing limits for an [`Interpreter`].
#[derive(Clone, Debug)]
pub struct Limits {
    /// Maximum nesting of `stream_value` arguments processed recursively.
    pub max_stream_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_stream_depth: 64,
        }
    }
}

/// Executes streams against a registry of identified results and per-class function tables.
///
/// An interpreter is single-threaded and long-lived: its registry and tables persist until it is
/// dropped. Every registered object is released before any loaded module is unloaded.
pub struct Interpreter {
    pub(crate) last_result: Stream,
    pub(crate) ids: BTreeMap<Id, Stream>,
    pub(crate) next_id: u64,
    pub(crate) new_instance_functions: HashMap<Box<str>, NewInstanceFunction>,
    pub(crate) command_functions: HashMap<Box<str>, CommandFunction>,
    pub(crate) observers: Vec<(ObserverId, Box<dyn InterpreterObserver>)>,
    pub(crate) next_observer: u64,
    pub(crate) log: Option<Box<dyn io::Write>>,
    pub(crate) search_paths: Vec<PathBuf>,
    pub(crate) limits: Limits,
    /// Current `stream_value` recursion depth.
    pub(crate) depth: usize,
    // Dropped last: code behind registered closures and objects may live in these libraries.
    pub(crate) modules: Vec<LoadedModule>,
}

impl Interpreter {
    /// Creates an interpreter with default [`Limits`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Creates an interpreter with the given limits.
    #[must_use]
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            last_result: Stream::new(),
            ids: BTreeMap::new(),
            next_id: 1,
            new_instance_functions: HashMap::new(),
            command_functions: HashMap::new(),
            observers: Vec::new(),
            next_observer: 0,
            log: None,
            search_paths: Vec::new(),
            limits,
            depth: 0,
            modules: Vec::new(),
        }
    }

    /// Returns the configured limits.
    #[inline]
    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Returns the result of the most recently processed message.
    ///
    /// After a success this is a `Reply` (or empty, for `Delete`); after a failure it is an
    /// `Error` message whose first argument describes the failure.
    #[inline]
    #[must_use]
    pub fn last_result(&self) -> &Stream {
        &self.last_result
    }

    /// Empties the last result.
    pub fn clear_last_result(&mut self) {
        self.last_result.reset();
    }

    /// Sends a text transcript of every processed message and its result to `writer`.
    ///
    /// Pass `None` to stop logging.
    pub fn set_log_writer(&mut self, writer: Option<Box<dyn io::Write>>) {
        self.log = writer;
    }

    /// Appends a directory searched by [`load`](Self::load).
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// Returns the configured module search directories.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("ids", &self.ids.len())
            .field("next_id", &self.next_id)
            .field("classes", &self.new_instance_functions.len())
            .field("command_functions", &self.command_functions.len())
            .field("observers", &self.observers.len())
            .field("limits", &self.limits)
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        tracing::debug!(ids = self.ids.len(), "tearing down interpreter");
        self.ids.clear();
        self.last_result.reset();
        self.new_instance_functions.clear();
        self.command_functions.clear();
        self.observers.clear();
        self.log = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let interp = Interpreter::default();
        assert_eq!(interp.limits().max_stream_depth, 64);
        assert!(interp.last_result().is_empty());
        assert!(interp.search_paths().is_empty());
    }

    #[test]
    fn search_paths_accumulate_in_order() {
        let mut interp = Interpreter::new();
        interp.add_search_path("/opt/a");
        interp.add_search_path(PathBuf::from("/opt/b"));
        assert_eq!(
            interp.search_paths(),
            [PathBuf::from("/opt/a"), PathBuf::from("/opt/b")]
        );
    }
}
