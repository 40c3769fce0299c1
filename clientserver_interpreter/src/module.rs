// Copyright 2026 the ClientServer Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Module loading.
//!
//! A module is a shared library exporting `<name>_Initialize`, a [`ModuleInitializer`] that
//! registers the module's classes with the interpreter it is handed. Loaded libraries stay mapped
//! until the interpreter is dropped, after every registered object and function has been released.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::string::String;
use std::vec::Vec;

use libloading::Library;

use crate::interpreter::Interpreter;

/// Entry point a module exports as `<name>_Initialize`.
pub type ModuleInitializer = unsafe extern "C" fn(*mut Interpreter);

/// Environment variables consulted after the explicit and configured search paths.
const LIBRARY_PATH_VARIABLES: [&str; 3] = ["LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH", "PATH"];

/// Failure to load a module. None of these affect the interpreter's state.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// No library file for the module was found.
    #[error("module \"{module}\" not found (searched: {})", display_paths(searched))]
    NotFound {
        /// Module name.
        module: String,
        /// Directories searched, in order.
        searched: Vec<PathBuf>,
    },
    /// A library file was found but could not be loaded.
    #[error("failed to load {}", path.display())]
    Open {
        /// The library file.
        path: PathBuf,
        /// The loader's error.
        source: libloading::Error,
    },
    /// The library does not export the initializer.
    #[error("module \"{module}\" does not export {symbol}")]
    MissingInitializer {
        /// Module name.
        module: String,
        /// The symbol looked up.
        symbol: String,
    },
}

pub(crate) struct LoadedModule {
    name: String,
    // `None` for modules initialized in-process.
    library: Option<Library>,
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("dynamic", &self.library.is_some())
            .finish()
    }
}

fn library_path_directories() -> Vec<PathBuf> {
    LIBRARY_PATH_VARIABLES
        .iter()
        .filter_map(env::var_os)
        .flat_map(|value| env::split_paths(&value).collect::<Vec<_>>())
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect()
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no directories".into();
    }
    let shown: Vec<_> = paths.iter().map(|p| p.display().to_string()).collect();
    shown.join(", ")
}

fn initializer_symbol(name: &str) -> String {
    format!("{name}_Initialize")
}

impl Interpreter {
    /// Loads module `name` from the configured search paths.
    ///
    /// See [`load_with_paths`](Self::load_with_paths).
    pub fn load(&mut self, name: &str) -> Result<(), LoadError> {
        self.load_with_paths(name, &[])
    }

    /// Loads module `name` and runs its initializer.
    ///
    /// Directories are searched in this order: `paths`, the paths added with
    /// [`add_search_path`](Self::add_search_path), then `LD_LIBRARY_PATH`, `DYLD_LIBRARY_PATH` and
    /// `PATH`. If no directory holds the library, the platform loader's default search is tried.
    ///
    /// Loading a module that is already loaded does nothing.
    pub fn load_with_paths(&mut self, name: &str, paths: &[PathBuf]) -> Result<(), LoadError> {
        if self.is_module_loaded(name) {
            tracing::debug!(module = name, "module already loaded");
            return Ok(());
        }
        let result = self.open_and_initialize(name, paths);
        match &result {
            Ok(()) => tracing::info!(module = name, "loaded module"),
            Err(LoadError::NotFound { searched, .. }) => {
                tracing::error!(module = name, ?searched, "module not found");
            }
            Err(e) => tracing::error!(module = name, error = %e, "module load failed"),
        }
        result
    }

    fn open_and_initialize(&mut self, name: &str, paths: &[PathBuf]) -> Result<(), LoadError> {
        let file_name: OsString = libloading::library_filename(name);
        let searched: Vec<PathBuf> = paths
            .iter()
            .chain(&self.search_paths)
            .cloned()
            .chain(library_path_directories())
            .collect();

        let found = searched
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file());

        let library = match found {
            // SAFETY: loading a library runs its static initializers; modules are trusted code.
            Some(path) => unsafe { Library::new(&path) }
                .map_err(|source| LoadError::Open { path, source })?,
            None => {
                let bare = Path::new(&file_name);
                // SAFETY: as above.
                unsafe { Library::new(bare) }.map_err(|e| {
                    tracing::debug!(error = %e, "default library search failed");
                    LoadError::NotFound {
                        module: name.into(),
                        searched,
                    }
                })?
            }
        };

        let symbol = initializer_symbol(name);
        // SAFETY: the module contract fixes the initializer's signature.
        let initialize: ModuleInitializer = unsafe {
            library
                .get::<ModuleInitializer>(symbol.as_bytes())
                .map(|s| *s)
                .map_err(|_| LoadError::MissingInitializer {
                    module: name.into(),
                    symbol: symbol.clone(),
                })?
        };

        // SAFETY: `initialize` was resolved from `library`, which `attach` keeps mapped.
        unsafe { self.attach(name, Some(library), initialize) };
        Ok(())
    }

    /// Records module `name` and runs its initializer on `self`.
    ///
    /// # Safety
    ///
    /// `initialize` must follow the [`ModuleInitializer`] contract. If it lives in a shared
    /// library, `library` must be that library.
    unsafe fn attach(
        &mut self,
        name: &str,
        library: Option<Library>,
        initialize: ModuleInitializer,
    ) {
        // Keep the library mapped before running code from it.
        self.modules.push(LoadedModule {
            name: name.into(),
            library,
        });
        // SAFETY: `self` is a live, exclusively borrowed interpreter for the whole call; the
        // caller guarantees the initializer contract.
        unsafe { initialize(self as *mut Self) };
    }

    /// Runs an in-process module initializer with the same bookkeeping as [`load`](Self::load).
    ///
    /// Returns `false` without calling `init` if a module with this name is already loaded.
    pub fn initialize_module(&mut self, name: &str, init: impl FnOnce(&mut Self)) -> bool {
        if self.is_module_loaded(name) {
            return false;
        }
        self.modules.push(LoadedModule {
            name: name.into(),
            library: None,
        });
        init(self);
        tracing::info!(module = name, "initialized module");
        true
    }

    /// Returns `true` if a module named `name` has been loaded or initialized.
    #[must_use]
    pub fn is_module_loaded(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.name == name)
    }

    /// Names of loaded modules, in load order.
    pub fn loaded_modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }
}
