//! The symbol provider capability consumed by the index.
//!
//! A [`SymbolProvider`] answers the structural questions a scan needs: which
//! classes exist, which interfaces they implement, which interfaces carry the
//! contract tag, and which methods a class declares. Providers are usually
//! backed by a compiler front-end or language server that has its own
//! indexing phase, so every query may answer [`Lookup::NotReady`] instead of
//! data. The index treats that as a transient condition and retries once the
//! provider signals readiness.
//!
//! Two providers ship with the crate:
//! - [`java::JavaSourceProvider`]: parses a Java source tree with tree-sitter
//! - [`memory::InMemoryProvider`]: a programmable table, for tests and embedders

use std::path::{Path, PathBuf};

use crate::coordinator::FileChangeEvent;

pub mod java;
pub mod memory;

pub use java::JavaSourceProvider;
pub use memory::InMemoryProvider;

/// Result of a provider query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Ready(T),
    /// The provider is (re)building its own index and cannot answer yet
    NotReady,
}

/// Marker for the not-ready branch once it is lifted into a `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotReady;

impl<T> Lookup<T> {
    /// Lift into a `Result` so callers can chain lookups with `?`.
    pub fn ready(self) -> Result<T, NotReady> {
        match self {
            Lookup::Ready(value) => Ok(value),
            Lookup::NotReady => Err(NotReady),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Ready(value) => Lookup::Ready(f(value)),
            Lookup::NotReady => Lookup::NotReady,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Lookup::Ready(_))
    }
}

impl<T> From<Result<T, NotReady>> for Lookup<T> {
    fn from(result: Result<T, NotReady>) -> Self {
        match result {
            Ok(value) => Lookup::Ready(value),
            Err(NotReady) => Lookup::NotReady,
        }
    }
}

/// A class (or interface) known to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassHandle {
    /// Simple name: "UserServiceImpl"
    pub name: String,
    /// Qualified name, absent for anonymous or local classes
    pub qualified_name: Option<String>,
    /// Declaring source file, absent for binary-only classes
    pub file: Option<PathBuf>,
}

impl ClassHandle {
    pub fn new(name: impl Into<String>, qualified_name: Option<String>, file: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            qualified_name,
            file,
        }
    }

    /// Qualified name, falling back to the simple name.
    pub fn display_name(&self) -> &str {
        self.qualified_name.as_deref().unwrap_or(&self.name)
    }
}

/// A method declared by a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodHandle {
    pub name: String,
    /// Explicitly marked as overriding an inherited declaration
    pub is_override: bool,
    /// File that contains the declaration
    pub file: PathBuf,
    /// Byte offset of the method name in `file`
    pub offset: usize,
}

impl MethodHandle {
    pub fn new(name: impl Into<String>, is_override: bool, file: impl Into<PathBuf>, offset: usize) -> Self {
        Self {
            name: name.into(),
            is_override,
            file: file.into(),
            offset,
        }
    }
}

/// Structural queries over the project's symbols.
pub trait SymbolProvider: Send + Sync {
    /// Whether the provider can currently answer structural queries.
    ///
    /// A running indexing thread polls this while the index waits on the
    /// provider and rescans as soon as it turns true.
    fn is_ready(&self) -> bool;

    /// Simple names of every class the provider knows about.
    fn all_candidate_class_names(&self) -> Lookup<Vec<String>>;

    /// Every class with the given simple name.
    fn classes_named(&self, name: &str) -> Lookup<Vec<ClassHandle>>;

    /// Classes declared in one source file (including nested classes).
    fn classes_in_file(&self, path: &Path) -> Lookup<Vec<ClassHandle>>;

    /// Interfaces directly implemented by `class`.
    fn interfaces_of(&self, class: &ClassHandle) -> Lookup<Vec<ClassHandle>>;

    /// Whether `class` carries the marker identified by `tag`.
    fn has_tag(&self, class: &ClassHandle, tag: &str) -> Lookup<bool>;

    /// Methods declared directly on `class`.
    fn methods_of(&self, class: &ClassHandle) -> Lookup<Vec<MethodHandle>>;

    /// Hook for file-backed providers to refresh before a change batch is
    /// classified. Providers fed by an IDE keep their own view current.
    fn observe_changes(&self, _events: &[FileChangeEvent]) {}
}
