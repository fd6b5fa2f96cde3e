//! A programmable in-memory symbol provider.
//!
//! Useful for embedding the index behind an existing symbol source that is
//! easier to copy into a table than to wrap, and for exercising scan and
//! change handling without parsing anything. Clones share the same table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::{ClassHandle, Lookup, MethodHandle, NotReady, SymbolProvider};

#[derive(Debug, Clone)]
struct Entry {
    file: PathBuf,
    is_interface: bool,
    tags: Vec<String>,
    interfaces: Vec<String>,
    methods: Vec<MethodHandle>,
}

#[derive(Debug)]
struct Table {
    types: BTreeMap<String, Entry>,
    ready: bool,
    /// Queries left before the provider starts answering `NotReady`
    budget: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    inner: Arc<Mutex<Table>>,
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn simple_name(qualified: &str) -> &str {
    qualified.rsplit('.').next().unwrap_or(qualified)
}

impl InMemoryProvider {
    /// An empty, ready provider.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Table {
                types: BTreeMap::new(),
                ready: true,
                budget: None,
            })),
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, Table> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Declare an interface with its marker annotations and method names.
    pub fn add_interface(&self, qualified: &str, file: impl Into<PathBuf>, tags: &[&str], methods: &[&str]) {
        let file = file.into();
        let methods = methods
            .iter()
            .enumerate()
            .map(|(i, name)| MethodHandle::new(*name, false, file.clone(), i))
            .collect();
        self.table().types.insert(
            qualified.to_string(),
            Entry {
                file,
                is_interface: true,
                tags: tags.iter().map(|t| t.to_string()).collect(),
                interfaces: Vec::new(),
                methods,
            },
        );
    }

    /// Declare a class implementing the given (qualified) interfaces.
    pub fn add_class(&self, qualified: &str, file: impl Into<PathBuf>, interfaces: &[&str]) {
        self.table().types.insert(
            qualified.to_string(),
            Entry {
                file: file.into(),
                is_interface: false,
                tags: Vec::new(),
                interfaces: interfaces.iter().map(|i| i.to_string()).collect(),
                methods: Vec::new(),
            },
        );
    }

    /// Add a method to a previously declared type. Unknown types are ignored.
    pub fn add_method(&self, qualified: &str, name: &str, is_override: bool, offset: usize) {
        if let Some(entry) = self.table().types.get_mut(qualified) {
            let method = MethodHandle::new(name, is_override, entry.file.clone(), offset);
            entry.methods.push(method);
        }
    }

    pub fn remove_type(&self, qualified: &str) -> bool {
        self.table().types.remove(qualified).is_some()
    }

    /// Toggle readiness. Becoming ready also clears any [`fail_after`] budget.
    ///
    /// [`fail_after`]: InMemoryProvider::fail_after
    pub fn set_ready(&self, ready: bool) {
        let mut table = self.table();
        table.ready = ready;
        if ready {
            table.budget = None;
        }
    }

    /// Answer `queries` more structural queries, then become not ready.
    pub fn fail_after(&self, queries: usize) {
        self.table().budget = Some(queries);
    }

    /// Count one query against the budget and run `f` if still ready.
    fn query<T>(&self, f: impl FnOnce(&Table) -> T) -> Lookup<T> {
        let mut table = self.table();
        let result = match table.budget {
            Some(0) => {
                table.ready = false;
                Err(NotReady)
            }
            Some(left) => {
                table.budget = Some(left - 1);
                Ok(())
            }
            None if table.ready => Ok(()),
            None => Err(NotReady),
        };
        result.map(|()| f(&*table)).into()
    }
}

impl Table {
    fn handle(&self, qualified: &str) -> Option<ClassHandle> {
        let entry = self.types.get(qualified)?;
        Some(ClassHandle::new(
            simple_name(qualified),
            Some(qualified.to_string()),
            Some(entry.file.clone()),
        ))
    }

    fn entry(&self, class: &ClassHandle) -> Option<&Entry> {
        self.types.get(class.qualified_name.as_deref()?)
    }
}

impl SymbolProvider for InMemoryProvider {
    fn is_ready(&self) -> bool {
        self.table().ready
    }

    fn all_candidate_class_names(&self) -> Lookup<Vec<String>> {
        self.query(|t| t.types.keys().map(|q| simple_name(q).to_string()).collect())
    }

    fn classes_named(&self, name: &str) -> Lookup<Vec<ClassHandle>> {
        self.query(|t| {
            t.types
                .keys()
                .filter(|q| simple_name(q) == name)
                .filter_map(|q| t.handle(q))
                .collect()
        })
    }

    fn classes_in_file(&self, path: &Path) -> Lookup<Vec<ClassHandle>> {
        self.query(|t| {
            t.types
                .iter()
                .filter(|(_, e)| e.file == path)
                .filter_map(|(q, _)| t.handle(q))
                .collect()
        })
    }

    fn interfaces_of(&self, class: &ClassHandle) -> Lookup<Vec<ClassHandle>> {
        self.query(|t| {
            t.entry(class)
                .map(|e| {
                    e.interfaces
                        .iter()
                        .filter(|i| t.types.get(*i).is_some_and(|e| e.is_interface))
                        .filter_map(|i| t.handle(i))
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    fn has_tag(&self, class: &ClassHandle, tag: &str) -> Lookup<bool> {
        self.query(|t| {
            t.entry(class)
                .is_some_and(|e| e.tags.iter().any(|a| a == tag || simple_name(a) == simple_name(tag)))
        })
    }

    fn methods_of(&self, class: &ClassHandle) -> Lookup<Vec<MethodHandle>> {
        self.query(|t| t.entry(class).map(|e| e.methods.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_file() {
        let provider = InMemoryProvider::new();
        provider.add_interface("a.Api", "/r/Api.java", &["BaijiContract"], &["call"]);
        provider.add_class("b.Impl", "/r/Impl.java", &["a.Api", "missing.Other"]);
        provider.add_method("b.Impl", "call", true, 7);

        let impls = provider.classes_named("Impl").ready().unwrap();
        assert_eq!(impls.len(), 1);
        assert_eq!(impls[0].qualified_name.as_deref(), Some("b.Impl"));

        let ifaces = provider.interfaces_of(&impls[0]).ready().unwrap();
        assert_eq!(ifaces.len(), 1);
        assert_eq!(provider.has_tag(&ifaces[0], "BaijiContract"), Lookup::Ready(true));

        let in_file = provider.classes_in_file(Path::new("/r/Impl.java")).ready().unwrap();
        assert_eq!(in_file, impls);
    }

    #[test]
    fn test_fail_after_budget() {
        let provider = InMemoryProvider::new();
        provider.fail_after(1);

        assert!(provider.all_candidate_class_names().is_ready());
        assert!(!provider.all_candidate_class_names().is_ready());
        assert!(!provider.is_ready());

        provider.set_ready(true);
        assert!(provider.all_candidate_class_names().is_ready());
    }

    #[test]
    fn test_clones_share_state() {
        let provider = InMemoryProvider::new();
        let other = provider.clone();
        other.set_ready(false);
        assert!(!provider.is_ready());
    }
}
