//! In-memory store of discovered contract methods.
//!
//! The [`MethodRepository`] is the shared mutable state of a workspace. Readers
//! take a cheap [`Arc`] snapshot of the whole set and never block writers for
//! longer than the pointer copy. Every mutation (full-scan swap, class
//! replacement, single inserts) runs under the same write lock and is applied
//! copy-on-write, so a reader sees either the complete old set or the complete
//! new one.
//!
//! # Examples
//!
//! ```
//! use rpcfinder::{MethodRecord, MethodRepository};
//!
//! let repo = MethodRepository::new();
//! repo.insert(MethodRecord::new("getUser", "acme.UserServiceImpl", "UserServiceImpl.java", 42));
//! repo.insert(MethodRecord::new("getUser", "acme.UserServiceImpl", "UserServiceImpl.java", 42));
//! assert_eq!(repo.len(), 1);
//!
//! let removed = repo.remove_class("acme.UserServiceImpl");
//! assert_eq!(removed, 1);
//! assert!(repo.is_empty());
//! ```

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::MethodRecord;

/// Immutable view of the repository at one point in time.
pub type Snapshot = Arc<HashSet<MethodRecord>>;

#[derive(Debug, Default)]
pub struct MethodRepository {
    current: RwLock<Snapshot>,
}

impl MethodRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents. Later mutations do not affect the returned snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// All records in no particular order.
    pub fn list_all(&self) -> Vec<MethodRecord> {
        self.snapshot().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn contains(&self, record: &MethodRecord) -> bool {
        self.snapshot().contains(record)
    }

    /// Records owned by the given qualified class name.
    pub fn methods_of_class(&self, class_name: &str) -> Vec<MethodRecord> {
        self.snapshot()
            .iter()
            .filter(|r| r.class_name == class_name)
            .cloned()
            .collect()
    }

    /// Look up a live record by `(class_name, method_name)`.
    ///
    /// Overloads share a name, so the one with the lowest offset wins.
    pub fn find(&self, class_name: &str, method_name: &str) -> Option<MethodRecord> {
        self.snapshot()
            .iter()
            .filter(|r| r.class_name == class_name && r.method_name == method_name)
            .min_by_key(|r| r.text_offset)
            .cloned()
    }

    /// Insert one record. Returns `false` if an identical record was present.
    pub fn insert(&self, record: MethodRecord) -> bool {
        self.mutate(|set| set.insert(record))
    }

    /// Insert many records, returning how many were new.
    pub fn extend<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = MethodRecord>,
    {
        self.mutate(|set| records.into_iter().filter(|r| set.insert(r.clone())).count())
    }

    /// Remove every record whose class matches `class_name`.
    pub fn remove_class(&self, class_name: &str) -> usize {
        self.mutate(|set| {
            let before = set.len();
            set.retain(|r| r.class_name != class_name);
            before - set.len()
        })
    }

    /// Remove a class's records and insert `records` as one atomic step.
    ///
    /// Returns `(removed, inserted)`. Readers never observe the class with
    /// its old records gone and the new ones missing.
    pub fn replace_class<I>(&self, class_name: &str, records: I) -> (usize, usize)
    where
        I: IntoIterator<Item = MethodRecord>,
    {
        self.mutate(|set| {
            let before = set.len();
            set.retain(|r| r.class_name != class_name);
            let removed = before - set.len();
            let inserted = records.into_iter().filter(|r| set.insert(r.clone())).count();
            (removed, inserted)
        })
    }

    /// Swap in a complete new set, returning the size of the old one.
    pub fn replace_all(&self, records: HashSet<MethodRecord>) -> usize {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = current.len();
        *current = Arc::new(records);
        previous
    }

    pub fn clear(&self) {
        self.replace_all(HashSet::new());
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut HashSet<MethodRecord>) -> R) -> R {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // Clones only when a reader still holds the previous snapshot
        f(Arc::make_mut(&mut current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(method: &str, class: &str) -> MethodRecord {
        MethodRecord::new(method, class, format!("src/{class}.java"), 10)
    }

    #[test]
    fn test_insert_is_idempotent() {
        let repo = MethodRepository::new();
        assert!(repo.insert(record("a", "C")));
        assert!(!repo.insert(record("a", "C")));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_extend_counts_new_records() {
        let repo = MethodRepository::new();
        repo.insert(record("a", "C"));
        let added = repo.extend([record("a", "C"), record("b", "C"), record("b", "C")]);
        assert_eq!(added, 1);
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_remove_class_only_touches_that_class() {
        let repo = MethodRepository::new();
        repo.extend([record("a", "C"), record("b", "C"), record("a", "D")]);

        assert_eq!(repo.remove_class("C"), 2);
        assert_eq!(repo.list_all(), vec![record("a", "D")]);
        assert_eq!(repo.remove_class("missing"), 0);
    }

    #[test]
    fn test_replace_class() {
        let repo = MethodRepository::new();
        repo.extend([record("a", "C"), record("b", "C"), record("x", "D")]);

        let (removed, inserted) = repo.replace_class("C", [record("c", "C")]);
        assert_eq!((removed, inserted), (2, 1));
        assert_eq!(repo.methods_of_class("C"), vec![record("c", "C")]);
        assert_eq!(repo.methods_of_class("D").len(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let repo = MethodRepository::new();
        repo.insert(record("a", "C"));
        let before = repo.snapshot();

        repo.insert(record("b", "C"));
        repo.remove_class("C");

        assert_eq!(before.len(), 1);
        assert!(repo.is_empty());
    }

    #[test]
    fn test_replace_all_and_clear() {
        let repo = MethodRepository::new();
        repo.insert(record("a", "C"));

        let next: HashSet<_> = [record("x", "X"), record("y", "Y")].into_iter().collect();
        assert_eq!(repo.replace_all(next), 1);
        assert_eq!(repo.len(), 2);

        repo.clear();
        assert!(repo.is_empty());
        assert!(repo.list_all().is_empty());
    }

    #[test]
    fn test_find_prefers_first_overload() {
        let repo = MethodRepository::new();
        repo.insert(MethodRecord::new("get", "C", "C.java", 90));
        repo.insert(MethodRecord::new("get", "C", "C.java", 30));

        let found = repo.find("C", "get").unwrap();
        assert_eq!(found.text_offset, 30);
        assert!(repo.find("C", "put").is_none());
    }
}
