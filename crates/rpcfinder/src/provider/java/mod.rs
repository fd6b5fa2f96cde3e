//! A [`SymbolProvider`] backed by a Java source tree.
//!
//! [`JavaSourceProvider`] walks the project with the same exclusions the index
//! uses, parses every source file with tree-sitter (in parallel), and answers
//! structural queries from the resulting symbol table. Until [`load`] has run
//! it reports [`Lookup::NotReady`], like an IDE that is still indexing.
//!
//! Interface references are resolved the way javac would for the common
//! cases: explicit single-type import, enclosing types and the same package,
//! on-demand imports, and finally a unique simple-name match anywhere in the
//! tree. References to types outside the tree stay unresolved.
//!
//! [`load`]: JavaSourceProvider::load

mod parser;

pub use parser::{parse_java, ParsedFile, ParsedMethod, ParsedType, TypeKind};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use rayon::prelude::*;

use super::{ClassHandle, Lookup, MethodHandle, SymbolProvider};
use crate::config::Config;
use crate::coordinator::{ChangeKind, FileChangeEvent};
use crate::scope::ProjectScope;
use crate::watch::find_source_files;
use crate::Result;

/// Position of one type declaration in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TypeRef {
    file: PathBuf,
    index: usize,
}

#[derive(Debug, Default)]
struct SymbolTable {
    files: HashMap<PathBuf, Arc<ParsedFile>>,
    by_qualified: HashMap<String, TypeRef>,
    by_simple: HashMap<String, Vec<TypeRef>>,
}

impl SymbolTable {
    fn from_files(files: impl IntoIterator<Item = (PathBuf, ParsedFile)>) -> Self {
        let mut table = Self {
            files: files.into_iter().map(|(path, parsed)| (path, Arc::new(parsed))).collect(),
            ..Self::default()
        };
        table.reindex();
        table
    }

    fn reindex(&mut self) {
        self.by_qualified.clear();
        self.by_simple.clear();

        for (path, parsed) in &self.files {
            for (index, ty) in parsed.types.iter().enumerate() {
                let type_ref = TypeRef {
                    file: path.clone(),
                    index,
                };
                self.by_qualified.insert(ty.qualified.clone(), type_ref.clone());
                self.by_simple.entry(ty.name.clone()).or_default().push(type_ref);
            }
        }
    }

    fn get(&self, type_ref: &TypeRef) -> Option<(&Path, &ParsedFile, &ParsedType)> {
        let (path, parsed) = self.files.get_key_value(&type_ref.file)?;
        let ty = parsed.types.get(type_ref.index)?;
        Some((path.as_path(), parsed, ty))
    }

    fn handle(&self, type_ref: &TypeRef) -> Option<ClassHandle> {
        let (path, _, ty) = self.get(type_ref)?;
        Some(ClassHandle::new(
            ty.name.clone(),
            Some(ty.qualified.clone()),
            Some(path.to_path_buf()),
        ))
    }

    /// Map a handle back onto the table.
    fn locate(&self, class: &ClassHandle) -> Option<TypeRef> {
        if let Some(qualified) = &class.qualified_name {
            return self.by_qualified.get(qualified).cloned();
        }
        self.by_simple
            .get(&class.name)?
            .iter()
            .find(|r| class.file.as_deref().map_or(true, |f| f == r.file))
            .cloned()
    }

    /// Resolve an interface reference written inside `owner`.
    fn resolve_reference(&self, owner: &TypeRef, written: &str) -> Option<TypeRef> {
        let (_, file, ty) = self.get(owner)?;

        if written.contains('.') {
            return self.by_qualified.get(written).cloned();
        }

        let explicit = file
            .imports
            .iter()
            .filter(|i| !i.ends_with(".*"))
            .find(|i| i.rsplit('.').next() == Some(written));
        if let Some(found) = explicit.and_then(|i| self.by_qualified.get(i)) {
            return Some(found.clone());
        }

        // Enclosing types first, then the package itself
        let mut scope = ty.qualified.as_str();
        while let Some((outer, _)) = scope.rsplit_once('.') {
            if let Some(found) = self.by_qualified.get(&format!("{}.{}", outer, written)) {
                return Some(found.clone());
            }
            scope = outer;
        }
        if file.package.is_none() {
            if let Some(found) = self.by_qualified.get(written) {
                return Some(found.clone());
            }
        }

        for import in file.imports.iter().filter_map(|i| i.strip_suffix(".*")) {
            if let Some(found) = self.by_qualified.get(&format!("{}.{}", import, written)) {
                return Some(found.clone());
            }
        }

        let interfaces: Vec<_> = self
            .by_simple
            .get(written)?
            .iter()
            .filter(|r| self.get(r).is_some_and(|(_, _, t)| t.kind == TypeKind::Interface))
            .collect();
        match interfaces.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        }
    }
}

/// Symbol provider over the Java sources of one project.
pub struct JavaSourceProvider {
    config: Config,
    scope: ProjectScope,
    table: RwLock<Option<SymbolTable>>,
}

impl std::fmt::Debug for JavaSourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JavaSourceProvider")
            .field("root", &self.scope.root())
            .field("loaded", &SymbolProvider::is_ready(self))
            .finish()
    }
}

impl JavaSourceProvider {
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            scope: ProjectScope::new(&root, &config),
            config,
            table: RwLock::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        self.scope.root()
    }

    /// Walk and parse the whole tree, replacing any previous table.
    ///
    /// Returns the number of files parsed. Unreadable files are skipped with
    /// a warning.
    pub fn load(&self) -> Result<usize> {
        let start = Instant::now();
        let files = find_source_files(self.scope.root(), &self.config)?;

        let parsed: Vec<(PathBuf, ParsedFile)> = files
            .par_iter()
            .filter_map(|file| match std::fs::read_to_string(file) {
                Ok(source) => Some((file.clone(), parse_java(file, &source))),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", file.display(), e);
                    None
                }
            })
            .collect();

        let count = parsed.len();
        let table = SymbolTable::from_files(parsed);
        tracing::info!(
            "Parsed {} source files ({} types) in {:?}",
            count,
            table.by_qualified.len(),
            start.elapsed()
        );

        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Some(table);
        Ok(count)
    }

    /// Drop the table; every query answers `NotReady` until the next load.
    pub fn unload(&self) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of parsed files, zero when not loaded.
    pub fn file_count(&self) -> usize {
        self.read(|table| table.files.len()).ready().unwrap_or(0)
    }

    fn read<T>(&self, f: impl FnOnce(&SymbolTable) -> T) -> Lookup<T> {
        match self.table.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(table) => Lookup::Ready(f(table)),
            None => Lookup::NotReady,
        }
    }

    fn parse_file(&self, path: &Path) -> Option<ParsedFile> {
        if !self.scope.is_project_source(path) {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(source) => Some(parse_java(path, &source)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to re-read {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl SymbolProvider for JavaSourceProvider {
    fn is_ready(&self) -> bool {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn all_candidate_class_names(&self) -> Lookup<Vec<String>> {
        self.read(|table| table.by_simple.keys().cloned().collect())
    }

    fn classes_named(&self, name: &str) -> Lookup<Vec<ClassHandle>> {
        self.read(|table| {
            table
                .by_simple
                .get(name)
                .map(|refs| refs.iter().filter_map(|r| table.handle(r)).collect())
                .unwrap_or_default()
        })
    }

    fn classes_in_file(&self, path: &Path) -> Lookup<Vec<ClassHandle>> {
        self.read(|table| {
            (0..table.files.get(path).map_or(0, |parsed| parsed.types.len()))
                .filter_map(|index| {
                    table.handle(&TypeRef {
                        file: path.to_path_buf(),
                        index,
                    })
                })
                .collect()
        })
    }

    fn interfaces_of(&self, class: &ClassHandle) -> Lookup<Vec<ClassHandle>> {
        self.read(|table| {
            let Some(owner) = table.locate(class) else {
                return Vec::new();
            };
            let Some((_, _, ty)) = table.get(&owner) else {
                return Vec::new();
            };
            ty.interfaces
                .iter()
                .filter_map(|written| {
                    let resolved = table.resolve_reference(&owner, written);
                    if resolved.is_none() {
                        tracing::trace!("Unresolved interface {} on {}", written, ty.qualified);
                    }
                    resolved
                })
                .filter_map(|r| table.handle(&r))
                .collect()
        })
    }

    fn has_tag(&self, class: &ClassHandle, tag: &str) -> Lookup<bool> {
        self.read(|table| {
            table
                .locate(class)
                .and_then(|r| table.get(&r).map(|(_, _, ty)| ty.annotations.iter().any(|a| tag_matches(a, tag))))
                .unwrap_or(false)
        })
    }

    fn methods_of(&self, class: &ClassHandle) -> Lookup<Vec<MethodHandle>> {
        self.read(|table| {
            let Some((path, _, ty)) = table.locate(class).and_then(|r| {
                table.get(&r).map(|(p, f, t)| (p.to_path_buf(), f, t))
            }) else {
                return Vec::new();
            };
            ty.methods
                .iter()
                .map(|m| MethodHandle::new(m.name.clone(), m.is_override, path.clone(), m.offset))
                .collect()
        })
    }

    fn observe_changes(&self, events: &[FileChangeEvent]) {
        // Parse outside the lock, then apply in one write
        let mut updates: Vec<(PathBuf, Option<ParsedFile>)> = Vec::new();
        for event in events {
            match event.kind {
                ChangeKind::Content => updates.push((event.path.clone(), self.parse_file(&event.path))),
                ChangeKind::Delete => updates.push((event.path.clone(), None)),
                ChangeKind::Move => {
                    updates.push((event.path.clone(), None));
                    if let Some(dest) = &event.destination {
                        updates.push((dest.clone(), self.parse_file(dest)));
                    }
                }
            }
        }

        let mut guard = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let Some(table) = guard.as_mut() else {
            return;
        };
        for (path, parsed) in updates {
            match parsed {
                Some(parsed) => {
                    table.files.insert(path, Arc::new(parsed));
                }
                None => {
                    table.files.remove(&path);
                }
            }
        }
        table.reindex();
    }
}

/// Compare an annotation as written with the configured tag.
///
/// Simple names must agree; when both sides are qualified the full names must.
fn tag_matches(annotation: &str, tag: &str) -> bool {
    let simple = |s: &str| s.rsplit('.').next().unwrap_or(s).to_string();
    if annotation.contains('.') && tag.contains('.') {
        annotation == tag
    } else {
        simple(annotation) == simple(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONTRACT: &str = r#"
package com.acme.api;

import com.ctriposs.baiji.rpc.common.BaijiContract;

@BaijiContract(serviceName = "UserService", serviceNamespace = "http://acme.com/user")
public interface UserService {
    GetUserResponse getUser(GetUserRequest request) throws Exception;
    CheckHealthResponse checkHealth(CheckHealthRequest request) throws Exception;
}
"#;

    const IMPL: &str = r#"
package com.acme.user;

import com.acme.api.UserService;

public class UserServiceImpl implements UserService {
    @Override
    public GetUserResponse getUser(GetUserRequest request) { return null; }

    public CheckHealthResponse checkHealth(CheckHealthRequest request) { return null; }

    private void audit() {}
}
"#;

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn project() -> (TempDir, JavaSourceProvider) {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "api/src/com/acme/api/UserService.java", CONTRACT);
        write(dir.path(), "user/src/com/acme/user/UserServiceImpl.java", IMPL);
        let provider = JavaSourceProvider::new(dir.path(), Config::default());
        (dir, provider)
    }

    fn class(provider: &JavaSourceProvider, name: &str) -> ClassHandle {
        provider.classes_named(name).ready().unwrap().remove(0)
    }

    #[test]
    fn test_not_ready_until_loaded() {
        let (_dir, provider) = project();
        assert!(!provider.is_ready());
        assert_eq!(provider.all_candidate_class_names(), Lookup::NotReady);

        assert_eq!(provider.load().unwrap(), 2);
        assert!(provider.is_ready());

        provider.unload();
        assert!(!provider.classes_named("UserService").is_ready());
    }

    #[test]
    fn test_resolves_imported_contract() {
        let (_dir, provider) = project();
        provider.load().unwrap();

        let implementation = class(&provider, "UserServiceImpl");
        assert_eq!(implementation.qualified_name.as_deref(), Some("com.acme.user.UserServiceImpl"));

        let interfaces = provider.interfaces_of(&implementation).ready().unwrap();
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].qualified_name.as_deref(), Some("com.acme.api.UserService"));
        assert_eq!(provider.has_tag(&interfaces[0], "BaijiContract"), Lookup::Ready(true));
        assert_eq!(
            provider.has_tag(&interfaces[0], "com.ctriposs.baiji.rpc.common.BaijiContract"),
            Lookup::Ready(true)
        );
        assert_eq!(provider.has_tag(&implementation, "BaijiContract"), Lookup::Ready(false));
    }

    #[test]
    fn test_methods_carry_override_flag_and_offset() {
        let (dir, provider) = project();
        provider.load().unwrap();

        let methods = provider.methods_of(&class(&provider, "UserServiceImpl")).ready().unwrap();
        assert_eq!(methods.len(), 3);

        let get_user = methods.iter().find(|m| m.name == "getUser").unwrap();
        assert!(get_user.is_override);
        assert!(get_user.file.ends_with("UserServiceImpl.java"));

        let source = fs::read_to_string(dir.path().join("user/src/com/acme/user/UserServiceImpl.java")).unwrap();
        assert_eq!(&source[get_user.offset..get_user.offset + 7], "getUser");

        let check = methods.iter().find(|m| m.name == "checkHealth").unwrap();
        assert!(!check.is_override);
    }

    #[test]
    fn test_same_package_and_unique_name_resolution() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/p/Api.java", "package p; @BaijiContract interface Api { void call(); }");
        write(dir.path(), "src/p/Impl.java", "package p; class Impl implements Api { public void call() {} }");
        write(dir.path(), "src/q/Far.java", "package q; class Far implements Api { public void call() {} }");

        let provider = JavaSourceProvider::new(dir.path(), Config::default());
        provider.load().unwrap();

        let near = provider.interfaces_of(&class(&provider, "Impl")).ready().unwrap();
        assert_eq!(near[0].qualified_name.as_deref(), Some("p.Api"));

        // No import, different package: falls back to the only "Api" in the tree
        let far = provider.interfaces_of(&class(&provider, "Far")).ready().unwrap();
        assert_eq!(far[0].qualified_name.as_deref(), Some("p.Api"));
    }

    #[test]
    fn test_classes_in_file() {
        let (dir, provider) = project();
        provider.load().unwrap();

        let root = provider.root().to_path_buf();
        let path = root.join("user/src/com/acme/user/UserServiceImpl.java");
        let classes = provider.classes_in_file(&path).ready().unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "UserServiceImpl");

        let missing = provider.classes_in_file(&dir.path().join("Nope.java")).ready().unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn test_observe_changes_reparses_and_forgets() {
        let (_dir, provider) = project();
        provider.load().unwrap();
        let root = provider.root().to_path_buf();

        let path = root.join("user/src/com/acme/user/UserServiceImpl.java");
        fs::write(&path, IMPL.replace("UserServiceImpl", "AccountServiceImpl")).unwrap();
        provider.observe_changes(&[FileChangeEvent::content(&path)]);

        assert!(provider.classes_named("UserServiceImpl").ready().unwrap().is_empty());
        assert_eq!(provider.classes_named("AccountServiceImpl").ready().unwrap().len(), 1);

        fs::remove_file(&path).unwrap();
        provider.observe_changes(&[FileChangeEvent::delete(&path)]);
        assert_eq!(provider.file_count(), 1);
    }

    #[test]
    fn test_excluded_dirs_are_not_loaded() {
        let (dir, _) = project();
        write(dir.path(), "build/generated/Gen.java", "class Gen implements UserService {}");

        let provider = JavaSourceProvider::new(dir.path(), Config::default());
        assert_eq!(provider.load().unwrap(), 2);
        assert!(provider.classes_named("Gen").ready().unwrap().is_empty());
    }

    #[test]
    fn test_tag_matches() {
        assert!(tag_matches("BaijiContract", "BaijiContract"));
        assert!(tag_matches("com.x.BaijiContract", "BaijiContract"));
        assert!(tag_matches("BaijiContract", "com.x.BaijiContract"));
        assert!(!tag_matches("com.y.BaijiContract", "com.x.BaijiContract"));
        assert!(!tag_matches("Contract", "BaijiContract"));
    }
}
