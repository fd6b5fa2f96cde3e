//! Which files belong to the project.

use std::path::{Component, Path, PathBuf};

use crate::config::Config;

/// Marker that appears in paths pointing inside a packaged archive.
const ARCHIVE_SEPARATOR: &str = ".jar!";

/// The project-owned part of a source tree.
///
/// A path is in scope when it lies under the workspace root, is not inside a
/// packaged dependency, and no directory between the root and the file is an
/// excluded one (build output, IDE metadata, configured extras).
#[derive(Debug, Clone)]
pub struct ProjectScope {
    root: PathBuf,
    excluded: Vec<String>,
    extensions: Vec<String>,
}

impl ProjectScope {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            excluded: config.excluded_dirs().into_iter().map(str::to_string).collect(),
            extensions: config.source_extensions.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` has one of the configured source extensions.
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|s| s == ext))
            .unwrap_or(false)
    }

    /// Whether `path` is owned by the project (location only).
    pub fn contains(&self, path: &Path) -> bool {
        if path.to_string_lossy().contains(ARCHIVE_SEPARATOR) {
            return false;
        }

        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        // The file name itself is never treated as an excluded directory
        let mut dirs = relative.components().collect::<Vec<_>>();
        dirs.pop();

        !dirs.iter().any(|component| match component {
            Component::Normal(name) => name
                .to_str()
                .map(|name| self.excluded.iter().any(|ex| ex == name))
                .unwrap_or(false),
            Component::ParentDir => true,
            _ => false,
        })
    }

    /// Owned by the project and a source file.
    pub fn is_project_source(&self, path: &Path) -> bool {
        self.is_source_file(path) && self.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ProjectScope {
        let config = Config {
            exclude_dirs: vec!["generated".to_string()],
            ..Config::default()
        };
        ProjectScope::new(Path::new("/repo"), &config)
    }

    #[test]
    fn test_accepts_project_sources() {
        let scope = scope();
        assert!(scope.is_project_source(Path::new("/repo/src/main/java/acme/UserServiceImpl.java")));
        assert!(scope.is_project_source(Path::new("/repo/Top.java")));
    }

    #[test]
    fn test_rejects_build_output_and_tool_dirs() {
        let scope = scope();
        assert!(!scope.contains(Path::new("/repo/build/generated/A.java")));
        assert!(!scope.contains(Path::new("/repo/out/production/A.java")));
        assert!(!scope.contains(Path::new("/repo/.idea/A.java")));
        assert!(!scope.contains(Path::new("/repo/module/target/A.java")));
        assert!(!scope.contains(Path::new("/repo/src/generated/A.java")));
    }

    #[test]
    fn test_rejects_archives_and_foreign_paths() {
        let scope = scope();
        assert!(!scope.contains(Path::new("/repo/lib/contracts.jar!/acme/UserService.java")));
        assert!(!scope.contains(Path::new("/elsewhere/src/A.java")));
        assert!(!scope.contains(Path::new("/repo/../elsewhere/A.java")));
    }

    #[test]
    fn test_excluded_name_as_file_is_fine() {
        // Only directories are excluded, and only whole components
        let scope = scope();
        assert!(scope.contains(Path::new("/repo/src/build")));
        assert!(scope.contains(Path::new("/repo/src/builder/A.java")));
    }

    #[test]
    fn test_extension_filter() {
        let scope = scope();
        assert!(!scope.is_project_source(Path::new("/repo/src/README.md")));
        assert!(!scope.is_project_source(Path::new("/repo/src/A.kt")));
    }
}
