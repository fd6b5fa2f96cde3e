//! Change-batch classification and targeted updates.
//!
//! A batch of file changes either invalidates the whole index (anything was
//! deleted or moved, or too many files changed at once) or is applied file by
//! file: every class declared in a changed file has its records replaced by
//! whatever it contributes now. A targeted update holds the scanner's writer
//! lock, so it never interleaves with a full scan started on another thread.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::provider::NotReady;
use crate::scan::{contract_methods, ScanOrchestrator, ScanOutcome};

/// What happened to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Created or modified in place
    Content,
    Delete,
    /// Renamed or moved; the destination is known when both ends were seen
    Move,
}

/// One entry of a change batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
}

impl FileChangeEvent {
    pub fn content(path: impl AsRef<Path>) -> Self {
        Self {
            kind: ChangeKind::Content,
            path: path.as_ref().to_path_buf(),
            destination: None,
        }
    }

    pub fn delete(path: impl AsRef<Path>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            path: path.as_ref().to_path_buf(),
            destination: None,
        }
    }

    pub fn moved(path: impl AsRef<Path>, destination: Option<PathBuf>) -> Self {
        Self {
            kind: ChangeKind::Move,
            path: path.as_ref().to_path_buf(),
            destination,
        }
    }

    /// Both ends of the change, destination last.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        std::iter::once(self.path.as_path()).chain(self.destination.as_deref())
    }
}

/// How a batch will be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangePlan {
    /// No source files involved
    Ignore,
    FullRescan,
    /// Re-evaluate the classes of these files, in order
    Targeted(Vec<PathBuf>),
}

/// What [`ChangeCoordinator::on_change_batch`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Ignored,
    FullRescan(ScanOutcome),
    Targeted {
        files: usize,
        removed: usize,
        inserted: usize,
    },
    /// The provider was not ready; the index went back to waiting for it
    Deferred,
}

/// Applies change batches to the repository of one workspace.
#[derive(Debug)]
pub struct ChangeCoordinator {
    scanner: Arc<ScanOrchestrator>,
    full_rescan_threshold: usize,
}

impl ChangeCoordinator {
    pub fn new(scanner: Arc<ScanOrchestrator>, full_rescan_threshold: usize) -> Self {
        Self {
            scanner,
            full_rescan_threshold: full_rescan_threshold.max(1),
        }
    }

    fn is_relevant(&self, event: &FileChangeEvent) -> bool {
        let scope = self.scanner.scope();
        event.paths().any(|p| scope.is_source_file(p))
    }

    /// Decide how a batch would be applied, without applying it.
    pub fn classify(&self, events: &[FileChangeEvent]) -> ChangePlan {
        let relevant: Vec<&FileChangeEvent> = events.iter().filter(|e| self.is_relevant(e)).collect();
        self.plan(&relevant)
    }

    fn plan(&self, relevant: &[&FileChangeEvent]) -> ChangePlan {
        if relevant.is_empty() {
            return ChangePlan::Ignore;
        }

        if relevant.iter().any(|e| e.kind != ChangeKind::Content) || relevant.len() >= self.full_rescan_threshold {
            return ChangePlan::FullRescan;
        }

        let mut seen = HashSet::new();
        let paths = relevant
            .iter()
            .filter(|e| seen.insert(e.path.clone()))
            .map(|e| e.path.clone())
            .collect();
        ChangePlan::Targeted(paths)
    }

    /// Classify and apply one batch of file changes.
    pub fn on_change_batch(&self, events: &[FileChangeEvent]) -> BatchOutcome {
        let relevant: Vec<FileChangeEvent> = events.iter().filter(|e| self.is_relevant(e)).cloned().collect();
        if relevant.is_empty() {
            return BatchOutcome::Ignored;
        }

        self.scanner.provider().observe_changes(&relevant);

        let refs: Vec<&FileChangeEvent> = relevant.iter().collect();
        let plan = self.plan(&refs);
        tracing::debug!("Change batch of {} source events: {:?}", relevant.len(), plan);

        match plan {
            ChangePlan::Ignore => BatchOutcome::Ignored,
            ChangePlan::FullRescan => BatchOutcome::FullRescan(self.scanner.full_scan()),
            ChangePlan::Targeted(paths) => {
                let mut removed = 0;
                let mut inserted = 0;

                let applied = {
                    let _writer = self.scanner.writer();
                    paths.iter().try_for_each(|path| {
                        let (r, i) = self.update_file(path).inspect_err(|_| {
                            tracing::info!("Symbol provider not ready during update of {}", path.display());
                        })?;
                        removed += r;
                        inserted += i;
                        Ok::<(), NotReady>(())
                    })
                };
                if applied.is_err() {
                    self.scanner.status().index_not_ready();
                    return BatchOutcome::Deferred;
                }

                tracing::debug!(
                    "Targeted update of {} files: -{} +{} records",
                    paths.len(),
                    removed,
                    inserted
                );
                BatchOutcome::Targeted {
                    files: paths.len(),
                    removed,
                    inserted,
                }
            }
        }
    }

    /// Re-evaluate every class declared in `path`. Callers hold the writer.
    ///
    /// Classes that used to live in the file but no longer do lose their
    /// records too, so renaming a class inside a file leaves nothing behind.
    fn update_file(&self, path: &Path) -> Result<(usize, usize), NotReady> {
        let provider = self.scanner.provider();
        let repository = self.scanner.repository();
        let scope = self.scanner.scope();

        let mut stale: HashSet<String> = repository
            .snapshot()
            .iter()
            .filter(|r| r.file_path == path)
            .map(|r| r.class_name.clone())
            .collect();

        let mut removed = 0;
        let mut inserted = 0;

        for class in provider.classes_in_file(path).ready()? {
            let Some(class_name) = class.qualified_name.clone() else {
                continue;
            };
            let records = contract_methods(provider, scope, self.scanner.contract_tag(), &class)?.unwrap_or_default();
            let (r, i) = repository.replace_class(&class_name, records);
            stale.remove(&class_name);
            removed += r;
            inserted += i;
        }

        for class_name in stale {
            removed += repository.remove_class(&class_name);
        }

        Ok((removed, inserted))
    }
}
