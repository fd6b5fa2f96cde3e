//! File system watching and source discovery.
//!
//! [`DebouncedFileWatcher`] turns raw notify events into the
//! [`FileChangeEvent`]s consumed by the change coordinator. It uses
//! `notify-debouncer-full`, which provides:
//! - Event debouncing (multiple rapid events are merged)
//! - Proper rename tracking using file IDs
//! - Deduplication of create/modify events
//!
//! [`find_source_files`] enumerates the sources of a project with the same
//! exclusions, respecting `.gitignore`.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, DebouncedEvent, Debouncer, RecommendedCache};

use crate::config::Config;
use crate::coordinator::FileChangeEvent;
use crate::scope::ProjectScope;

/// Default debounce duration for the DebouncedFileWatcher
pub const DEFAULT_DEBOUNCE_DURATION: Duration = Duration::from_millis(200);

/// A debounced file system watcher over one project root.
///
/// # Example
/// ```ignore
/// let mut watcher = DebouncedFileWatcher::from_config(&root, &config)?;
/// watcher.start()?;
///
/// loop {
///     let batch = watcher.wait_timeout(Duration::from_millis(500));
///     if !batch.is_empty() {
///         workspace.on_change_batch(batch)?;
///     }
/// }
/// ```
pub struct DebouncedFileWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    receiver: Receiver<DebounceEventResult>,
    scope: ProjectScope,
}

impl DebouncedFileWatcher {
    /// Create a watcher that reports changes to project sources in `scope`.
    pub fn new(scope: ProjectScope, debounce_duration: Duration) -> Result<Self, notify::Error> {
        let (tx, rx) = std::sync::mpsc::channel();

        let debouncer = new_debouncer(
            debounce_duration,
            None, // Use default tick rate
            move |result: DebounceEventResult| {
                let _ = tx.send(result);
            },
        )?;

        Ok(Self {
            debouncer,
            receiver: rx,
            scope,
        })
    }

    /// Create a watcher using the exclusions and debounce window from `config`.
    pub fn from_config(root: &Path, config: &Config) -> Result<Self, notify::Error> {
        Self::new(ProjectScope::new(root, config), config.debounce())
    }

    /// Start watching the root directory.
    pub fn start(&mut self) -> Result<(), notify::Error> {
        self.debouncer
            .watch(self.scope.root(), RecursiveMode::Recursive)
            .map_err(|e| notify::Error::generic(&e.to_string()))
    }

    /// Stop watching the root directory.
    pub fn stop(&mut self) -> Result<(), notify::Error> {
        self.debouncer
            .unwatch(self.scope.root())
            .map_err(|e| notify::Error::generic(&e.to_string()))
    }

    /// Drain every debounced batch that is already available.
    ///
    /// This is non-blocking and returns an empty vec if no events are available.
    pub fn poll_events(&self) -> Vec<FileChangeEvent> {
        let mut events = Vec::new();
        while let Ok(result) = self.receiver.try_recv() {
            self.collect(result, &mut events);
        }
        events
    }

    /// Wait for events with a timeout, returning all events that arrive.
    pub fn wait_timeout(&self, timeout: Duration) -> Vec<FileChangeEvent> {
        let mut events = Vec::new();

        match self.receiver.recv_timeout(timeout) {
            Ok(result) => self.collect(result, &mut events),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return events,
        }

        // Drain any additional events that arrived
        events.extend(self.poll_events());
        events
    }

    fn collect(&self, result: DebounceEventResult, out: &mut Vec<FileChangeEvent>) {
        match result {
            Ok(debounced_events) => {
                for event in debounced_events
                    .into_iter()
                    .filter_map(|event| self.process_debounced_event(event))
                {
                    // A write usually arrives as both a modify and a close
                    if !out.contains(&event) {
                        out.push(event);
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!("Debounced watch error: {:?}", error);
                }
            }
        }
    }

    fn process_debounced_event(&self, event: DebouncedEvent) -> Option<FileChangeEvent> {
        to_change_event(&event.kind, &event.paths, &self.scope)
    }
}

/// Check if an event kind represents actual content changes worth processing.
/// Filters out noisy events like metadata-only changes and reads.
fn is_meaningful_event(kind: &EventKind) -> bool {
    match kind {
        // Metadata-only changes (permissions, timestamps) - no content change
        EventKind::Modify(ModifyKind::Metadata(_)) => false,

        // inotify reports an in-place write as Data(Any)
        EventKind::Modify(ModifyKind::Data(_)) => true,

        // Closing a file opened for writing finishes an edit
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,

        // Other access events (open, read) - not actual modifications
        EventKind::Access(_) => false,

        EventKind::Other => false,

        _ => true,
    }
}

/// Map one notify event onto a change-feed event.
///
/// Only project sources are reported. Renames keep their destination when
/// the debouncer paired both ends; a rename into the tree with no known
/// origin is a content change of the new path.
fn to_change_event(kind: &EventKind, paths: &[PathBuf], scope: &ProjectScope) -> Option<FileChangeEvent> {
    if !is_meaningful_event(kind) {
        return None;
    }

    match kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let [from, to, ..] = paths else {
                return None;
            };
            if !scope.is_project_source(from) && !scope.is_project_source(to) {
                return None;
            }
            Some(FileChangeEvent::moved(from, Some(to.clone())))
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let path = paths.iter().find(|p| scope.is_project_source(p))?;
            Some(FileChangeEvent::content(path))
        }
        EventKind::Modify(ModifyKind::Name(_)) => {
            let path = paths.iter().find(|p| scope.is_project_source(p))?;
            Some(FileChangeEvent::moved(path, None))
        }
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Access(_) | EventKind::Any => {
            let path = paths.iter().find(|p| scope.is_project_source(p))?;
            Some(FileChangeEvent::content(path))
        }
        EventKind::Remove(_) => {
            let path = paths.iter().find(|p| scope.is_project_source(p))?;
            Some(FileChangeEvent::delete(path))
        }
        _ => None,
    }
}

/// Find all project sources respecting .gitignore and the configured exclusions.
///
/// This:
/// - Respects .gitignore files (including nested ones) when `respect_gitignore` is true
/// - Respects global gitignore (~/.gitignore)
/// - Respects .git/info/exclude
/// - Applies the excluded directories on top
pub fn find_source_files(root: &Path, config: &Config) -> std::io::Result<Vec<PathBuf>> {
    use ignore::overrides::OverrideBuilder;
    use ignore::WalkBuilder;

    let scope = ProjectScope::new(root, config);
    let respect_gitignore = config.respect_gitignore;

    // Build overrides for custom exclusions (these take precedence)
    let mut override_builder = OverrideBuilder::new(root);
    for dir in config.excluded_dirs() {
        // Exclude pattern: !dir/ means "do not include this directory"
        let pattern = format!("!{}/", dir);
        if let Err(e) = override_builder.add(&pattern) {
            tracing::warn!("Invalid exclude pattern '{}': {}", pattern, e);
        }
    }
    let overrides = override_builder.build().map_err(|e| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Failed to build overrides: {}", e))
    })?;

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true) // Skip hidden files/dirs (like .git)
        .git_ignore(respect_gitignore)
        .git_global(respect_gitignore)
        .git_exclude(respect_gitignore)
        .require_git(false) // Still work in non-git directories
        .ignore(respect_gitignore)
        .parents(respect_gitignore)
        .overrides(overrides);

    let mut files = Vec::new();
    for entry in builder.build() {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_file() && scope.is_source_file(path) {
                    files.push(path.to_path_buf());
                }
            }
            Err(err) => {
                tracing::warn!("Error walking directory: {}", err);
            }
        }
    }

    Ok(files)
}
