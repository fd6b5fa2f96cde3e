//! rpcfinder: incremental indexing and fuzzy search for RPC contract methods
//!
//! This crate provides the core of an "RPC method finder":
//! - A per-workspace repository of methods implemented on contract interfaces
//! - A readiness state machine with lifecycle hooks for dependent UI
//! - Full scans and targeted per-file updates driven by file-change batches
//! - Case-insensitive subsequence search with relevance ranking and highlighting

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod config;
pub mod coordinator;
pub mod fuzzy;
pub mod highlight;
pub mod history;
pub mod provider;
pub mod repository;
pub mod scan;
pub mod scope;
pub mod search;
pub mod state;
pub mod watch;
pub mod workspace;

// Re-export main types
pub use config::Config;
pub use coordinator::{BatchOutcome, ChangeCoordinator, ChangeKind, ChangePlan, FileChangeEvent};
pub use highlight::highlight;
pub use history::{HistoryEntry, HistoryStore, JsonHistoryStore, MemoryHistoryStore, MethodHistory, Reconciled};
pub use provider::{ClassHandle, Lookup, MethodHandle, SymbolProvider};
pub use repository::MethodRepository;
pub use scan::{ScanOrchestrator, ScanOutcome};
pub use scope::ProjectScope;
pub use search::SearchEngine;
pub use state::{HookId, IndexEvent, IndexState, IndexStatus};
pub use workspace::{WorkItem, Workspace};

/// A method implemented on an RPC contract interface.
///
/// Records are compared on all four fields; the repository stores them in a
/// set, so inserting an identical record twice keeps a single copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRecord {
    /// Short method name: "getUser"
    pub method_name: String,
    /// Qualified name of the implementing class: "com.acme.user.UserServiceImpl"
    pub class_name: String,
    /// Source file that declares the method
    pub file_path: PathBuf,
    /// Byte offset of the method name within the file
    pub text_offset: usize,
}

impl MethodRecord {
    pub fn new(
        method_name: impl Into<String>,
        class_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        text_offset: usize,
    ) -> Self {
        Self {
            method_name: method_name.into(),
            class_name: class_name.into(),
            file_path: file_path.into(),
            text_offset,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file_path
    }

    /// Key used to match history entries against live records.
    pub fn history_key(&self) -> (&str, &str) {
        (&self.class_name, &self.method_name)
    }
}

impl std::fmt::Display for MethodRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)
    }
}

/// Errors from the ambient surfaces of the index (file access, watching, history).
///
/// Configuration problems are not errors either: [`Config::load`] logs them and
/// falls back to defaults.
///
/// Provider readiness is not an error: it travels as [`Lookup::NotReady`] and
/// is absorbed by the scan and change paths.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("History store error: {0}")]
    HistoryError(String),

    #[error("Indexing worker is not running")]
    WorkerStopped,
}

pub type Result<T> = std::result::Result<T, IndexError>;
