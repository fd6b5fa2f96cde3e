//! One project's index, owned explicitly.
//!
//! A [`Workspace`] ties a symbol provider to its repository, readiness state,
//! scanner and change coordinator. Queries run on the caller's thread against
//! the live repository. Scans and change batches run either synchronously or,
//! after [`Workspace::start`], on a dedicated indexing thread fed through a
//! queue of [`WorkItem`]s.
//!
//! While the index is waiting on the provider, the indexing thread polls
//! [`SymbolProvider::is_ready`] and queues [`WorkItem::ProviderReady`] itself,
//! so a scan deferred by a not-ready provider is retried without help from
//! the embedder. Without a running thread, call
//! [`Workspace::provider_ready`] instead.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::Config;
use crate::coordinator::{BatchOutcome, ChangeCoordinator, FileChangeEvent};
use crate::history::{HistoryStore, MethodHistory, Reconciled};
use crate::provider::SymbolProvider;
use crate::repository::MethodRepository;
use crate::scan::{ScanOrchestrator, ScanOutcome};
use crate::scope::ProjectScope;
use crate::search::{SearchEngine, SearchHit};
use crate::state::{HookId, IndexEvent, IndexState, IndexStatus};
use crate::watch::DebouncedFileWatcher;
use crate::{IndexError, MethodRecord, Result};

/// Work accepted by the indexing thread, processed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    FullScan,
    Changes(Vec<FileChangeEvent>),
    /// The provider finished loading: mark the index ready and rescan
    ProviderReady,
    Shutdown,
}

struct Worker {
    sender: Sender<WorkItem>,
    thread: Option<JoinHandle<()>>,
}

/// The method index of one project.
pub struct Workspace {
    root: PathBuf,
    config: Config,
    repository: Arc<MethodRepository>,
    status: Arc<IndexStatus>,
    scanner: Arc<ScanOrchestrator>,
    coordinator: Arc<ChangeCoordinator>,
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.root)
            .field("state", &self.status.state())
            .field("methods", &self.repository.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Workspace {
    /// Compose a workspace over `provider`. Nothing is scanned until
    /// [`initialize`](Self::initialize) or a work item asks for it.
    pub fn new(root: impl Into<PathBuf>, provider: Arc<dyn SymbolProvider>, config: Config) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);

        let repository = Arc::new(MethodRepository::new());
        let status = Arc::new(IndexStatus::new());
        let scanner = Arc::new(ScanOrchestrator::new(
            provider,
            Arc::clone(&repository),
            Arc::clone(&status),
            ProjectScope::new(&root, &config),
            config.contract_tag.clone(),
        ));
        let coordinator = Arc::new(ChangeCoordinator::new(
            Arc::clone(&scanner),
            config.full_rescan_threshold,
        ));

        Self {
            root,
            config,
            repository,
            status,
            scanner,
            coordinator,
            worker: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repository(&self) -> &MethodRepository {
        &self.repository
    }

    pub fn status(&self) -> &IndexStatus {
        &self.status
    }

    pub fn scanner(&self) -> &ScanOrchestrator {
        &self.scanner
    }

    pub fn coordinator(&self) -> &ChangeCoordinator {
        &self.coordinator
    }

    /// Run the first scan if the provider is ready, otherwise start waiting
    /// for [`provider_ready`](Self::provider_ready).
    pub fn initialize(&self) -> Option<ScanOutcome> {
        if self.scanner.provider().is_ready() {
            self.status.mark_ready();
            Some(self.scanner.full_scan())
        } else {
            self.status.begin_loading();
            None
        }
    }

    /// The provider became ready: leave `Loading` and rebuild the index.
    pub fn provider_ready(&self) -> ScanOutcome {
        self.status.mark_ready();
        self.scanner.full_scan()
    }

    pub fn full_scan(&self) -> ScanOutcome {
        self.scanner.full_scan()
    }

    /// Apply a change batch on the calling thread.
    pub fn on_change_batch(&self, events: &[FileChangeEvent]) -> BatchOutcome {
        self.coordinator.on_change_batch(events)
    }

    /// Spawn the indexing thread. Calling it again while running is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Ok(());
        }

        let (sender, receiver) = channel();
        let status = Arc::clone(&self.status);
        let scanner = Arc::clone(&self.scanner);
        let coordinator = Arc::clone(&self.coordinator);
        let poll = self.config.provider_poll();

        let thread = thread::Builder::new()
            .name("rpcfinder-indexer".to_string())
            .spawn(move || run_worker(receiver, &status, &scanner, &coordinator, poll))?;

        tracing::debug!("Started indexing thread for {}", self.root.display());
        *worker = Some(Worker {
            sender,
            thread: Some(thread),
        });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Queue a work item for the indexing thread.
    pub fn submit(&self, item: WorkItem) -> Result<()> {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let worker = worker.as_ref().ok_or(IndexError::WorkerStopped)?;
        worker.sender.send(item).map_err(|_| IndexError::WorkerStopped)
    }

    pub fn request_full_scan(&self) -> Result<()> {
        self.submit(WorkItem::FullScan)
    }

    pub fn enqueue_changes(&self, events: Vec<FileChangeEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.submit(WorkItem::Changes(events))
    }

    pub fn notify_provider_ready(&self) -> Result<()> {
        self.submit(WorkItem::ProviderReady)
    }

    /// Finish queued work, then stop the indexing thread.
    pub fn shutdown(&self) {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut worker) = worker {
            let _ = worker.sender.send(WorkItem::Shutdown);
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    tracing::warn!("Indexing thread for {} panicked", self.root.display());
                }
            }
        }
    }

    /// A started watcher over this workspace's sources.
    pub fn watcher(&self) -> Result<DebouncedFileWatcher> {
        let mut watcher = DebouncedFileWatcher::from_config(&self.root, &self.config)?;
        watcher.start()?;
        Ok(watcher)
    }

    pub fn search(&self, query: &str) -> Vec<MethodRecord> {
        self.engine().search(query)
    }

    pub fn search_limited(&self, query: &str, limit: usize) -> Vec<MethodRecord> {
        self.engine().search_limited(query, limit)
    }

    pub fn search_scored(&self, query: &str) -> Vec<SearchHit> {
        self.engine().search_scored(query)
    }

    pub fn list_all(&self) -> Vec<MethodRecord> {
        self.engine().list_all()
    }

    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    pub fn state(&self) -> IndexState {
        self.status.state()
    }

    pub fn register_hook<F>(&self, hook: F) -> HookId
    where
        F: Fn(IndexEvent) + Send + Sync + 'static,
    {
        self.status.register_hook(hook)
    }

    pub fn unregister_hook(&self, id: HookId) -> bool {
        self.status.unregister_hook(id)
    }

    pub fn subscribe(&self) -> (HookId, Receiver<IndexEvent>) {
        self.status.subscribe()
    }

    /// History for this workspace, capped at the configured limit.
    pub fn open_history<S: HistoryStore>(&self, store: S) -> Result<MethodHistory<S>> {
        MethodHistory::open(store, self.config.history_limit)
    }

    /// `history` matched against the current index.
    pub fn recent<S: HistoryStore>(&self, history: &MethodHistory<S>) -> Reconciled {
        history.reconcile(&self.list_all())
    }

    fn engine(&self) -> SearchEngine<'_> {
        SearchEngine::new(&self.repository)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    receiver: Receiver<WorkItem>,
    status: &IndexStatus,
    scanner: &ScanOrchestrator,
    coordinator: &ChangeCoordinator,
    poll: Duration,
) {
    loop {
        let item = if status.state() == IndexState::Loading {
            match receiver.recv_timeout(poll) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => {
                    if !scanner.provider().is_ready() {
                        continue;
                    }
                    tracing::debug!("Symbol provider ready again, retrying scan");
                    WorkItem::ProviderReady
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match receiver.recv() {
                Ok(item) => item,
                Err(_) => break,
            }
        };

        match item {
            WorkItem::FullScan => {
                scanner.full_scan();
            }
            WorkItem::Changes(events) => {
                coordinator.on_change_batch(&events);
            }
            WorkItem::ProviderReady => {
                status.mark_ready();
                scanner.full_scan();
            }
            WorkItem::Shutdown => break,
        }
    }
    tracing::debug!("Indexing thread stopped");
}
