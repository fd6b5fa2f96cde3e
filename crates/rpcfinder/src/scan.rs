//! Full rescans of the method repository.
//!
//! A scan asks the symbol provider for every candidate class, keeps the
//! project-owned classes that implement a tagged contract interface, and
//! swaps the resulting records into the repository in one step. Lifecycle
//! hooks bracket every attempt with `BeforeMethodScan` and `AfterMethodScan`.
//! The outcome then moves the readiness flag: a completed scan proves the
//! provider ready, a deferred one sends the index back to waiting.
//!
//! Full scans and targeted updates share one writer lock, so records read
//! from the provider are never swapped over a newer update.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::provider::{ClassHandle, NotReady, SymbolProvider};
use crate::repository::MethodRepository;
use crate::scope::ProjectScope;
use crate::state::{IndexEvent, IndexStatus};
use crate::MethodRecord;

/// What a call to [`ScanOrchestrator::full_scan`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The repository now holds exactly the methods found by this scan
    Completed {
        methods: usize,
        classes: usize,
        elapsed: Duration,
    },
    /// The provider was not ready; the repository is untouched and the
    /// index waits for the next readiness signal
    Deferred,
    /// Another scan was already running and will produce the result
    Coalesced,
}

impl ScanOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ScanOutcome::Completed { .. })
    }
}

/// Drives full rescans; at most one runs at a time.
pub struct ScanOrchestrator {
    provider: Arc<dyn SymbolProvider>,
    repository: Arc<MethodRepository>,
    status: Arc<IndexStatus>,
    scope: ProjectScope,
    contract_tag: String,
    scan_lock: Mutex<()>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ScanOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOrchestrator")
            .field("scope", &self.scope)
            .field("contract_tag", &self.contract_tag)
            .finish_non_exhaustive()
    }
}

impl ScanOrchestrator {
    pub fn new(
        provider: Arc<dyn SymbolProvider>,
        repository: Arc<MethodRepository>,
        status: Arc<IndexStatus>,
        scope: ProjectScope,
        contract_tag: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            repository,
            status,
            scope,
            contract_tag: contract_tag.into(),
            scan_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> &dyn SymbolProvider {
        self.provider.as_ref()
    }

    pub fn repository(&self) -> &MethodRepository {
        &self.repository
    }

    pub fn status(&self) -> &IndexStatus {
        &self.status
    }

    pub fn scope(&self) -> &ProjectScope {
        &self.scope
    }

    pub fn contract_tag(&self) -> &str {
        &self.contract_tag
    }

    /// Exclusive right to read the provider and write the repository.
    pub(crate) fn writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rebuild the repository from the provider's current view.
    ///
    /// Returns [`ScanOutcome::Coalesced`] without doing anything if another
    /// scan holds the gate. A completed scan marks the index ready. A provider
    /// that stops being ready mid-scan leaves the repository as it was and
    /// moves the index back to waiting.
    pub fn full_scan(&self) -> ScanOutcome {
        let _guard = match self.scan_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                tracing::debug!("Scan already running, coalescing request");
                return ScanOutcome::Coalesced;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        self.status.emit(IndexEvent::BeforeMethodScan);
        let start = Instant::now();

        let collected = {
            let _writer = self.writer();
            self.collect().map(|(records, classes)| {
                let methods = records.len();
                self.repository.replace_all(records);
                (methods, classes)
            })
        };

        let outcome = match collected {
            Ok((methods, classes)) => {
                let elapsed = start.elapsed();
                tracing::info!(
                    "Indexed {} contract methods from {} classes in {:?}",
                    methods,
                    classes,
                    elapsed
                );
                ScanOutcome::Completed {
                    methods,
                    classes,
                    elapsed,
                }
            }
            Err(NotReady) => ScanOutcome::Deferred,
        };

        self.status.emit(IndexEvent::AfterMethodScan);

        if outcome == ScanOutcome::Deferred {
            tracing::info!("Symbol provider not ready, scan deferred");
            self.status.index_not_ready();
        } else {
            self.status.mark_ready();
        }

        outcome
    }

    /// Enumerate without touching the repository.
    fn collect(&self) -> Result<(HashSet<MethodRecord>, usize), NotReady> {
        let provider = self.provider.as_ref();
        let mut records = HashSet::new();
        let mut classes = 0;

        let mut names = provider.all_candidate_class_names().ready()?;
        names.sort_unstable();
        names.dedup();

        for name in names {
            for class in provider.classes_named(&name).ready()? {
                if let Some(found) = contract_methods(provider, &self.scope, &self.contract_tag, &class)? {
                    classes += 1;
                    records.extend(found);
                }
            }
        }

        Ok((records, classes))
    }
}

/// Records contributed by `class`, or `None` if it is not a project-owned
/// implementation of a tagged contract.
///
/// A method qualifies when it is marked as an override, or when a contract
/// interface of the class declares a method with the same name.
pub(crate) fn contract_methods(
    provider: &dyn SymbolProvider,
    scope: &ProjectScope,
    tag: &str,
    class: &ClassHandle,
) -> Result<Option<Vec<MethodRecord>>, NotReady> {
    let (Some(class_name), Some(file)) = (class.qualified_name.as_deref(), class.file.as_deref()) else {
        return Ok(None);
    };
    if !scope.is_project_source(file) {
        return Ok(None);
    }

    let mut contracts = Vec::new();
    for iface in provider.interfaces_of(class).ready()? {
        if provider.has_tag(&iface, tag).ready()? {
            contracts.push(iface);
        }
    }
    if contracts.is_empty() {
        return Ok(None);
    }

    let mut declared: Option<HashSet<String>> = None;
    let mut records = Vec::new();

    for method in provider.methods_of(class).ready()? {
        let qualifies = method.is_override || {
            if declared.is_none() {
                let mut names = HashSet::new();
                for contract in &contracts {
                    names.extend(provider.methods_of(contract).ready()?.into_iter().map(|m| m.name));
                }
                declared = Some(names);
            }
            declared.as_ref().is_some_and(|names| names.contains(&method.name))
        };

        if qualifies {
            records.push(MethodRecord::new(method.name, class_name, method.file, method.offset));
        }
    }

    Ok(Some(records))
}
