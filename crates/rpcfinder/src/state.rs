//! Index readiness and lifecycle hooks.
//!
//! [`IndexStatus`] is the single owner of the readiness flag of a workspace
//! and of the observers that want to hear about it. Observers receive one
//! tagged [`IndexEvent`] per lifecycle step, either through a callback
//! ([`IndexStatus::register_hook`]) or a channel ([`IndexStatus::subscribe`]).
//!
//! # Lifecycle
//!
//! ```text
//!  NotReady ──begin_loading──▶ Loading ──mark_ready──▶ Ready
//!      ▲                                                 │
//!      └─────────────── index_not_ready ◀────────────────┘
//! ```
//!
//! `index_not_ready` immediately continues into `Loading`: the workspace is
//! waiting on the symbol provider again, and its readiness signal schedules the
//! next full scan.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex, PoisonError};

/// Readiness of the method index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexState {
    /// Nothing usable yet, or the provider withdrew readiness mid-scan
    #[default]
    NotReady,
    /// Waiting for the symbol provider to become ready
    Loading,
    /// Provider is ready and scans can run
    Ready,
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexState::NotReady => write!(f, "not-ready"),
            IndexState::Loading => write!(f, "loading"),
            IndexState::Ready => write!(f, "ready"),
        }
    }
}

/// Lifecycle notifications delivered to every registered hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexEvent {
    /// The workspace started waiting for the symbol provider
    BeforeIndexLoad,
    /// The symbol provider became ready
    AfterIndexLoad,
    /// A full method scan is starting
    BeforeMethodScan,
    /// A full method scan finished (successfully or not)
    AfterMethodScan,
}

/// Opaque handle returned by [`IndexStatus::register_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

type Hook = Arc<dyn Fn(IndexEvent) + Send + Sync>;

/// Readiness flag plus ordered hook registry.
pub struct IndexStatus {
    state: Mutex<IndexState>,
    hooks: Mutex<Vec<(HookId, Hook)>>,
    next_id: AtomicU64,
}

impl Default for IndexStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStatus")
            .field("state", &self.state())
            .field("hooks", &self.hook_count())
            .finish()
    }
}

impl IndexStatus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IndexState::NotReady),
            hooks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn state(&self) -> IndexState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_ready(&self) -> bool {
        self.state() == IndexState::Ready
    }

    /// Register a lifecycle callback. Hooks run in registration order.
    pub fn register_hook<F>(&self, hook: F) -> HookId
    where
        F: Fn(IndexEvent) + Send + Sync + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(hook)));
        id
    }

    /// Remove a previously registered hook. Returns `false` for unknown ids.
    pub fn unregister_hook(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    /// Register a hook that forwards every event into a channel.
    ///
    /// The hook stays registered until [`IndexStatus::unregister_hook`] is
    /// called with the returned id; events sent after the receiver is dropped
    /// are discarded.
    pub fn subscribe(&self) -> (HookId, Receiver<IndexEvent>) {
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        let id = self.register_hook(move |event| {
            let _ = tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .send(event);
        });
        (id, rx)
    }

    pub fn hook_count(&self) -> usize {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver `event` to every hook, outside of any lock.
    pub fn emit(&self, event: IndexEvent) {
        let hooks: Vec<Hook> = self
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, hook)| Arc::clone(hook))
            .collect();

        for hook in hooks {
            hook(event);
        }
    }

    /// Enter `Loading` and announce it with `BeforeIndexLoad`.
    pub fn begin_loading(&self) {
        self.set(IndexState::Loading);
        self.emit(IndexEvent::BeforeIndexLoad);
    }

    /// Enter `Ready` and announce it with `AfterIndexLoad`.
    ///
    /// Returns `false` (and emits nothing) if the index was already ready.
    pub fn mark_ready(&self) -> bool {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == IndexState::Ready {
                return false;
            }
            *state = IndexState::Ready;
        }
        tracing::debug!("index state -> ready");
        self.emit(IndexEvent::AfterIndexLoad);
        true
    }

    /// The provider reported "not ready" while we were using it.
    ///
    /// Regresses to `NotReady` and goes straight back to waiting, so the next
    /// provider readiness signal re-runs the full pipeline.
    pub fn index_not_ready(&self) {
        self.set(IndexState::NotReady);
        tracing::debug!("symbol provider not ready, deferring until it is");
        self.begin_loading();
    }

    fn set(&self, next: IndexState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            tracing::debug!("index state {} -> {}", *state, next);
            *state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(status: &IndexStatus) -> (HookId, Arc<Mutex<Vec<IndexEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let id = status.register_hook(move |e| sink.lock().unwrap().push(e));
        (id, events)
    }

    #[test]
    fn test_initial_state() {
        let status = IndexStatus::new();
        assert_eq!(status.state(), IndexState::NotReady);
        assert!(!status.is_ready());
    }

    #[test]
    fn test_loading_then_ready() {
        let status = IndexStatus::new();
        let (_, events) = recorder(&status);

        status.begin_loading();
        assert_eq!(status.state(), IndexState::Loading);

        assert!(status.mark_ready());
        assert!(status.is_ready());

        // Second readiness signal is a no-op
        assert!(!status.mark_ready());

        assert_eq!(
            *events.lock().unwrap(),
            vec![IndexEvent::BeforeIndexLoad, IndexEvent::AfterIndexLoad]
        );
    }

    #[test]
    fn test_index_not_ready_regresses_and_waits() {
        let status = IndexStatus::new();
        status.mark_ready();
        let (_, events) = recorder(&status);

        status.index_not_ready();

        assert_eq!(status.state(), IndexState::Loading);
        assert!(!status.is_ready());
        assert_eq!(*events.lock().unwrap(), vec![IndexEvent::BeforeIndexLoad]);
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let status = IndexStatus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..5 {
            let order = Arc::clone(&order);
            status.register_hook(move |_| order.lock().unwrap().push(n));
        }

        status.emit(IndexEvent::BeforeMethodScan);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let status = IndexStatus::new();
        let (id, events) = recorder(&status);

        status.emit(IndexEvent::BeforeMethodScan);
        assert!(status.unregister_hook(id));
        assert!(!status.unregister_hook(id));
        status.emit(IndexEvent::AfterMethodScan);

        assert_eq!(*events.lock().unwrap(), vec![IndexEvent::BeforeMethodScan]);
    }

    #[test]
    fn test_repeated_register_unregister_does_not_leak() {
        let status = IndexStatus::new();
        for _ in 0..100 {
            let id = status.register_hook(|_| {});
            status.unregister_hook(id);
        }
        assert_eq!(status.hook_count(), 0);
    }

    #[test]
    fn test_hook_ids_are_unique() {
        let status = IndexStatus::new();
        let a = status.register_hook(|_| {});
        let b = status.register_hook(|_| {});
        assert_ne!(a, b);
    }

    #[test]
    fn test_subscribe_channel() {
        let status = IndexStatus::new();
        let (id, rx) = status.subscribe();

        status.emit(IndexEvent::BeforeMethodScan);
        status.emit(IndexEvent::AfterMethodScan);

        assert_eq!(rx.try_recv(), Ok(IndexEvent::BeforeMethodScan));
        assert_eq!(rx.try_recv(), Ok(IndexEvent::AfterMethodScan));

        status.unregister_hook(id);
        status.emit(IndexEvent::BeforeMethodScan);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_hook_may_reenter_registry() {
        // Hooks run outside the registry lock, so they can query status
        let status = Arc::new(IndexStatus::new());
        let seen = Arc::new(Mutex::new(None));
        {
            let status_ref = Arc::clone(&status);
            let seen = Arc::clone(&seen);
            status.register_hook(move |_| {
                *seen.lock().unwrap() = Some(status_ref.hook_count());
            });
        }
        status.emit(IndexEvent::AfterIndexLoad);
        assert_eq!(*seen.lock().unwrap(), Some(1));
    }
}
