//! # Snapshot owner: locked compare-and-swap plus debounced publication.
//!
//! [`SnapshotUpdater`] owns the current [`DependenciesSnapshot`] and is the
//! only place it is replaced. Updates run under a mutual-exclusion region and
//! use pointer equality to detect no-ops; material changes schedule a
//! **debounced** notification so a burst of evaluation/build activity
//! collapses into one redraw for tree consumers.
//!
//! ## Architecture
//! ```text
//! try_update(f)
//!     │  lock ── next = f(current)
//!     │         ├─ Arc::ptr_eq(next, current) ──► Ok(false)  (no publication)
//!     │         └─ store next ──► mark dirty ──► Ok(true)
//!     ▼
//! publisher task:
//!     wait dirty ──► quiet loop: sleep(debounce) restarted by every new dirty
//!                        └─ quiet period elapsed ──► send(latest snapshot)
//! ```
//!
//! ## Rules
//! - The notification carries the **latest** snapshot at delivery time, not
//!   necessarily the one a particular `try_update` computed.
//! - Disposal fails subsequent `try_update` calls fast, cancels the pending
//!   debounce, and closes the notification channel (consumers observe
//!   `Closed` as finality).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

use super::snapshot::DependenciesSnapshot;
use crate::config::ProviderConfig;
use crate::error::SnapshotError;

/// Owns the current snapshot; applies updates with CAS semantics and
/// publishes debounced change notifications.
pub struct SnapshotUpdater {
    current: StdMutex<Arc<DependenciesSnapshot>>,
    sender: StdMutex<Option<broadcast::Sender<Arc<DependenciesSnapshot>>>>,
    dirty: Notify,
    cancel: CancellationToken,
    disposed: AtomicBool,
}

impl SnapshotUpdater {
    /// Creates an updater starting from the empty snapshot and spawns its
    /// debounce/publisher task.
    pub fn new(cfg: &ProviderConfig, cancel: CancellationToken) -> Arc<Self> {
        let (sender, _) = broadcast::channel(cfg.notify_capacity_clamped());
        let updater = Arc::new(Self {
            current: StdMutex::new(DependenciesSnapshot::empty()),
            sender: StdMutex::new(Some(sender)),
            dirty: Notify::new(),
            cancel,
            disposed: AtomicBool::new(false),
        });
        updater.spawn_publisher(cfg.debounce);
        updater
    }

    /// Returns the current snapshot (never null; initially empty).
    pub fn current(&self) -> Arc<DependenciesSnapshot> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribes to debounced "snapshot changed" notifications.
    ///
    /// After disposal the returned receiver reports `Closed` immediately.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DependenciesSnapshot>> {
        match &*self.sender.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(sender) => sender.subscribe(),
            None => closed_receiver(),
        }
    }

    /// Runs `update` on the current snapshot inside the mutual-exclusion
    /// region.
    ///
    /// Returns `Ok(false)` when `update` returned its input pointer-identical
    /// (no-op: nothing stored, nothing published); `Ok(true)` when a new
    /// snapshot was stored and a debounced publish was scheduled.
    pub fn try_update<F>(&self, update: F) -> Result<bool, SnapshotError>
    where
        F: FnOnce(&Arc<DependenciesSnapshot>) -> Arc<DependenciesSnapshot>,
    {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(SnapshotError::Disposed);
        }
        let changed = {
            let mut current = self
                .current
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let next = update(&current);
            if Arc::ptr_eq(&next, &current) {
                false
            } else {
                *current = next;
                true
            }
        };
        if changed {
            self.dirty.notify_one();
        }
        Ok(changed)
    }

    /// Stops accepting updates, cancels any pending debounce, and completes
    /// the notification stream. Idempotent.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn spawn_publisher(self: &Arc<Self>, window: Duration) {
        let me = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = me.cancel.cancelled() => return,
                    _ = me.dirty.notified() => {}
                }
                // Quiet-period wait: every further update restarts the window
                // so one notification covers the whole burst.
                loop {
                    tokio::select! {
                        _ = me.cancel.cancelled() => return,
                        _ = me.dirty.notified() => continue,
                        _ = tokio::time::sleep(window) => break,
                    }
                }
                let snapshot = me.current();
                if let Some(sender) = &*me.sender.lock().unwrap_or_else(PoisonError::into_inner) {
                    // No receivers is fine; the next subscriber reads
                    // `current()` anyway.
                    let _ = sender.send(snapshot);
                }
            }
        });
    }
}

fn closed_receiver() -> broadcast::Receiver<Arc<DependenciesSnapshot>> {
    let (sender, receiver) = broadcast::channel(1);
    drop(sender);
    receiver
}
