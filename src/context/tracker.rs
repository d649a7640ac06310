//! # Context tracker: detects and applies framework-set changes.
//!
//! [`ContextTracker`] owns the current [`CrossTargetContext`] and decides
//! when the project's shape has changed enough to warrant rebuilding it.
//!
//! ## Architecture
//! ```text
//! try_refresh()
//!     │
//!     ├─ declared() matches current context ──► Ok(None)          (short-circuit)
//!     │
//!     └─ stale ──► acquire gate (single-flight, cancellable)
//!                    │
//!                    ├─ re-check: refreshed while waiting ──► Ok(Some(current))
//!                    │                                        (same Arc, no rebuild)
//!                    └─ still stale:
//!                         refresh_active()  ──► create_context() ──► store ──► Ok(Some(new))
//! ```
//!
//! ## Rules
//! - Only one refresh executes at a time; concurrent callers await the
//!   in-flight result rather than constructing a second context.
//! - Matching is by canonical framework identity, never string equality.
//! - Every wait observes the unload token and ends as a cancellation
//!   ([`ContextError::Disposed`]), not an error.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::context::CrossTargetContext;
use super::service::{ConfigurationService, DeclaredTargets};
use crate::error::ContextError;

/// Tracks the current cross-target context and refreshes it on demand.
pub struct ContextTracker {
    service: Arc<dyn ConfigurationService>,
    current: StdMutex<Option<Arc<CrossTargetContext>>>,
    gate: Arc<Mutex<()>>,
    cancel: CancellationToken,
}

impl ContextTracker {
    /// Creates a tracker with no context yet; the first `try_refresh` builds
    /// one.
    pub fn new(service: Arc<dyn ConfigurationService>, cancel: CancellationToken) -> Self {
        Self {
            service,
            current: StdMutex::new(None),
            gate: Arc::new(Mutex::new(())),
            cancel,
        }
    }

    /// Returns the current context, if one was ever built.
    pub fn current(&self) -> Option<Arc<CrossTargetContext>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The gate serializing refreshes; the provider holds it across
    /// release-then-add resubscription so the swap is atomic.
    pub(crate) fn gate(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.gate)
    }

    /// Refreshes the context if the project's framework set changed.
    ///
    /// Returns `Ok(None)` when nothing changed (no-op, no active-configuration
    /// refresh is triggered), `Ok(Some(ctx))` with the new — or concurrently
    /// rebuilt — context otherwise.
    pub async fn try_refresh(&self) -> Result<Option<Arc<CrossTargetContext>>, ContextError> {
        let declared = self.service.declared();
        if self.matches(&declared) {
            return Ok(None);
        }

        let _guard = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ContextError::Disposed),
            guard = self.gate.lock() => guard,
        };
        self.refresh_within_gate().await
    }

    /// Refresh body; the caller must hold the gate.
    ///
    /// Used by the provider to combine the refresh with resubscription under
    /// one gate acquisition.
    pub(crate) async fn refresh_within_gate(
        &self,
    ) -> Result<Option<Arc<CrossTargetContext>>, ContextError> {
        if self.cancel.is_cancelled() {
            return Err(ContextError::Disposed);
        }

        // Re-check after the gate wait: an in-flight refresh may have already
        // built the context this caller was about to request.
        let declared = self.service.declared();
        if self.matches(&declared) {
            return Ok(self.current());
        }

        tokio::select! {
            _ = self.cancel.cancelled() => return Err(ContextError::Disposed),
            res = self.service.refresh_active() => res?,
        }
        let context = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ContextError::Disposed),
            res = self.service.create_context() => Arc::new(res?),
        };

        *self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&context));
        Ok(Some(context))
    }

    /// Compares the declared framework set against the current context.
    ///
    /// Single-targeting compares the active identity only; cross-targeting
    /// compares the active identity and the full set.
    fn matches(&self, declared: &DeclaredTargets) -> bool {
        let Some(current) = self.current() else {
            return false;
        };
        if declared.cross_targeting != current.is_cross_targeting() {
            return false;
        }
        if current.active_target() != &declared.active {
            return false;
        }
        if !declared.cross_targeting {
            return true;
        }
        current.has_same_targets(&declared.frameworks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::context::ConfiguredProject;
    use crate::model::TargetFramework;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::watch;

    /// Fake service counting refresh/create calls; declared set is mutable.
    /// With a hold, `create_context` suspends until the test releases it.
    struct FakeService {
        declared: StdMutex<DeclaredTargets>,
        refreshes: AtomicUsize,
        creates: AtomicUsize,
        generation: watch::Sender<u64>,
        hold: Option<Arc<tokio::sync::Notify>>,
    }

    impl FakeService {
        fn single(active: &str) -> Arc<Self> {
            Arc::new(Self {
                declared: StdMutex::new(DeclaredTargets::single(TargetFramework::new(active))),
                refreshes: AtomicUsize::new(0),
                creates: AtomicUsize::new(0),
                generation: watch::channel(0).0,
                hold: None,
            })
        }

        fn single_held(active: &str, hold: Arc<tokio::sync::Notify>) -> Arc<Self> {
            Arc::new(Self {
                declared: StdMutex::new(DeclaredTargets::single(TargetFramework::new(active))),
                refreshes: AtomicUsize::new(0),
                creates: AtomicUsize::new(0),
                generation: watch::channel(0).0,
                hold: Some(hold),
            })
        }

        fn set_cross(&self, active: &str, frameworks: &[&str]) {
            let declared = DeclaredTargets::cross(
                TargetFramework::new(active),
                frameworks.iter().map(|f| TargetFramework::new(f)).collect(),
            );
            *self.declared.lock().unwrap() = declared;
        }
    }

    #[async_trait]
    impl ConfigurationService for FakeService {
        fn declared(&self) -> DeclaredTargets {
            self.declared.lock().unwrap().clone()
        }

        async fn refresh_active(&self) -> Result<(), ContextError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn create_context(&self) -> Result<CrossTargetContext, ContextError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            let declared = self.declared();
            let projects: Vec<_> = declared
                .frameworks
                .iter()
                .map(|t| ConfiguredProject::new(t.clone(), format!("Debug|AnyCPU|{t}")))
                .collect();
            Ok(CrossTargetContext::new(
                declared.active,
                projects,
                declared.cross_targeting,
            ))
        }

        fn generation(&self) -> watch::Receiver<u64> {
            self.generation.subscribe()
        }
    }

    #[tokio::test]
    async fn test_first_refresh_builds_context() {
        let service = FakeService::single("net6.0");
        let tracker = ContextTracker::new(service.clone(), CancellationToken::new());
        let ctx = tracker.try_refresh().await.unwrap().expect("context");
        assert_eq!(ctx.active_target(), &TargetFramework::new("net6.0"));
        assert!(!ctx.is_cross_targeting());
        assert_eq!(service.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_refresh_short_circuits() {
        let service = FakeService::single("net6.0");
        let tracker = ContextTracker::new(service.clone(), CancellationToken::new());
        tracker.try_refresh().await.unwrap();
        assert!(tracker.try_refresh().await.unwrap().is_none());
        // No second active-configuration refresh was triggered.
        assert_eq!(service.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_framework_set_change_forces_rebuild() {
        let service = FakeService::single("net6.0");
        let tracker = ContextTracker::new(service.clone(), CancellationToken::new());
        let first = tracker.try_refresh().await.unwrap().unwrap();

        service.set_cross("net6.0", &["net6.0", "net7.0"]);
        let second = tracker.try_refresh().await.unwrap().expect("new context");
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.is_cross_targeting());
        assert!(second.recognizes(&TargetFramework::new("net7.0")));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_context() {
        let hold = Arc::new(tokio::sync::Notify::new());
        let service = FakeService::single_held("net6.0", hold.clone());
        let tracker = Arc::new(ContextTracker::new(service.clone(), CancellationToken::new()));

        let a = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.try_refresh().await.unwrap() }
        });
        let b = tokio::spawn({
            let tracker = Arc::clone(&tracker);
            async move { tracker.try_refresh().await.unwrap() }
        });

        // Let the first caller suspend inside create_context and the second
        // queue on the gate, then release the construction.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        hold.notify_one();

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let a = a.expect("context");
        let b = b.expect("context");
        assert!(Arc::ptr_eq(&a, &b), "both callers observe the same context");
        assert_eq!(service.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_tracker_reports_disposed() {
        let service = FakeService::single("net6.0");
        let cancel = CancellationToken::new();
        let tracker = ContextTracker::new(service, cancel.clone());
        cancel.cancel();
        let err = tracker.try_refresh().await.unwrap_err();
        assert_eq!(err.as_label(), "context_disposed");
    }
}
