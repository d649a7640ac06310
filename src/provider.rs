//! # Snapshot provider: orchestrates context, subscribers, and the updater.
//!
//! [`SnapshotProvider`] composes the whole pipeline: on load it establishes
//! the initial cross-target context, wires every subscriber's output into the
//! [`SnapshotUpdater`], and re-wires everything whenever the
//! [`ContextTracker`] reports a context change.
//!
//! ## Architecture
//! ```text
//! ConfigurationService::generation() ──► watcher task ──► refresh()
//!                                                            │ (gate)
//!                                    ┌───────────────────────┴──────────┐
//!                                    │ tracker.refresh_within_gate()   │
//!                                    │   Some(ctx):                    │
//!                                    │     release_subscriptions() ──► │
//!                                    │     add_subscriptions(ctx)      │  atomic
//!                                    │     snapshot.set_targets(...)   │  unit
//!                                    └──────────────────────────────────┘
//!
//! RuleSubscriber ──► SubscriberOutput ──► pump task
//!                                            ├─ stale target ──► discard
//!                                            ├─ Changes ──► updater.try_update
//!                                            └─ Fault ──► diagnostics + tracing
//!
//! updater ── debounced ──► subscribe() consumers (UI tree, build services)
//! ```
//!
//! ## States
//! ```text
//! Uninitialized ──► Initializing ──► Active ◄──► Refreshing
//!                                      │
//!                                      └──► Disposed (terminal)
//! ```
//! The Active → Refreshing → Active transition runs under the same gate the
//! tracker uses, so change events from a stale subscriber generation never
//! interleave with the newly-attached one.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::ProviderConfig;
use crate::context::{ConfigurationService, ConfiguredProject, ContextTracker, CrossTargetContext};
use crate::diag::Diagnostic;
use crate::error::{ContextError, ProviderError};
use crate::model::TargetFramework;
use crate::snapshot::{DependenciesSnapshot, SnapshotUpdater};
use crate::subscribe::{
    CatalogSource, DependencyHandler, EvaluationSource, RuleSubscriber, SharedProjectsHandler,
    SubscriberOutput,
};

/// Lifecycle states of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Constructed, nothing wired yet.
    Uninitialized,
    /// First context being built, subscriptions being attached.
    Initializing,
    /// Subscribers attached; snapshot updates flow.
    Active,
    /// Context went stale; subscriptions being swapped.
    Refreshing,
    /// Terminal; all work cancelled, no further updates accepted.
    Disposed,
}

/// Owns the dependency snapshot pipeline for one project.
pub struct SnapshotProvider {
    state: StdMutex<ProviderState>,
    tracker: ContextTracker,
    updater: Arc<SnapshotUpdater>,
    subscribers: Vec<RuleSubscriber>,
    diagnostics: StdMutex<Vec<Diagnostic>>,
    cancel: CancellationToken,
}

impl SnapshotProvider {
    /// Loads the provider: builds the first cross-target context, attaches
    /// all subscribers, and starts the pump and configuration-watch tasks.
    ///
    /// `handlers` is the explicit, ordered list of dependency-kind handlers
    /// for the joint (evaluation + design-time build) subscriber; handlers
    /// are filtered per batch by their capability predicate. Shared-project
    /// imports are tracked by a built-in evaluation-only subscriber.
    pub async fn load(
        cfg: ProviderConfig,
        service: Arc<dyn ConfigurationService>,
        evaluation: Arc<dyn EvaluationSource>,
        catalogs: Arc<dyn CatalogSource>,
        handlers: Vec<Arc<dyn DependencyHandler>>,
    ) -> Result<Arc<Self>, ProviderError> {
        let cancel = CancellationToken::new();
        let updater = SnapshotUpdater::new(&cfg, cancel.child_token());
        let tracker = ContextTracker::new(Arc::clone(&service), cancel.clone());
        // Subscribe before the first context is built: a shape change landing
        // during initialization must still wake the watcher.
        let generation = service.generation();

        let (sink, output) = mpsc::channel(cfg.channel_capacity_clamped());
        let subscribers = vec![
            RuleSubscriber::joint(
                "dependency-rules",
                handlers,
                Arc::clone(&evaluation),
                Arc::clone(&catalogs),
                sink.clone(),
                cfg.channel_capacity_clamped(),
                cancel.clone(),
            ),
            RuleSubscriber::evaluation_only(
                "shared-projects",
                vec![Arc::new(SharedProjectsHandler::new())],
                evaluation,
                catalogs,
                sink,
                cfg.channel_capacity_clamped(),
                cancel.clone(),
            ),
        ];

        let provider = Arc::new(Self {
            state: StdMutex::new(ProviderState::Uninitialized),
            tracker,
            updater,
            subscribers,
            diagnostics: StdMutex::new(Vec::new()),
            cancel,
        });

        provider.set_state(ProviderState::Initializing);
        {
            let gate = provider.tracker.gate();
            let _guard = gate.lock().await;
            let context = provider
                .tracker
                .refresh_within_gate()
                .await?
                .ok_or(ProviderError::Context(ContextError::Service {
                    message: "initial context unavailable".to_string(),
                }))?;
            provider.attach(&context)?;
        }
        provider.set_state(ProviderState::Active);

        provider.spawn_pump(output);
        provider.spawn_generation_watcher(generation);
        tracing::debug!("snapshot provider loaded");
        Ok(provider)
    }

    /// The current snapshot; never null, initially empty.
    pub fn current_snapshot(&self) -> Arc<DependenciesSnapshot> {
        self.updater.current()
    }

    /// Subscribes to the debounced "snapshot changed" stream.
    ///
    /// The stream completes (receivers observe `Closed`) when the provider is
    /// disposed.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DependenciesSnapshot>> {
        self.updater.subscribe()
    }

    /// The current cross-target context; `None` only before the first
    /// successful initialization.
    pub fn current_context(&self) -> Option<Arc<CrossTargetContext>> {
        self.tracker.current()
    }

    /// Looks up the inner configuration serving one framework.
    pub fn configured_project(&self, target: &TargetFramework) -> Option<ConfiguredProject> {
        self.tracker
            .current()
            .and_then(|ctx| ctx.configured_project(target).cloned())
    }

    /// Diagnostics recorded so far (handler and source faults).
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ProviderState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-checks the project's framework set and, when it changed, swaps all
    /// subscriptions as one atomic unit.
    ///
    /// Returns `Ok(true)` when a new context was applied, `Ok(false)` on
    /// short-circuit.
    pub async fn refresh(&self) -> Result<bool, ProviderError> {
        if self.state() == ProviderState::Disposed {
            return Err(ProviderError::Disposed);
        }
        let gate = self.tracker.gate();
        let _guard = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ProviderError::Disposed),
            guard = gate.lock() => guard,
        };
        let before = self.tracker.current();
        let Some(context) = self.tracker.refresh_within_gate().await? else {
            return Ok(false);
        };
        // A spurious generation bump re-checks as already current; keep the
        // existing subscriptions in that case.
        if before.as_ref().is_some_and(|b| Arc::ptr_eq(b, &context)) {
            return Ok(false);
        }

        self.set_state(ProviderState::Refreshing);
        for subscriber in &self.subscribers {
            subscriber.release_subscriptions();
        }
        self.attach(&context)?;
        self.set_state(ProviderState::Active);
        tracing::debug!(
            active = %context.active_target(),
            targets = context.target_frameworks().count(),
            "context refreshed, subscriptions re-attached"
        );
        Ok(true)
    }

    /// Disposes the provider: cancels all work, releases subscriptions, and
    /// completes the notification stream. Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == ProviderState::Disposed {
                return;
            }
            *state = ProviderState::Disposed;
        }
        self.cancel.cancel();
        for subscriber in &self.subscribers {
            subscriber.release_subscriptions();
        }
        self.updater.dispose();
        tracing::debug!("snapshot provider disposed");
    }

    /// Attaches subscriptions for a context and reshapes the snapshot to its
    /// framework set. Caller must hold the gate.
    fn attach(&self, context: &Arc<CrossTargetContext>) -> Result<(), ProviderError> {
        for subscriber in &self.subscribers {
            subscriber.add_subscriptions(context);
        }
        let targets: Vec<TargetFramework> = context.target_frameworks().cloned().collect();
        self.updater
            .try_update(|snapshot| DependenciesSnapshot::set_targets(snapshot, &targets))
            .map_err(|_| ProviderError::Disposed)?;
        Ok(())
    }

    fn set_state(&self, state: ProviderState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Applies subscriber output to the snapshot; one task for all
    /// subscribers.
    fn spawn_pump(self: &Arc<Self>, mut output: mpsc::Receiver<SubscriberOutput>) {
        let me = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    _ = me.cancel.cancelled() => return,
                    item = output.recv() => match item {
                        Some(item) => item,
                        None => return,
                    },
                };
                match item {
                    SubscriberOutput::Changes {
                        target,
                        changes,
                        catalogs,
                    } => {
                        // A change-set from a torn-down generation may still
                        // be in flight; drop it if the current context no
                        // longer recognizes its framework.
                        let recognized = me
                            .tracker
                            .current()
                            .is_some_and(|ctx| ctx.recognizes(&target));
                        if !recognized {
                            tracing::debug!(target = %target, "stale change-set discarded");
                            continue;
                        }
                        let applied = me.updater.try_update(|snapshot| {
                            DependenciesSnapshot::update_slice(
                                snapshot,
                                &target,
                                &changes,
                                Some(&catalogs),
                            )
                        });
                        if applied.is_err() {
                            return; // disposed
                        }
                    }
                    SubscriberOutput::Fault(diag) => {
                        tracing::warn!(
                            kind = diag.kind.as_label(),
                            target = %diag.target,
                            rule = diag.rule.as_deref().unwrap_or("-"),
                            message = %diag.message,
                            "dependency slice degraded"
                        );
                        me.diagnostics
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(diag);
                    }
                }
            }
        });
    }

    /// Reacts to configuration-shape changes reported by the host service.
    fn spawn_generation_watcher(self: &Arc<Self>, mut generation: tokio::sync::watch::Receiver<u64>) {
        let me = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = me.cancel.cancelled() => return,
                    changed = generation.changed() => {
                        if changed.is_err() {
                            return; // service gone
                        }
                    }
                }
                match me.refresh().await {
                    Ok(_) => {}
                    Err(ProviderError::Disposed) => return,
                    Err(err) => {
                        tracing::warn!(error = %err, "context refresh failed");
                    }
                }
            }
        });
    }
}
