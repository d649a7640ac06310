//! # Generic rule-subscriber engine.
//!
//! A [`RuleSubscriber`] owns everything needed to turn raw evaluation data
//! for one set of rule names into dependency change-sets: per-configuration
//! feeds scrubbed by [`FilterAdapter`]s, one fan-in channel, and one worker
//! task that drains it strictly in order.
//!
//! ## Architecture
//! ```text
//! add_subscriptions(context)
//!     │
//!     ├─► per configured project:
//!     │      EvaluationSource::subscribe(rules) ──► FilterAdapter ──┐
//!     │      CatalogSource::watch(project)      ──────────────┐    │
//!     │                                                       ▼    ▼
//!     └─► worker task ◄───────────────────────────── [fan-in channel]
//!            │
//!            ├─ zero rule changes ──► skip batch        (broken evaluation)
//!            ├─ wait catalogs.version ≥ batch.version   (version alignment)
//!            ├─ run every applicable handler ──► ChangeSetBuilder
//!            └─ try_build() ──► sink: (target, ChangeSet, catalogs)
//! ```
//!
//! ## Rules
//! - One worker per subscriber: batches for one inner configuration never
//!   overlap (processing is strictly serialized).
//! - A handler error stops further updates **for that configuration only**;
//!   other configurations of the same subscriber, and sibling subscribers,
//!   keep operating.
//! - Every wait observes the generation token; cancellation aborts in-flight
//!   work without publishing a partial change-set.
//! - `add_subscriptions`/`release_subscriptions` must not be called
//!   concurrently; the owning provider serializes the pair under its gate.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::filter::{FeedItem, FilterAdapter};
use super::handler::DependencyHandler;
use super::source::{CatalogSource, EvaluationSource, VersionedCatalogs};
use crate::context::CrossTargetContext;
use crate::diag::{Diagnostic, DiagnosticKind};
use crate::model::{ChangeSet, ChangeSetBuilder, TargetFramework};

/// Output of one subscriber, forwarded to the owning provider.
#[derive(Debug)]
pub enum SubscriberOutput {
    /// A built change-set for one framework, with the catalogs captured
    /// version-aligned with it.
    Changes {
        /// The framework whose slice the changes apply to.
        target: TargetFramework,
        /// The deduplicated batch of adds/removes.
        changes: ChangeSet,
        /// Catalog snapshot aligned with the batch's source revision.
        catalogs: Arc<VersionedCatalogs>,
    },
    /// A recorded degradation (handler or source fault).
    Fault(Diagnostic),
}

/// One subscription generation: torn down wholesale on context change.
struct Generation {
    token: CancellationToken,
    adapters: Vec<FilterAdapter>,
    worker: JoinHandle<()>,
}

/// Generic engine binding rule names and handlers to one serialized worker.
pub struct RuleSubscriber {
    kind: &'static str,
    handlers: Vec<Arc<dyn DependencyHandler>>,
    joint: bool,
    evaluation: Arc<dyn EvaluationSource>,
    catalogs: Arc<dyn CatalogSource>,
    sink: mpsc::Sender<SubscriberOutput>,
    channel_capacity: usize,
    cancel: CancellationToken,
    generation: StdMutex<Option<Generation>>,
}

impl RuleSubscriber {
    /// Creates a subscriber tracking evaluation rules only.
    pub fn evaluation_only(
        kind: &'static str,
        handlers: Vec<Arc<dyn DependencyHandler>>,
        evaluation: Arc<dyn EvaluationSource>,
        catalogs: Arc<dyn CatalogSource>,
        sink: mpsc::Sender<SubscriberOutput>,
        channel_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(kind, handlers, false, evaluation, catalogs, sink, channel_capacity, cancel)
    }

    /// Creates a subscriber tracking evaluation and design-time-build rules
    /// jointly.
    pub fn joint(
        kind: &'static str,
        handlers: Vec<Arc<dyn DependencyHandler>>,
        evaluation: Arc<dyn EvaluationSource>,
        catalogs: Arc<dyn CatalogSource>,
        sink: mpsc::Sender<SubscriberOutput>,
        channel_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(kind, handlers, true, evaluation, catalogs, sink, channel_capacity, cancel)
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        kind: &'static str,
        handlers: Vec<Arc<dyn DependencyHandler>>,
        joint: bool,
        evaluation: Arc<dyn EvaluationSource>,
        catalogs: Arc<dyn CatalogSource>,
        sink: mpsc::Sender<SubscriberOutput>,
        channel_capacity: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            kind,
            handlers,
            joint,
            evaluation,
            catalogs,
            sink,
            channel_capacity: channel_capacity.max(1),
            cancel,
            generation: StdMutex::new(None),
        }
    }

    /// Short name of this subscriber for logs/diagnostics.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The evaluation-scoped rule names this subscriber tracks.
    pub fn evaluation_rules(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.handlers.iter().map(|h| h.evaluation_rule()).collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// The build-scoped rule names this subscriber tracks (empty unless
    /// joint).
    pub fn build_rules(&self) -> Vec<String> {
        if !self.joint {
            return Vec::new();
        }
        let names: BTreeSet<&str> = self
            .handlers
            .iter()
            .filter_map(|h| h.resolved_rule())
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Attaches feeds for every configured project in the context and starts
    /// the worker.
    ///
    /// Any previous generation must have been released first; the provider
    /// serializes release-then-add under its gate.
    pub fn add_subscriptions(&self, context: &CrossTargetContext) {
        let token = self.cancel.child_token();
        let evaluation_rules = self.evaluation_rules();
        let build_rules = self.build_rules();

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let mut adapters = Vec::new();
        let mut watches = HashMap::new();
        for project in context.configured_projects() {
            let feed = self
                .evaluation
                .subscribe(project, &evaluation_rules, &build_rules);
            adapters.push(FilterAdapter::attach(
                project.target().clone(),
                feed,
                tx.clone(),
                token.clone(),
            ));
            watches.insert(project.target().clone(), self.catalogs.watch(project));
        }
        drop(tx); // the adapters hold the only sender clones

        let worker = tokio::spawn(run_worker(
            self.kind,
            rx,
            watches,
            self.handlers.clone(),
            self.sink.clone(),
            token.clone(),
        ));

        let previous = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Generation {
                token,
                adapters,
                worker,
            });
        debug_assert!(previous.is_none(), "add without release");
        if let Some(previous) = previous {
            previous.token.cancel();
        }
    }

    /// Tears down the current generation: cancels the worker and detaches
    /// every adapter. In-flight work completes or cancels without corrupting
    /// state.
    pub fn release_subscriptions(&self) {
        let generation = self
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(generation) = generation {
            generation.token.cancel();
            for adapter in generation.adapters {
                adapter.detach();
            }
            drop(generation.worker);
        }
    }
}

/// Drains the fan-in channel; strictly serialized per subscriber.
async fn run_worker(
    kind: &'static str,
    mut rx: mpsc::Receiver<FeedItem>,
    mut watches: HashMap<TargetFramework, watch::Receiver<Arc<VersionedCatalogs>>>,
    handlers: Vec<Arc<dyn DependencyHandler>>,
    sink: mpsc::Sender<SubscriberOutput>,
    token: CancellationToken,
) {
    // Configurations whose handler faulted; their batches are dropped while
    // the rest of the subscriber keeps operating.
    let mut dead: HashSet<TargetFramework> = HashSet::new();

    loop {
        let item = tokio::select! {
            _ = token.cancelled() => return,
            item = rx.recv() => match item {
                Some(item) => item,
                None => return, // every adapter completed
            },
        };

        match item {
            FeedItem::Fault { target, fault } => {
                tracing::error!(
                    subscriber = kind,
                    target = %target,
                    error = %fault,
                    "upstream feed faulted"
                );
                let _ = sink
                    .send(SubscriberOutput::Fault(Diagnostic {
                        kind: DiagnosticKind::SourceFault,
                        target,
                        rule: None,
                        message: fault.message,
                    }))
                    .await;
                return;
            }
            FeedItem::Update(batch) => {
                if dead.contains(&batch.target) {
                    continue;
                }
                // A batch with zero rule changes signals a broken/partial
                // evaluation; "no data" never means "everything removed".
                if !batch.update.has_changes() {
                    tracing::debug!(subscriber = kind, target = %batch.target, "empty batch skipped");
                    continue;
                }

                let catalogs = match align_catalogs(
                    watches.get_mut(&batch.target),
                    batch.update.version.ordinal,
                    &token,
                )
                .await
                {
                    Some(catalogs) => catalogs,
                    None => return, // cancelled mid-wait
                };

                let mut builder = ChangeSetBuilder::new();
                let mut faulted = None;
                for handler in &handlers {
                    if !handler.applies_to(&catalogs.capabilities) {
                        continue;
                    }
                    let evaluation = batch.update.evaluation.get(handler.evaluation_rule());
                    let build = handler.resolved_rule().and_then(|rule| {
                        batch.update.build.as_ref().and_then(|rules| rules.get(rule))
                    });
                    let result = tokio::select! {
                        _ = token.cancelled() => return,
                        res = handler.handle(evaluation, build, &batch.target, &mut builder) => res,
                    };
                    if let Err(err) = result {
                        faulted = Some((handler.evaluation_rule().to_string(), err));
                        break;
                    }
                }

                if let Some((rule, err)) = faulted {
                    tracing::error!(
                        subscriber = kind,
                        target = %batch.target,
                        rule = %rule,
                        error = %err,
                        "handler failed; configuration updates stopped"
                    );
                    dead.insert(batch.target.clone());
                    let _ = sink
                        .send(SubscriberOutput::Fault(Diagnostic {
                            kind: DiagnosticKind::HandlerFault,
                            target: batch.target,
                            rule: Some(rule),
                            message: err.to_string(),
                        }))
                        .await;
                    continue;
                }

                if let Some(changes) = builder.try_build() {
                    let output = SubscriberOutput::Changes {
                        target: batch.target,
                        changes,
                        catalogs,
                    };
                    if sink.send(output).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Waits until the catalog watch reaches the batch's source revision.
///
/// Returns `None` only on cancellation. A closed or missing watch falls back
/// to the last known value so a torn-down catalog source cannot wedge the
/// worker.
async fn align_catalogs(
    rx: Option<&mut watch::Receiver<Arc<VersionedCatalogs>>>,
    needed: u64,
    token: &CancellationToken,
) -> Option<Arc<VersionedCatalogs>> {
    let Some(rx) = rx else {
        return Some(Arc::new(VersionedCatalogs::default()));
    };
    let aligned = tokio::select! {
        _ = token.cancelled() => return None,
        res = rx.wait_for(|catalogs| catalogs.version >= needed) => {
            res.map(|guard| Arc::clone(&guard))
        }
    };
    Some(aligned.unwrap_or_else(|_| rx.borrow().clone()))
}
