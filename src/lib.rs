//! # depsnap
//!
//! **depsnap** maintains a live, versioned snapshot of a project's external
//! dependencies (package references, project references, assembly references,
//! shared-project imports) across one or more target frameworks, for
//! presentation in a dependency tree and for use by other build-aware
//! services.
//!
//! Dependency facts arrive incrementally and concurrently from independent
//! producers (one per target framework, one per dependency kind), driven by an
//! external incremental build-evaluation service. depsnap aggregates those
//! partially-overlapping streams into a single consistent, immutable snapshot,
//! republished to consumers without flooding them, while the project's set of
//! target frameworks can itself change at any time and force a full
//! resubscription.
//!
//! ## Architecture
//! ### Overview
//! ```text
//! ┌─────────────────────┐      ┌─────────────────────┐
//! │  EvaluationSource   │      │   CatalogSource     │   (host services)
//! │ (rule data per      │      │ (capabilities +     │
//! │  configuration)     │      │  schema catalogs)   │
//! └──────────┬──────────┘      └──────────┬──────────┘
//!            │ per-config feeds            │ version-aligned watch
//!            ▼                             ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  RuleSubscriber (one per dependency-kind family)              │
//! │  - FilterAdapter per configuration (scrub + stamp + fan-in)   │
//! │  - one serialized worker: skip empty batches, align catalogs, │
//! │    run DependencyHandlers ──► ChangeSetBuilder               │
//! └──────────────────────────────┬────────────────────────────────┘
//!                                │ (TargetFramework, ChangeSet)
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  SnapshotProvider (orchestrator)                              │
//! │  - ContextTracker: framework-set changes, single-flight       │
//! │  - pump: discard stale targets, apply to SnapshotUpdater      │
//! │  - atomic release+add resubscription under the tracker gate   │
//! └──────────────────────────────┬────────────────────────────────┘
//!                                │ locked CAS + debounce
//!                                ▼
//!                  DependenciesSnapshot (immutable,
//!                  structural sharing per framework slice)
//!                                │
//!                                ▼
//!                  subscribe() consumers (UI tree, services)
//! ```
//!
//! ### Lifecycle
//! ```text
//! SnapshotProvider::load()
//!     ├─► first CrossTargetContext (ContextTracker)
//!     ├─► add_subscriptions() per RuleSubscriber
//!     └─► Active: batches flow ──► debounced snapshot notifications
//!
//! framework set changes ──► refresh(): release + re-add subscriptions,
//!                           surviving slices kept by reference
//!
//! dispose() ──► cancellation propagates, stream completes
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types                                    |
//! |-----------------|----------------------------------------------------------|----------------------------------------------|
//! | **Snapshots**   | Immutable framework → slice map, structural sharing.     | [`DependenciesSnapshot`], [`TargetedSnapshot`]|
//! | **Updates**     | Locked CAS updates, debounced notifications.             | [`SnapshotUpdater`]                          |
//! | **Subscribers** | Serialized per-configuration rule processing.            | [`RuleSubscriber`], [`SubscriberOutput`]     |
//! | **Handlers**    | Pluggable per-kind item translation.                     | [`DependencyHandler`], [`RuleHandler`]       |
//! | **Context**     | Canonical framework identity, single-flight refresh.     | [`CrossTargetContext`], [`ContextTracker`]   |
//! | **Errors**      | Typed errors per layer, stable labels.                   | [`ProviderError`], [`SnapshotError`]         |
//!
//! ## Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use depsnap::{DependencyHandler, ProviderConfig, RuleHandler, SnapshotProvider};
//!
//! # async fn demo(service: Arc<dyn depsnap::ConfigurationService>,
//! #               evaluation: Arc<dyn depsnap::EvaluationSource>,
//! #               catalogs: Arc<dyn depsnap::CatalogSource>) -> Result<(), depsnap::ProviderError> {
//! let handlers: Vec<Arc<dyn DependencyHandler>> = vec![Arc::new(
//!     RuleHandler::new("PackageDependency", "PackageReference")
//!         .with_resolved_rule("ResolvedPackageReference"),
//! )];
//!
//! let provider = SnapshotProvider::load(
//!     ProviderConfig::default(),
//!     service,
//!     evaluation,
//!     catalogs,
//!     handlers,
//! )
//! .await?;
//!
//! let mut changes = provider.subscribe();
//! while let Ok(snapshot) = changes.recv().await {
//!     for (target, slice) in snapshot.targets() {
//!         println!("{target}: {} dependencies", slice.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod diag;
mod error;
mod model;
mod provider;
mod snapshot;
mod subscribe;

// ---- Public re-exports ----

pub use config::ProviderConfig;
pub use context::{ConfigurationService, ConfiguredProject, ContextTracker, CrossTargetContext, DeclaredTargets};
pub use diag::{Diagnostic, DiagnosticKind};
pub use error::{ContextError, HandlerError, ProviderError, SnapshotError, SourceFault};
pub use model::{
    ChangeSet, ChangeSetBuilder, DependencyChange, DependencyId, DependencyModel,
    DependencyModelBuilder, IconSet, TargetFramework,
};
pub use provider::{ProviderState, SnapshotProvider};
pub use snapshot::{DependenciesSnapshot, SnapshotUpdater, TargetedSnapshot};
pub use subscribe::{
    CatalogSource, DependencyHandler, EvaluationSource, EvaluationUpdate, RuleChanges, RuleDiff,
    RuleHandler, RuleSubscriber, SharedProjectsHandler, SourceVersion, SubscriberOutput,
    VersionedCatalogs, SHARED_PROJECT_PROVIDER, SHARED_PROJECT_RULE,
};
