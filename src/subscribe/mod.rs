//! Subscriber engine: from raw rule data to dependency change-sets.
//!
//! ## Contents
//! - [`EvaluationSource`], [`CatalogSource`] upstream trait boundary
//! - [`EvaluationUpdate`], [`RuleDiff`], [`VersionedCatalogs`] wire-in types
//! - `FilterAdapter` (internal) scrubs per-configuration feeds for fan-in
//! - [`DependencyHandler`] pluggable per-kind translation contract, plus the
//!   built-in [`RuleHandler`] and [`SharedProjectsHandler`]
//! - [`RuleSubscriber`] the generic serialized engine
//!
//! ## Quick reference
//! - **Producers**: host evaluation/build service, one feed per inner
//!   configuration.
//! - **Consumer**: the owning [`SnapshotProvider`](crate::SnapshotProvider),
//!   via [`SubscriberOutput`].

mod engine;
mod filter;
mod handler;
mod source;

pub use engine::{RuleSubscriber, SubscriberOutput};
pub use handler::{
    DependencyHandler, RuleHandler, SharedProjectsHandler, SHARED_PROJECT_PROVIDER,
    SHARED_PROJECT_RULE,
};
pub use source::{
    CatalogSource, EvaluationSource, EvaluationUpdate, RuleChanges, RuleDiff, SourceVersion,
    VersionedCatalogs,
};
