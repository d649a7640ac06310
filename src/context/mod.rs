//! Cross-target context: which frameworks exist and who serves them.
//!
//! ## Contents
//! - [`CrossTargetContext`], [`ConfiguredProject`] immutable context data
//! - [`ContextTracker`] change detection, single-flight refresh
//! - [`ConfigurationService`], [`DeclaredTargets`] host service boundary
//!
//! The tracker never mutates a context; when the project's framework set
//! changes it asks the service for a brand-new one and swaps it in. The
//! provider reacts to the swap by tearing down and re-attaching all rule
//! subscriptions.

mod context;
mod service;
mod tracker;

pub use context::{ConfiguredProject, CrossTargetContext};
pub use service::{ConfigurationService, DeclaredTargets};
pub use tracker::ContextTracker;
