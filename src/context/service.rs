//! # Active-configuration service boundary.
//!
//! The host exposes the project's current set of configurations through
//! [`ConfigurationService`]; depsnap never computes frameworks itself. The
//! trait also carries a generation watch so the provider hears about shape
//! changes without polling.

use async_trait::async_trait;
use tokio::sync::watch;

use super::context::CrossTargetContext;
use crate::error::ContextError;
use crate::model::TargetFramework;

/// The framework set a project currently declares.
#[derive(Debug, Clone)]
pub struct DeclaredTargets {
    /// The currently active framework.
    pub active: TargetFramework,
    /// All declared frameworks (contains `active`).
    pub frameworks: Vec<TargetFramework>,
    /// Whether the project is cross-targeting.
    pub cross_targeting: bool,
}

impl DeclaredTargets {
    /// Builds a single-targeting declaration.
    pub fn single(active: TargetFramework) -> Self {
        Self {
            frameworks: vec![active.clone()],
            active,
            cross_targeting: false,
        }
    }

    /// Builds a cross-targeting declaration.
    pub fn cross(active: TargetFramework, frameworks: Vec<TargetFramework>) -> Self {
        Self {
            active,
            frameworks,
            cross_targeting: true,
        }
    }
}

/// External active-configuration service.
///
/// ### Contract
/// - [`declared`](Self::declared) is a cheap read of the currently declared
///   framework set; the tracker uses it to short-circuit no-op refreshes.
/// - [`refresh_active`](Self::refresh_active) forces the host to re-resolve
///   the active configuration. On hosts with a UI thread this may transfer
///   control to a designated coordination context; implementations without
///   one may treat it as a no-op serialization point.
/// - [`create_context`](Self::create_context) constructs a brand-new
///   [`CrossTargetContext`] from current project state; called at most once
///   per refresh (single-flight is enforced by the tracker).
/// - [`generation`](Self::generation) is bumped whenever the declared shape
///   may have changed; the provider reacts by attempting a refresh.
#[async_trait]
pub trait ConfigurationService: Send + Sync {
    /// Reads the currently declared framework set.
    fn declared(&self) -> DeclaredTargets;

    /// Forces the host to re-resolve the currently active configuration.
    async fn refresh_active(&self) -> Result<(), ContextError>;

    /// Constructs a brand-new cross-target context from current state.
    async fn create_context(&self) -> Result<CrossTargetContext, ContextError>;

    /// Watch channel bumped on every potential configuration change.
    fn generation(&self) -> watch::Receiver<u64>;
}
