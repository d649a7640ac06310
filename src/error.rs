//! Error types used by the depsnap runtime and handlers.
//!
//! This module defines the error enums for each layer of the pipeline:
//!
//! - [`ProviderError`] — errors raised by the snapshot provider orchestration.
//! - [`ContextError`] — errors raised while refreshing the cross-target context.
//! - [`SnapshotError`] — errors raised by the snapshot updater.
//! - [`HandlerError`] — errors raised by dependency-kind handlers.
//! - [`SourceFault`] — an unrecoverable fault reported by an upstream feed.
//!
//! All types provide `as_label()` for stable snake_case labels in logs/metrics.

use thiserror::Error;

/// # Errors produced by the snapshot provider.
///
/// These represent failures of the orchestration layer itself, such as calls
/// into a provider that has already been disposed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider has been disposed; no further operations are accepted.
    #[error("snapshot provider is disposed")]
    Disposed,

    /// Context refresh failed while (re)initializing subscriptions.
    #[error("context refresh failed: {0}")]
    Context(#[from] ContextError),
}

impl ProviderError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ProviderError::Disposed => "provider_disposed",
            ProviderError::Context(_) => "provider_context_failed",
        }
    }
}

/// # Errors produced during cross-target context refresh.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ContextError {
    /// The owning project was unloaded while a refresh was waiting or running.
    #[error("context tracker is disposed")]
    Disposed,

    /// The active-configuration service failed to refresh or build a context.
    #[error("configuration service failed: {message}")]
    Service {
        /// The underlying service error message.
        message: String,
    },
}

impl ContextError {
    /// Builds a [`ContextError::Service`] from any displayable error.
    pub fn service(err: impl std::fmt::Display) -> Self {
        ContextError::Service {
            message: err.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ContextError::Disposed => "context_disposed",
            ContextError::Service { .. } => "context_service_failed",
        }
    }
}

/// # Errors produced by the snapshot updater.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The updater has been disposed; `try_update` calls fail fast.
    #[error("snapshot updater is disposed")]
    Disposed,
}

impl SnapshotError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SnapshotError::Disposed => "snapshot_disposed",
        }
    }
}

/// # Errors produced by dependency-kind handlers.
///
/// A handler failure stops further updates for the affected configuration
/// only; sibling subscribers keep operating (partial degradation).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler failed while translating items of one rule.
    #[error("handler failed for rule {rule}: {message}")]
    Rule {
        /// The upstream rule whose items were being translated.
        rule: String,
        /// The underlying failure message.
        message: String,
    },
}

impl HandlerError {
    /// Builds a [`HandlerError::Rule`] for the given rule name.
    pub fn rule(rule: impl Into<String>, message: impl std::fmt::Display) -> Self {
        HandlerError::Rule {
            rule: rule.into(),
            message: message.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Rule { .. } => "handler_rule_failed",
        }
    }
}

/// # Unrecoverable fault reported by an upstream data feed.
///
/// A fault terminates the merged feed for its subscriber so the aggregate
/// fails fast instead of hanging; ordinary feed completion does not produce one.
#[derive(Error, Debug, Clone)]
#[error("unrecoverable source fault: {message}")]
pub struct SourceFault {
    /// The underlying fault message.
    pub message: String,
}

impl SourceFault {
    /// Builds a fault from any displayable error.
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
