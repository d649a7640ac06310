//! # Cross-target context: the current shape of the project.
//!
//! A [`CrossTargetContext`] captures which target frameworks the project
//! currently builds against and which inner per-framework configuration
//! ([`ConfiguredProject`]) serves each of them. The context is immutable and
//! replaced wholesale whenever the framework set changes.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::TargetFramework;

/// Inner per-framework evaluation context.
///
/// One exists per target framework; rule feeds and catalog watches are scoped
/// to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredProject {
    target: TargetFramework,
    configuration: Arc<str>,
}

impl ConfiguredProject {
    /// Builds an inner configuration for one framework.
    pub fn new(target: TargetFramework, configuration: impl Into<Arc<str>>) -> Self {
        Self {
            target,
            configuration: configuration.into(),
        }
    }

    /// The framework this configuration builds against.
    pub fn target(&self) -> &TargetFramework {
        &self.target
    }

    /// The full configuration name (e.g. `Debug|AnyCPU|net6.0`).
    pub fn configuration(&self) -> &str {
        &self.configuration
    }
}

/// Immutable map of target framework → inner configuration, plus the active
/// framework and the single-vs-cross targeting shape.
///
/// Never mutated; the tracker swaps in a brand-new instance when the
/// project's framework set changes.
#[derive(Debug)]
pub struct CrossTargetContext {
    active: TargetFramework,
    targets: HashMap<TargetFramework, ConfiguredProject>,
    cross_targeting: bool,
}

impl CrossTargetContext {
    /// Builds a context from the active framework and its inner
    /// configurations.
    pub fn new(
        active: TargetFramework,
        projects: impl IntoIterator<Item = ConfiguredProject>,
        cross_targeting: bool,
    ) -> Self {
        let targets = projects
            .into_iter()
            .map(|p| (p.target().clone(), p))
            .collect();
        Self {
            active,
            targets,
            cross_targeting,
        }
    }

    /// The currently active target framework.
    pub fn active_target(&self) -> &TargetFramework {
        &self.active
    }

    /// Whether the project builds against more than one framework.
    pub fn is_cross_targeting(&self) -> bool {
        self.cross_targeting
    }

    /// Iterates the known target frameworks (no particular order).
    pub fn target_frameworks(&self) -> impl Iterator<Item = &TargetFramework> {
        self.targets.keys()
    }

    /// Iterates the inner configurations (no particular order).
    pub fn configured_projects(&self) -> impl Iterator<Item = &ConfiguredProject> {
        self.targets.values()
    }

    /// Looks up the inner configuration serving one framework.
    pub fn configured_project(&self, target: &TargetFramework) -> Option<&ConfiguredProject> {
        self.targets.get(target)
    }

    /// Returns true when the framework belongs to this context.
    pub fn recognizes(&self, target: &TargetFramework) -> bool {
        self.targets.contains_key(target)
    }

    /// Compares this context's framework set against a declared set, by
    /// canonical identity.
    pub fn has_same_targets(&self, declared: &[TargetFramework]) -> bool {
        self.targets.len() == declared.len()
            && declared.iter().all(|t| self.targets.contains_key(t))
    }
}
