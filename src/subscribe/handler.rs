//! # Dependency-kind handlers.
//!
//! A handler translates the rule items of one dependency kind into
//! [`DependencyModel`] adds/removes. Handlers are supplied to the provider as
//! an explicit, ordered list and filtered per batch by a capability
//! predicate; the subscriber engine runs every applicable handler over the
//! same batch so one project-item batch is interpreted consistently.
//!
//! ## Contract
//! - A handler declares the evaluation rule it reads and, optionally, the
//!   design-time-build rule carrying resolved items.
//! - `handle` receives the per-rule diffs (either may be absent — missing
//!   optional rules must be tolerated, never an error), the target framework
//!   being updated, and the batch's [`ChangeSetBuilder`].
//! - A handler calls [`ChangeSetBuilder::added`]/[`removed`](ChangeSetBuilder::removed)
//!   zero or more times; returning an error stops further updates for the
//!   affected configuration only.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use super::source::RuleDiff;
use crate::error::HandlerError;
use crate::model::{ChangeSetBuilder, DependencyModel, IconSet, TargetFramework};

/// Pluggable translation of one dependency kind.
#[async_trait]
pub trait DependencyHandler: Send + Sync + 'static {
    /// The provider type of the models this handler produces.
    fn provider_type(&self) -> &str;

    /// The evaluation rule whose items this handler reads.
    fn evaluation_rule(&self) -> &str;

    /// The build rule carrying resolved items, when the kind has one.
    fn resolved_rule(&self) -> Option<&str> {
        None
    }

    /// Whether this handler applies under the given project capabilities.
    fn applies_to(&self, _capabilities: &BTreeSet<String>) -> bool {
        true
    }

    /// Translates one batch's diffs into dependency changes.
    async fn handle(
        &self,
        evaluation: Option<&RuleDiff>,
        build: Option<&RuleDiff>,
        target: &TargetFramework,
        builder: &mut ChangeSetBuilder,
    ) -> Result<(), HandlerError>;
}

/// Data-driven handler for the common rule-pair shape.
///
/// Covers dependency kinds whose evaluation rule lists declared items and
/// whose build rule lists the resolved form of the same items (packages,
/// project references, assembly references). Evaluation items map to
/// unresolved models; a build item for the same id upgrades it to resolved.
///
/// ```
/// use depsnap::RuleHandler;
///
/// let packages = RuleHandler::new("PackageDependency", "PackageReference")
///     .with_resolved_rule("ResolvedPackageReference")
///     .with_flag("PackageDependencyGroup");
/// ```
pub struct RuleHandler {
    provider_type: Arc<str>,
    evaluation_rule: String,
    resolved_rule: Option<String>,
    flags: BTreeSet<Arc<str>>,
    icon: IconSet,
    required_capability: Option<String>,
}

impl RuleHandler {
    /// Creates a handler for one provider type and its evaluation rule.
    pub fn new(provider_type: impl Into<Arc<str>>, evaluation_rule: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            evaluation_rule: evaluation_rule.into(),
            resolved_rule: None,
            flags: BTreeSet::new(),
            icon: IconSet::default(),
            required_capability: None,
        }
    }

    /// Adds the design-time-build rule carrying resolved items.
    pub fn with_resolved_rule(mut self, rule: impl Into<String>) -> Self {
        self.resolved_rule = Some(rule.into());
        self
    }

    /// Adds one tree-placement flag to every produced model.
    pub fn with_flag(mut self, flag: impl Into<Arc<str>>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    /// Sets the icon set of every produced model.
    pub fn with_icon(mut self, icon: IconSet) -> Self {
        self.icon = icon;
        self
    }

    /// Restricts the handler to projects declaring the given capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.required_capability = Some(capability.into());
        self
    }

    fn model(&self, id: &str, diff: &RuleDiff, resolved: bool) -> DependencyModel {
        let props = diff.item_properties(id);
        let implicit = props
            .and_then(|p| p.get("IsImplicitlyDefined"))
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let visible = props
            .and_then(|p| p.get("Visible"))
            .map_or(true, |v| !v.eq_ignore_ascii_case("false"));
        let path = props
            .and_then(|p| p.get("Path"))
            .cloned()
            .unwrap_or_else(|| id.to_string());

        let mut builder = DependencyModel::builder(Arc::clone(&self.provider_type), id)
            .path(path)
            .resolved(resolved)
            .implicit(implicit)
            .visible(visible)
            .icon(self.icon.clone())
            .flags(self.flags.clone());
        if let Some(props) = props {
            builder = builder.properties(props.clone());
        }
        builder.build()
    }
}

#[async_trait]
impl DependencyHandler for RuleHandler {
    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    fn evaluation_rule(&self) -> &str {
        &self.evaluation_rule
    }

    fn resolved_rule(&self) -> Option<&str> {
        self.resolved_rule.as_deref()
    }

    fn applies_to(&self, capabilities: &BTreeSet<String>) -> bool {
        match &self.required_capability {
            Some(capability) => capabilities.contains(capability),
            None => true,
        }
    }

    async fn handle(
        &self,
        evaluation: Option<&RuleDiff>,
        build: Option<&RuleDiff>,
        _target: &TargetFramework,
        builder: &mut ChangeSetBuilder,
    ) -> Result<(), HandlerError> {
        if let Some(eval) = evaluation {
            for id in &eval.removed {
                builder.removed(Arc::clone(&self.provider_type), id.as_str());
            }
            for id in eval.added.iter().chain(&eval.changed) {
                builder.added(self.model(id, eval, false));
            }
        }
        // Build entries come second: last-write-wins upgrades an unresolved
        // evaluation model to its resolved form within the same batch.
        if let Some(resolved) = build {
            for id in &resolved.removed {
                match evaluation.filter(|e| e.items.contains_key(id)) {
                    // Still declared: fall back to the unresolved model.
                    Some(eval) => builder.added(self.model(id, eval, false)),
                    None => builder.removed(Arc::clone(&self.provider_type), id.as_str()),
                }
            }
            for id in resolved.added.iter().chain(&resolved.changed) {
                builder.added(self.model(id, resolved, true));
            }
        }
        Ok(())
    }
}

/// Handler for shared-project imports.
///
/// Shared projects surface through an evaluation-only import rule; an import
/// present in the batch is by definition resolved. The model's caption is the
/// import's file stem so the tree shows `Shared` rather than a full path.
pub struct SharedProjectsHandler {
    flags: BTreeSet<Arc<str>>,
}

/// Rule listing shared-project import items.
pub const SHARED_PROJECT_RULE: &str = "SharedProjectImport";

/// Provider type of shared-project dependency nodes.
pub const SHARED_PROJECT_PROVIDER: &str = "SharedProjectDependency";

impl SharedProjectsHandler {
    /// Creates the handler with the default tree-placement flag.
    pub fn new() -> Self {
        let mut flags = BTreeSet::new();
        flags.insert(Arc::from("SharedProjectDependencyGroup"));
        Self { flags }
    }
}

impl Default for SharedProjectsHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    name.strip_suffix(".projitems").unwrap_or(name)
}

#[async_trait]
impl DependencyHandler for SharedProjectsHandler {
    fn provider_type(&self) -> &str {
        SHARED_PROJECT_PROVIDER
    }

    fn evaluation_rule(&self) -> &str {
        SHARED_PROJECT_RULE
    }

    async fn handle(
        &self,
        evaluation: Option<&RuleDiff>,
        _build: Option<&RuleDiff>,
        _target: &TargetFramework,
        builder: &mut ChangeSetBuilder,
    ) -> Result<(), HandlerError> {
        let Some(eval) = evaluation else {
            return Ok(());
        };
        for path in &eval.removed {
            builder.removed(SHARED_PROJECT_PROVIDER, path.as_str());
        }
        for path in eval.added.iter().chain(&eval.changed) {
            builder.added(
                DependencyModel::builder(SHARED_PROJECT_PROVIDER, path.as_str())
                    .caption(file_stem(path))
                    .path(path.clone())
                    .resolved(true)
                    .flags(self.flags.clone())
                    .build(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn diff(added: &[&str], removed: &[&str]) -> RuleDiff {
        let mut d = RuleDiff::default();
        for id in added {
            d.added.insert(id.to_string());
            d.items.insert(id.to_string(), BTreeMap::new());
        }
        for id in removed {
            d.removed.insert(id.to_string());
        }
        d
    }

    fn tf() -> TargetFramework {
        TargetFramework::new("net6.0")
    }

    #[tokio::test]
    async fn test_evaluation_only_item_is_unresolved() {
        let handler = RuleHandler::new("PackageDependency", "PackageReference")
            .with_resolved_rule("ResolvedPackageReference");
        let mut builder = ChangeSetBuilder::new();
        handler
            .handle(Some(&diff(&["PkgA"], &[])), None, &tf(), &mut builder)
            .await
            .unwrap();
        let set = builder.try_build().unwrap();
        assert_eq!(set.added.len(), 1);
        assert!(!set.added[0].resolved);
    }

    #[tokio::test]
    async fn test_build_item_upgrades_to_resolved() {
        let handler = RuleHandler::new("PackageDependency", "PackageReference")
            .with_resolved_rule("ResolvedPackageReference");
        let mut builder = ChangeSetBuilder::new();
        handler
            .handle(
                Some(&diff(&["PkgA"], &[])),
                Some(&diff(&["PkgA"], &[])),
                &tf(),
                &mut builder,
            )
            .await
            .unwrap();
        let set = builder.try_build().unwrap();
        assert_eq!(set.added.len(), 1);
        assert!(set.added[0].resolved);
    }

    #[tokio::test]
    async fn test_build_removal_falls_back_to_unresolved_when_still_declared() {
        let handler = RuleHandler::new("PackageDependency", "PackageReference")
            .with_resolved_rule("ResolvedPackageReference");
        let mut still_declared = diff(&[], &[]);
        still_declared.items.insert("PkgA".into(), BTreeMap::new());

        let mut builder = ChangeSetBuilder::new();
        handler
            .handle(
                Some(&still_declared),
                Some(&diff(&[], &["PkgA"])),
                &tf(),
                &mut builder,
            )
            .await
            .unwrap();
        let set = builder.try_build().unwrap();
        assert_eq!(set.added.len(), 1);
        assert!(!set.added[0].resolved);
        assert!(set.removed.is_empty());
    }

    #[tokio::test]
    async fn test_missing_rules_are_tolerated() {
        let handler = RuleHandler::new("PackageDependency", "PackageReference");
        let mut builder = ChangeSetBuilder::new();
        handler.handle(None, None, &tf(), &mut builder).await.unwrap();
        assert!(builder.try_build().is_none());
    }

    #[tokio::test]
    async fn test_capability_predicate_filters() {
        let handler =
            RuleHandler::new("AnalyzerDependency", "Analyzer").with_capability("AnalyzerSupport");
        let mut caps = BTreeSet::new();
        assert!(!handler.applies_to(&caps));
        caps.insert("AnalyzerSupport".to_string());
        assert!(handler.applies_to(&caps));
    }

    #[tokio::test]
    async fn test_shared_project_caption_is_file_stem() {
        let handler = SharedProjectsHandler::new();
        let mut builder = ChangeSetBuilder::new();
        handler
            .handle(
                Some(&diff(&["../Shared/Common.projitems"], &[])),
                None,
                &tf(),
                &mut builder,
            )
            .await
            .unwrap();
        let set = builder.try_build().unwrap();
        assert_eq!(set.added[0].caption, "Common");
        assert!(set.added[0].resolved);
    }

    #[tokio::test]
    async fn test_shared_project_removal_by_path_identity() {
        let handler = SharedProjectsHandler::new();
        let mut builder = ChangeSetBuilder::new();
        handler
            .handle(
                Some(&diff(&[], &["../Shared/Common.projitems"])),
                None,
                &tf(),
                &mut builder,
            )
            .await
            .unwrap();
        let set = builder.try_build().unwrap();
        assert_eq!(set.removed.len(), 1);
        assert_eq!(&*set.removed[0].id, "../Shared/Common.projitems");
    }
}
