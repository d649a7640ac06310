//! # Upstream data-source boundary.
//!
//! depsnap never evaluates a project itself; an external incremental
//! build-evaluation service feeds it per-configuration rule data through
//! [`EvaluationSource`], and a side-channel [`CatalogSource`] supplies the
//! capability/catalog snapshot that must be captured version-aligned with the
//! rule data to interpret it correctly.
//!
//! ## Rules
//! - A rule **absent** from [`EvaluationUpdate::evaluation`] means "no data
//!   for this rule in this batch" — distinct from an item removal, which is
//!   listed in [`RuleDiff::removed`].
//! - `version.ordinal` is the source revision of the batch; the catalog watch
//!   for the same configuration reaches at least that revision eventually.
//! - A feed ending normally (channel closed) is completion, not an error;
//!   unrecoverable failures are delivered as `Err(SourceFault)` items.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::context::ConfiguredProject;
use crate::error::SourceFault;

/// Version stamp of one batch from one configuration's feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceVersion {
    /// The configuration the batch belongs to. Stripped by the filter
    /// adapter before merging, so sibling feeds at different revisions can be
    /// aligned.
    pub configuration: Option<Arc<str>>,
    /// Monotonic revision of the underlying evaluation/build state.
    pub ordinal: u64,
}

impl SourceVersion {
    /// Builds a version stamped with its configuration.
    pub fn new(configuration: impl Into<Arc<str>>, ordinal: u64) -> Self {
        Self {
            configuration: Some(configuration.into()),
            ordinal,
        }
    }
}

/// Difference-from-previous for the items of one rule.
///
/// `items` is the full post-batch snapshot of item name → properties;
/// `added`/`removed`/`changed` describe what moved since the previous batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleDiff {
    /// Current items of the rule after this batch, with their properties.
    pub items: BTreeMap<String, BTreeMap<String, String>>,
    /// Item names added since the previous batch.
    pub added: BTreeSet<String>,
    /// Item names removed since the previous batch.
    pub removed: BTreeSet<String>,
    /// Item names whose properties changed since the previous batch.
    pub changed: BTreeSet<String>,
}

impl RuleDiff {
    /// Returns true when the batch reported any movement for this rule.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.changed.is_empty()
    }

    /// Looks up the current properties of one item.
    pub fn item_properties(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.items.get(name)
    }
}

/// Rule name → per-rule difference.
pub type RuleChanges = BTreeMap<String, RuleDiff>;

/// One batch from one configuration's feed.
#[derive(Debug, Clone, Default)]
pub struct EvaluationUpdate {
    /// Version stamp of this batch.
    pub version: SourceVersion,
    /// Evaluation-scoped rule differences.
    pub evaluation: RuleChanges,
    /// Build-scoped (design-time build) rule differences, when subscribed
    /// jointly.
    pub build: Option<RuleChanges>,
}

impl EvaluationUpdate {
    /// Returns true when any tracked rule reported changes.
    ///
    /// A batch with zero rule changes is the signature of a broken/partial
    /// evaluation and must be skipped, never treated as "everything removed".
    pub fn has_changes(&self) -> bool {
        self.evaluation.values().any(RuleDiff::has_changes)
            || self
                .build
                .as_ref()
                .is_some_and(|rules| rules.values().any(RuleDiff::has_changes))
    }
}

/// Capability/catalog snapshot, version-aligned with rule data.
#[derive(Debug, Clone, Default)]
pub struct VersionedCatalogs {
    /// Source revision this snapshot corresponds to.
    pub version: u64,
    /// Project capabilities active when the items were evaluated.
    pub capabilities: BTreeSet<String>,
    /// Rule name → schema catalog reference, for tree property pages.
    pub catalogs: BTreeMap<String, String>,
}

/// Per-configuration subscribable feed of rule data.
pub trait EvaluationSource: Send + Sync {
    /// Subscribes to the given configuration, filtered to the rule-name
    /// subsets the caller tracks.
    ///
    /// `build_rules` may be empty for evaluation-only subscribers. The
    /// returned receiver yields batches in revision order; dropping it
    /// releases the subscription.
    fn subscribe(
        &self,
        project: &ConfiguredProject,
        evaluation_rules: &[String],
        build_rules: &[String],
    ) -> mpsc::Receiver<Result<EvaluationUpdate, SourceFault>>;
}

/// Per-configuration capability/catalog side channel.
pub trait CatalogSource: Send + Sync {
    /// Watches the catalog snapshot for one configuration.
    ///
    /// The watch value's `version` grows monotonically and eventually reaches
    /// every revision the evaluation feed produces for the same
    /// configuration.
    fn watch(&self, project: &ConfiguredProject) -> watch::Receiver<Arc<VersionedCatalogs>>;
}
