//! # Change-set accumulation with identity-keyed de-duplication.
//!
//! Producers report added/removed dependency facts in batches. The
//! [`ChangeSetBuilder`] accumulates one batch with last-write-wins overwrite
//! per identity and produces an immutable [`ChangeSet`].
//!
//! ## Rules
//! - The same identity added twice in one batch keeps the second occurrence.
//! - Removed-then-re-added (or vice versa) keeps only the final state.
//! - An empty batch builds to `None` so callers can skip no-op notifications.
//!
//! A removal is a separate [`DependencyChange::Removed`] variant carrying only
//! the identity: the full model is not available when something disappears
//! from an evaluation snapshot, and the type system makes any other attribute
//! unreachable.

use std::collections::HashMap;
use std::sync::Arc;

use super::dependency::{DependencyId, DependencyModel};

/// One accumulated change for one identity.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyChange {
    /// The dependency was added or replaced; carries the full model.
    Added(DependencyModel),
    /// The dependency disappeared; only its identity is known.
    Removed(DependencyId),
}

impl DependencyChange {
    /// Returns the identity this change is keyed by.
    pub fn identity(&self) -> &DependencyId {
        match self {
            DependencyChange::Added(model) => model.identity(),
            DependencyChange::Removed(id) => id,
        }
    }
}

/// Immutable batch of added and removed dependency facts.
///
/// Deduplicated per identity; within one set an identity appears in `added`
/// or `removed`, never both.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Facts that were added or replaced, in first-seen order.
    pub added: Vec<DependencyModel>,
    /// Identities that disappeared, in first-seen order.
    pub removed: Vec<DependencyId>,
}

impl ChangeSet {
    /// Returns true when the set carries no changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Accumulates one batch of dependency changes.
///
/// ```
/// use depsnap::{ChangeSetBuilder, DependencyModel};
///
/// let mut builder = ChangeSetBuilder::new();
/// builder.added(DependencyModel::builder("Package", "A").caption("first").build());
/// builder.added(DependencyModel::builder("Package", "A").caption("second").build());
/// let changes = builder.try_build().unwrap();
/// assert_eq!(changes.added.len(), 1);
/// assert_eq!(changes.added[0].caption, "second");
/// ```
#[derive(Debug, Default)]
pub struct ChangeSetBuilder {
    // Insertion order preserved for deterministic output; the map indexes
    // into `order` for last-write-wins overwrite.
    entries: HashMap<DependencyId, usize>,
    order: Vec<DependencyChange>,
}

impl ChangeSetBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an added/replaced dependency, overwriting any prior entry with
    /// the same identity.
    pub fn added(&mut self, model: DependencyModel) {
        self.put(DependencyChange::Added(model));
    }

    /// Records a removal by identity, overwriting any prior entry with the
    /// same identity.
    pub fn removed(&mut self, provider_type: impl Into<Arc<str>>, id: impl Into<Arc<str>>) {
        self.put(DependencyChange::Removed(DependencyId::new(provider_type, id)));
    }

    /// Returns true when nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn put(&mut self, change: DependencyChange) {
        let identity = change.identity().clone();
        match self.entries.get(&identity) {
            Some(&index) => self.order[index] = change,
            None => {
                self.entries.insert(identity, self.order.len());
                self.order.push(change);
            }
        }
    }

    /// Builds the immutable change-set, or `None` when nothing was recorded
    /// (lets callers skip a no-op notification even when a producer fired an
    /// empty event).
    pub fn try_build(self) -> Option<ChangeSet> {
        if self.order.is_empty() {
            return None;
        }
        let mut set = ChangeSet::default();
        for change in self.order {
            match change {
                DependencyChange::Added(model) => set.added.push(model),
                DependencyChange::Removed(id) => set.removed.push(id),
            }
        }
        Some(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str, caption: &str) -> DependencyModel {
        DependencyModel::builder("Package", id).caption(caption).build()
    }

    #[test]
    fn test_empty_builder_yields_none() {
        assert!(ChangeSetBuilder::new().try_build().is_none());
    }

    #[test]
    fn test_duplicate_add_last_write_wins() {
        let mut builder = ChangeSetBuilder::new();
        builder.added(model("X", "attr-a"));
        builder.added(model("X", "attr-b"));
        let set = builder.try_build().unwrap();
        assert_eq!(set.added.len(), 1);
        assert_eq!(set.added[0].caption, "attr-b");
        assert!(set.removed.is_empty());
    }

    #[test]
    fn test_remove_then_re_add_keeps_final_state() {
        let mut builder = ChangeSetBuilder::new();
        builder.removed("Package", "X");
        builder.added(model("X", "fresh"));
        let set = builder.try_build().unwrap();
        assert!(set.removed.is_empty());
        assert_eq!(set.added.len(), 1);
        assert_eq!(set.added[0].caption, "fresh");
    }

    #[test]
    fn test_add_then_remove_keeps_removal_only() {
        let mut builder = ChangeSetBuilder::new();
        builder.added(model("X", "gone"));
        builder.removed("Package", "X");
        let set = builder.try_build().unwrap();
        assert!(set.added.is_empty());
        assert_eq!(set.removed, vec![DependencyId::new("Package", "X")]);
    }

    #[test]
    fn test_distinct_provider_types_do_not_collide() {
        let mut builder = ChangeSetBuilder::new();
        builder.added(model("X", "pkg"));
        builder.removed("Project", "X");
        let set = builder.try_build().unwrap();
        assert_eq!(set.added.len(), 1);
        assert_eq!(set.removed.len(), 1);
    }

    #[test]
    fn test_removal_carries_identity_only() {
        // The Removed variant is a bare DependencyId: there is no attribute
        // to read besides identity, by construction.
        let change = DependencyChange::Removed(DependencyId::new("Package", "X"));
        match change {
            DependencyChange::Removed(id) => {
                assert_eq!(&*id.provider_type, "Package");
                assert_eq!(&*id.id, "X");
            }
            DependencyChange::Added(_) => panic!("expected removal"),
        }
    }
}
