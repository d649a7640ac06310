//! # One framework's slice of the dependencies snapshot.
//!
//! A [`TargetedSnapshot`] holds the dependency nodes of one target framework,
//! grouped by provider type, plus the catalog snapshot needed for tree
//! property pages. Slices are immutable; applying a change-set yields either
//! a new slice or, on a no-op, the same `Arc` so callers can use pointer
//! equality to detect "did anything change".

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{ChangeSet, DependencyModel, TargetFramework};
use crate::subscribe::VersionedCatalogs;

/// Immutable dependency state of one target framework.
#[derive(Debug)]
pub struct TargetedSnapshot {
    target: TargetFramework,
    // Ordered by group (provider type) so tree rendering is deterministic;
    // models within a group keep first-seen order.
    groups: BTreeMap<Arc<str>, Vec<Arc<DependencyModel>>>,
    catalogs: Option<Arc<VersionedCatalogs>>,
}

impl TargetedSnapshot {
    /// Creates an empty slice for one framework.
    pub fn empty(target: TargetFramework) -> Arc<Self> {
        Arc::new(Self {
            target,
            groups: BTreeMap::new(),
            catalogs: None,
        })
    }

    /// The framework this slice belongs to.
    pub fn target(&self) -> &TargetFramework {
        &self.target
    }

    /// Iterates groups in provider-type order.
    pub fn groups(&self) -> impl Iterator<Item = (&Arc<str>, &[Arc<DependencyModel>])> {
        self.groups.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Returns the nodes of one group.
    pub fn group(&self, provider_type: &str) -> &[Arc<DependencyModel>] {
        self.groups
            .get(provider_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Looks up a node by provider type and id.
    pub fn find(&self, provider_type: &str, id: &str) -> Option<&Arc<DependencyModel>> {
        self.groups
            .get(provider_type)?
            .iter()
            .find(|m| &*m.identity.id == id)
    }

    /// Total node count across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Returns true when no group has any node.
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// The catalog snapshot captured with the latest applied batch.
    pub fn catalogs(&self) -> Option<&Arc<VersionedCatalogs>> {
        self.catalogs.as_ref()
    }

    /// Applies one change-set, producing a new slice or returning `self`
    /// pointer-identically when nothing materially changed.
    ///
    /// Material change means: a removal that removed an existing node, an
    /// addition whose model differs from the existing one, or a catalog
    /// snapshot replacement.
    pub fn apply(
        self: &Arc<Self>,
        changes: &ChangeSet,
        catalogs: Option<&Arc<VersionedCatalogs>>,
    ) -> Arc<Self> {
        let mut groups = self.groups.clone();
        let mut changed = false;

        for id in &changes.removed {
            if let Some(group) = groups.get_mut(&id.provider_type) {
                let before = group.len();
                group.retain(|m| m.identity.id != id.id);
                if group.len() != before {
                    changed = true;
                }
                if group.is_empty() {
                    groups.remove(&id.provider_type);
                }
            }
        }

        for model in &changes.added {
            let group = groups
                .entry(Arc::clone(&model.identity.provider_type))
                .or_default();
            match group.iter_mut().find(|m| m.identity.id == model.identity.id) {
                Some(existing) if **existing == *model => {}
                Some(existing) => {
                    *existing = Arc::new(model.clone());
                    changed = true;
                }
                None => {
                    group.push(Arc::new(model.clone()));
                    changed = true;
                }
            }
        }

        let catalogs_changed = match (catalogs, &self.catalogs) {
            (Some(next), Some(prev)) => !Arc::ptr_eq(next, prev),
            (Some(_), None) => true,
            (None, _) => false,
        };

        if !changed && !catalogs_changed {
            return Arc::clone(self);
        }
        Arc::new(Self {
            target: self.target.clone(),
            groups,
            catalogs: catalogs.cloned().or_else(|| self.catalogs.clone()),
        })
    }
}
