//! # The whole-project dependencies snapshot.
//!
//! [`DependenciesSnapshot`] maps each target framework to its
//! [`TargetedSnapshot`] slice. Updates replace exactly one slice and reuse
//! every other slice **by reference** (structural sharing); a no-op update
//! returns the input `Arc` pointer-identically so callers detect "nothing
//! changed" with `Arc::ptr_eq`.

use std::collections::HashMap;
use std::sync::Arc;

use super::targeted::TargetedSnapshot;
use crate::model::{ChangeSet, TargetFramework};
use crate::subscribe::VersionedCatalogs;

/// Immutable snapshot of all frameworks' dependencies.
#[derive(Debug)]
pub struct DependenciesSnapshot {
    targets: HashMap<TargetFramework, Arc<TargetedSnapshot>>,
}

impl DependenciesSnapshot {
    /// The empty snapshot every provider starts from.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            targets: HashMap::new(),
        })
    }

    /// Iterates the per-framework slices (no particular order).
    pub fn targets(&self) -> impl Iterator<Item = (&TargetFramework, &Arc<TargetedSnapshot>)> {
        self.targets.iter()
    }

    /// Returns one framework's slice.
    pub fn slice(&self, target: &TargetFramework) -> Option<&Arc<TargetedSnapshot>> {
        self.targets.get(target)
    }

    /// Number of framework slices.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns true when no framework has a slice.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Applies a change-set to one framework's slice.
    ///
    /// Returns `prev` pointer-identically when the target is unknown (a
    /// stale-context race: the change-set came from a subscriber generation
    /// that no longer exists) or when the slice absorbs the change with no
    /// material difference. Otherwise only the affected slice is replaced;
    /// all other slices are shared with `prev`.
    pub fn update_slice(
        prev: &Arc<Self>,
        target: &TargetFramework,
        changes: &ChangeSet,
        catalogs: Option<&Arc<VersionedCatalogs>>,
    ) -> Arc<Self> {
        let Some(slice) = prev.targets.get(target) else {
            return Arc::clone(prev);
        };
        let next = slice.apply(changes, catalogs);
        if Arc::ptr_eq(&next, slice) {
            return Arc::clone(prev);
        }
        let mut targets = prev.targets.clone();
        targets.insert(target.clone(), next);
        Arc::new(Self { targets })
    }

    /// Reshapes the snapshot to a new framework set.
    ///
    /// Surviving frameworks keep their slice by reference; new frameworks get
    /// an empty slice; removed frameworks are dropped. Pointer-identical when
    /// the set already matches.
    pub fn set_targets(prev: &Arc<Self>, targets: &[TargetFramework]) -> Arc<Self> {
        let same = prev.targets.len() == targets.len()
            && targets.iter().all(|t| prev.targets.contains_key(t));
        if same {
            return Arc::clone(prev);
        }
        let next = targets
            .iter()
            .map(|t| {
                let slice = prev
                    .targets
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| TargetedSnapshot::empty(t.clone()));
                (t.clone(), slice)
            })
            .collect();
        Arc::new(Self { targets: next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeSetBuilder, DependencyModel};

    fn tf(name: &str) -> TargetFramework {
        TargetFramework::new(name)
    }

    fn changes(id: &str) -> ChangeSet {
        let mut builder = ChangeSetBuilder::new();
        builder.added(DependencyModel::builder("Package", id).resolved(true).build());
        builder.try_build().unwrap()
    }

    #[test]
    fn test_set_targets_creates_empty_slices() {
        let snap = DependenciesSnapshot::empty();
        let snap = DependenciesSnapshot::set_targets(&snap, &[tf("net6.0"), tf("net7.0")]);
        assert_eq!(snap.len(), 2);
        assert!(snap.slice(&tf("net6.0")).unwrap().is_empty());
    }

    #[test]
    fn test_set_targets_same_set_is_pointer_noop() {
        let snap = DependenciesSnapshot::empty();
        let snap = DependenciesSnapshot::set_targets(&snap, &[tf("net6.0")]);
        let again = DependenciesSnapshot::set_targets(&snap, &[tf(".NETCoreApp,Version=v6.0")]);
        assert!(Arc::ptr_eq(&snap, &again));
    }

    #[test]
    fn test_update_preserves_sibling_slices_by_reference() {
        let snap = DependenciesSnapshot::empty();
        let snap = DependenciesSnapshot::set_targets(&snap, &[tf("net6.0"), tf("net7.0")]);
        let next = DependenciesSnapshot::update_slice(&snap, &tf("net6.0"), &changes("PkgA"), None);

        assert!(!Arc::ptr_eq(&snap, &next));
        // Untouched framework slice is reused, not copied.
        assert!(Arc::ptr_eq(
            snap.slice(&tf("net7.0")).unwrap(),
            next.slice(&tf("net7.0")).unwrap()
        ));
        assert_eq!(next.slice(&tf("net6.0")).unwrap().len(), 1);
    }

    #[test]
    fn test_update_unknown_target_is_pointer_noop() {
        let snap = DependenciesSnapshot::empty();
        let snap = DependenciesSnapshot::set_targets(&snap, &[tf("net6.0")]);
        let next = DependenciesSnapshot::update_slice(&snap, &tf("net8.0"), &changes("PkgA"), None);
        assert!(Arc::ptr_eq(&snap, &next));
    }

    #[test]
    fn test_reshape_keeps_populated_slice_by_reference() {
        let snap = DependenciesSnapshot::empty();
        let snap = DependenciesSnapshot::set_targets(&snap, &[tf("net6.0")]);
        let snap = DependenciesSnapshot::update_slice(&snap, &tf("net6.0"), &changes("PkgA"), None);
        let six = Arc::clone(snap.slice(&tf("net6.0")).unwrap());

        let wider = DependenciesSnapshot::set_targets(&snap, &[tf("net6.0"), tf("net7.0")]);
        assert!(Arc::ptr_eq(&six, wider.slice(&tf("net6.0")).unwrap()));
        assert!(wider.slice(&tf("net7.0")).unwrap().is_empty());
    }
}
