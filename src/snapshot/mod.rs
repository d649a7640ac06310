//! Immutable snapshot data and the locked/debounced updater that owns it.
//!
//! ## Contents
//! - [`TargetedSnapshot`] one framework's slice (groups of dependency nodes)
//! - [`DependenciesSnapshot`] framework → slice map with structural sharing
//! - [`SnapshotUpdater`] CAS update region + debounced change notifications
//!
//! ## Quick reference
//! - Updates are pure functions `Arc<Snapshot> → Arc<Snapshot>`; returning
//!   the input pointer-identically means "no change" and suppresses
//!   publication.
//! - Only the affected framework's slice is replaced on update; every other
//!   slice is reused by reference.

mod snapshot;
mod targeted;
mod updater;

pub use snapshot::DependenciesSnapshot;
pub use targeted::TargetedSnapshot;
pub use updater::SnapshotUpdater;
