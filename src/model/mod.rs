//! Data model: dependency facts, change-sets, and target framework identity.

mod change;
mod dependency;
mod target;

pub use change::{ChangeSet, ChangeSetBuilder, DependencyChange};
pub use dependency::{DependencyId, DependencyModel, DependencyModelBuilder, IconSet};
pub use target::TargetFramework;
