//! # Dependency facts as reported by producers.
//!
//! A [`DependencyModel`] is one immutable fact about one dependency, produced
//! fresh by a handler on every update and never mutated afterwards. Identity
//! is the pair (provider type, dependency id) captured by [`DependencyId`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Stable identity of one dependency: provider type + dependency id.
///
/// Cheap to clone; equality and hashing use both fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId {
    /// The dependency kind that produced the fact (e.g. `PackageDependency`).
    pub provider_type: Arc<str>,
    /// The per-provider dependency identifier (e.g. a package name).
    pub id: Arc<str>,
}

impl DependencyId {
    /// Builds an identity from its two components.
    pub fn new(provider_type: impl Into<Arc<str>>, id: impl Into<Arc<str>>) -> Self {
        Self {
            provider_type: provider_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider_type, self.id)
    }
}

/// Icon references for one dependency node.
///
/// The tree picks between the regular and unresolved variants based on
/// [`DependencyModel::resolved`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconSet {
    /// Icon for a resolved node.
    pub icon: Option<Arc<str>>,
    /// Icon for an unresolved node.
    pub unresolved_icon: Option<Arc<str>>,
}

impl IconSet {
    /// Builds an icon set from the two variants.
    pub fn new(icon: impl Into<Arc<str>>, unresolved_icon: impl Into<Arc<str>>) -> Self {
        Self {
            icon: Some(icon.into()),
            unresolved_icon: Some(unresolved_icon.into()),
        }
    }
}

/// One fact about one dependency, reported by a producer.
///
/// Built via [`DependencyModelBuilder`]; immutable after creation. `PartialEq`
/// lets snapshot code detect "re-added with identical attributes" and treat it
/// as a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyModel {
    /// Stable identity (provider type + id).
    pub identity: DependencyId,
    /// Display name shown in the tree.
    pub caption: String,
    /// Path or item spec the fact refers to.
    pub path: String,
    /// Whether the dependency resolved during design-time build.
    pub resolved: bool,
    /// Whether the node appears at the top level of the tree.
    pub top_level: bool,
    /// Whether the dependency was brought in implicitly (e.g. by the SDK).
    pub implicit: bool,
    /// Whether the node is shown at all.
    pub visible: bool,
    /// Icon references for the node.
    pub icon: IconSet,
    /// Tags used for tree placement.
    pub flags: BTreeSet<Arc<str>>,
    /// Open property bag carried through to tree property pages.
    pub properties: BTreeMap<String, String>,
}

impl DependencyModel {
    /// Starts building a model with the given identity.
    pub fn builder(
        provider_type: impl Into<Arc<str>>,
        id: impl Into<Arc<str>>,
    ) -> DependencyModelBuilder {
        let identity = DependencyId::new(provider_type, id);
        DependencyModelBuilder {
            caption: identity.id.to_string(),
            path: identity.id.to_string(),
            identity,
            resolved: false,
            top_level: true,
            implicit: false,
            visible: true,
            icon: IconSet::default(),
            flags: BTreeSet::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Returns the stable identity of this fact.
    pub fn identity(&self) -> &DependencyId {
        &self.identity
    }
}

/// Builder for [`DependencyModel`].
///
/// Defaults: caption and path mirror the id, unresolved, top-level, explicit,
/// visible, no icons/flags/properties.
#[derive(Debug)]
pub struct DependencyModelBuilder {
    identity: DependencyId,
    caption: String,
    path: String,
    resolved: bool,
    top_level: bool,
    implicit: bool,
    visible: bool,
    icon: IconSet,
    flags: BTreeSet<Arc<str>>,
    properties: BTreeMap<String, String>,
}

impl DependencyModelBuilder {
    /// Sets the display name.
    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = caption.into();
        self
    }

    /// Sets the path / item spec.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Marks the dependency resolved or unresolved.
    pub fn resolved(mut self, resolved: bool) -> Self {
        self.resolved = resolved;
        self
    }

    /// Marks the node top-level or nested.
    pub fn top_level(mut self, top_level: bool) -> Self {
        self.top_level = top_level;
        self
    }

    /// Marks the dependency implicit (SDK-injected).
    pub fn implicit(mut self, implicit: bool) -> Self {
        self.implicit = implicit;
        self
    }

    /// Shows or hides the node.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Sets the icon references.
    pub fn icon(mut self, icon: IconSet) -> Self {
        self.icon = icon;
        self
    }

    /// Adds one tree-placement flag.
    pub fn flag(mut self, flag: impl Into<Arc<str>>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    /// Replaces the whole flag set.
    pub fn flags(mut self, flags: BTreeSet<Arc<str>>) -> Self {
        self.flags = flags;
        self
    }

    /// Adds one property to the open bag.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Replaces the whole property bag.
    pub fn properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = properties;
        self
    }

    /// Finishes the immutable model.
    pub fn build(self) -> DependencyModel {
        DependencyModel {
            identity: self.identity,
            caption: self.caption,
            path: self.path,
            resolved: self.resolved,
            top_level: self.top_level,
            implicit: self.implicit,
            visible: self.visible,
            icon: self.icon,
            flags: self.flags,
            properties: self.properties,
        }
    }
}
