//! # Canonical target framework identity.
//!
//! A project may spell the same framework two ways: as a short name
//! (`net6.0`, `netstandard2.1`, `net472`) or as a full moniker
//! (`.NETCoreApp,Version=v6.0`). [`TargetFramework`] canonicalizes both
//! spellings into one identity so equality and hashing compare the framework,
//! not the string.
//!
//! ## Rules
//! - Equality and hashing use the **canonical** form only.
//! - `Display` renders the short name; [`TargetFramework::full_name`] renders
//!   the full moniker.
//! - Unrecognized monikers fall back to a case-insensitive opaque identity so
//!   unknown frameworks still aggregate consistently.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Opaque, canonically-normalized identity of one target framework.
///
/// Cheap to clone (`Arc`-backed). Two values constructed from a short name
/// and from the equivalent full moniker compare equal:
///
/// ```
/// use depsnap::TargetFramework;
///
/// let short = TargetFramework::new("net6.0");
/// let full = TargetFramework::new(".NETCoreApp,Version=v6.0");
/// assert_eq!(short, full);
/// assert_eq!(short.to_string(), "net6.0");
/// ```
#[derive(Debug, Clone)]
pub struct TargetFramework {
    canonical: Arc<str>,
    short: Arc<str>,
}

/// Framework families with dedicated short-name syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    NetCoreApp,
    NetStandard,
    NetFramework,
}

impl Family {
    fn identifier(self) -> &'static str {
        match self {
            Family::NetCoreApp => ".NETCoreApp",
            Family::NetStandard => ".NETStandard",
            Family::NetFramework => ".NETFramework",
        }
    }

    fn parse(identifier: &str) -> Option<Self> {
        match identifier.to_ascii_lowercase().as_str() {
            ".netcoreapp" => Some(Family::NetCoreApp),
            ".netstandard" => Some(Family::NetStandard),
            ".netframework" => Some(Family::NetFramework),
            _ => None,
        }
    }
}

impl TargetFramework {
    /// Parses a short name or a full moniker into a canonical identity.
    pub fn new(moniker: &str) -> Self {
        let moniker = moniker.trim();
        if let Some((family, version)) = parse_full(moniker).or_else(|| parse_short(moniker)) {
            let canonical = format!("{},Version=v{}", family.identifier(), version);
            let short = short_name(family, &version);
            return Self {
                canonical: canonical.into(),
                short: short.into(),
            };
        }
        // Unknown shape: opaque identity, case-insensitive.
        Self {
            canonical: moniker.to_ascii_lowercase().into(),
            short: moniker.into(),
        }
    }

    /// Returns the short name (e.g. `net6.0`).
    pub fn short_name(&self) -> &str {
        &self.short
    }

    /// Returns the full canonical moniker (e.g. `.NETCoreApp,Version=v6.0`).
    pub fn full_name(&self) -> &str {
        &self.canonical
    }
}

impl PartialEq for TargetFramework {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for TargetFramework {}

impl Hash for TargetFramework {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for TargetFramework {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TargetFramework {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for TargetFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short)
    }
}

impl From<&str> for TargetFramework {
    fn from(moniker: &str) -> Self {
        TargetFramework::new(moniker)
    }
}

/// Parses `".NETCoreApp,Version=v6.0"` → `(NetCoreApp, "6.0")`.
fn parse_full(moniker: &str) -> Option<(Family, String)> {
    let (identifier, rest) = moniker.split_once(',')?;
    let family = Family::parse(identifier.trim())?;
    let version = rest.trim().strip_prefix("Version=")?.trim_start_matches('v');
    if version.is_empty() {
        return None;
    }
    Some((family, version.to_string()))
}

/// Parses short names: `net6.0`, `netcoreapp3.1`, `netstandard2.0`, `net472`.
fn parse_short(moniker: &str) -> Option<(Family, String)> {
    let lower = moniker.to_ascii_lowercase();
    if let Some(version) = lower.strip_prefix("netstandard") {
        return valid_version(version).map(|v| (Family::NetStandard, v));
    }
    if let Some(version) = lower.strip_prefix("netcoreapp") {
        return valid_version(version).map(|v| (Family::NetCoreApp, v));
    }
    let version = lower.strip_prefix("net")?;
    if version.contains('.') {
        // Dotted form: net5.0 and later are .NETCoreApp.
        return valid_version(version).map(|v| (Family::NetCoreApp, v));
    }
    // Dotless form is the classic framework: net472 → 4.7.2.
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let dotted: Vec<String> = version.chars().map(|c| c.to_string()).collect();
    Some((Family::NetFramework, dotted.join(".")))
}

fn valid_version(version: &str) -> Option<String> {
    if !version.is_empty()
        && version.chars().all(|c| c.is_ascii_digit() || c == '.')
        && !version.starts_with('.')
        && !version.ends_with('.')
    {
        Some(version.to_string())
    } else {
        None
    }
}

fn short_name(family: Family, version: &str) -> String {
    match family {
        Family::NetStandard => format!("netstandard{version}"),
        Family::NetFramework => format!("net{}", version.replace('.', "")),
        Family::NetCoreApp => {
            let major: u32 = version
                .split('.')
                .next()
                .and_then(|m| m.parse().ok())
                .unwrap_or(0);
            if major >= 5 {
                format!("net{version}")
            } else {
                format!("netcoreapp{version}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_short_and_full_monikers_compare_equal() {
        let cases = [
            ("net6.0", ".NETCoreApp,Version=v6.0"),
            ("netcoreapp3.1", ".NETCoreApp,Version=v3.1"),
            ("netstandard2.0", ".NETStandard,Version=v2.0"),
            ("net472", ".NETFramework,Version=v4.7.2"),
        ];
        for (short, full) in cases {
            let a = TargetFramework::new(short);
            let b = TargetFramework::new(full);
            assert_eq!(a, b, "{short} vs {full}");
        }
    }

    #[test]
    fn test_hash_by_canonical_identity() {
        let mut map = HashMap::new();
        map.insert(TargetFramework::new("net7.0"), 1);
        assert_eq!(map.get(&TargetFramework::new(".NETCoreApp,Version=v7.0")), Some(&1));
    }

    #[test]
    fn test_display_is_short_name() {
        assert_eq!(TargetFramework::new(".NETStandard,Version=v2.1").to_string(), "netstandard2.1");
        assert_eq!(TargetFramework::new(".NETFramework,Version=v4.8").to_string(), "net48");
        assert_eq!(TargetFramework::new(".NETCoreApp,Version=v3.1").to_string(), "netcoreapp3.1");
        assert_eq!(TargetFramework::new(".NETCoreApp,Version=v8.0").to_string(), "net8.0");
    }

    #[test]
    fn test_different_frameworks_are_distinct() {
        assert_ne!(TargetFramework::new("net6.0"), TargetFramework::new("net7.0"));
        assert_ne!(TargetFramework::new("netstandard2.0"), TargetFramework::new("net472"));
    }

    #[test]
    fn test_unknown_moniker_is_case_insensitive_opaque() {
        let a = TargetFramework::new("MonoAndroid13.0");
        let b = TargetFramework::new("monoandroid13.0");
        assert_eq!(a, b);
        assert_eq!(a.short_name(), "MonoAndroid13.0");
    }
}
