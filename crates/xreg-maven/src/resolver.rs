//! Dependency version-range resolution against available versions.
//!
//! Cross-references point at `/versions/<v>` once a concrete version is
//! pinned down, at the base resource path when only the artifact's
//! existence is known, and nowhere when even that cannot be confirmed.

use crate::version::{compare_versions, is_snapshot};
use std::cmp::Ordering;

/// The version requirement forms a POM dependency can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequirement {
    /// Plain `X.Y.Z` or hard pin `[X.Y.Z]`.
    Exact(String),
    /// Open-ended range `[minVer,)`.
    MinimumOpen(String),
    /// No version element at all.
    Unspecified,
    /// Anything else (multi-bound ranges, exclusive bounds).
    Other(String),
}

pub fn parse_requirement(raw: Option<&str>) -> VersionRequirement {
    let Some(raw) = raw else {
        return VersionRequirement::Unspecified;
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return VersionRequirement::Unspecified;
    }

    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        if inner.contains(',') {
            return VersionRequirement::Other(trimmed.to_string());
        }
        return VersionRequirement::Exact(inner.trim().to_string());
    }

    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(')'))
        && let Some(min) = inner.strip_suffix(',').map(str::trim).or_else(|| {
            inner
                .rsplit_once(',')
                .filter(|(_, upper)| upper.trim().is_empty())
                .map(|(min, _)| min.trim())
        })
        && !min.is_empty()
    {
        return VersionRequirement::MinimumOpen(min.to_string());
    }

    if trimmed.contains(['[', ']', '(', ')', ',']) {
        return VersionRequirement::Other(trimmed.to_string());
    }
    VersionRequirement::Exact(trimmed.to_string())
}

/// Where a dependency's cross-reference ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub package: Option<String>,
    pub resolved_version: Option<String>,
}

/// Resolves one dependency requirement against the artifact's available
/// versions. `base_path` is the dependency's resource xid; `available` is
/// `None` when the artifact's metadata could not be confirmed at all.
pub fn resolve(
    requirement: &VersionRequirement,
    available: Option<&[String]>,
    base_path: &str,
) -> ResolvedDependency {
    let Some(available) = available else {
        return ResolvedDependency::default();
    };

    let pinned = match requirement {
        VersionRequirement::Exact(version) => {
            available.iter().find(|v| *v == version).cloned()
        }
        VersionRequirement::MinimumOpen(min) => newest_at_least(available, min),
        VersionRequirement::Unspecified | VersionRequirement::Other(_) => None,
    };

    match pinned {
        Some(version) => ResolvedDependency {
            package: Some(format!("{base_path}/versions/{version}")),
            resolved_version: Some(version),
        },
        // The artifact exists even though no concrete version matched.
        None => ResolvedDependency {
            package: Some(base_path.to_string()),
            resolved_version: None,
        },
    }
}

/// Newest version `>= min`, preferring non-SNAPSHOT candidates.
fn newest_at_least(available: &[String], min: &str) -> Option<String> {
    let candidates: Vec<&String> = available
        .iter()
        .filter(|v| compare_versions(v, min) != Ordering::Less)
        .collect();

    let pick = |versions: &[&String]| {
        versions
            .iter()
            .max_by(|a, b| compare_versions(a, b))
            .map(|v| (*v).clone())
    };

    let stable: Vec<&String> = candidates
        .iter()
        .copied()
        .filter(|v| !is_snapshot(v))
        .collect();
    pick(&stable).or_else(|| pick(&candidates))
}
