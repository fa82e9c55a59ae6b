//! API release identifiers and the registry of releases this deployment serves.

use std::cmp::Ordering;
use std::fmt;

use tracing::debug;

use crate::error::EngineError;

/// A release identifier such as `3.1.10`.
///
/// Ordering is numeric per segment, so `3.1.10` is newer than `3.1.9`.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct ApiVersion {
    #[n(0)]
    major: u16,
    #[n(1)]
    minor: u16,
    #[n(2)]
    patch: u16,
}

/// Result of comparing one release with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Older,
    Same,
    Newer,
}

impl ApiVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses `3.1.10`, `v3.1.10` or `3.1` (missing patch reads as zero).
    /// Does not check the release is one the registry knows about.
    pub fn parse_segments(raw: &str) -> Result<Self, EngineError> {
        let malformed = || EngineError::MalformedVersion(raw.to_string());
        let trimmed = raw.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let segments = trimmed
            .split('.')
            .map(|s| s.parse::<u16>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>, _>>()?;

        match segments.as_slice() {
            [major, minor] => Ok(Self::new(*major, *minor, 0)),
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(malformed()),
        }
    }

    /// How `self` relates to `other`.
    pub fn relation_to(&self, other: &ApiVersion) -> Relation {
        match self.cmp(other) {
            Ordering::Less => Relation::Older,
            Ordering::Equal => Relation::Same,
            Ordering::Greater => Relation::Newer,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 && self.major < 4 {
            write!(f, "v{}.{}", self.major, self.minor)
        } else {
            write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

/// The fixed, ordered set of releases served.
#[derive(Debug, Clone)]
pub struct VersionRegistry {
    releases: Vec<ApiVersion>,
}

impl Default for VersionRegistry {
    fn default() -> Self {
        let mut releases = vec![ApiVersion::new(3, 0, 0), ApiVersion::new(3, 1, 0)];
        releases.extend((1..=11).map(|patch| ApiVersion::new(3, 1, patch)));
        releases.push(ApiVersion::new(4, 0, 0));
        Self { releases }
    }
}

impl VersionRegistry {
    pub fn new(releases: impl IntoIterator<Item = ApiVersion>) -> Self {
        let mut releases: Vec<_> = releases.into_iter().collect();
        releases.sort();
        releases.dedup();
        Self { releases }
    }

    /// Parse a release string, rejecting anything not in the registry.
    pub fn parse(&self, raw: &str) -> Result<ApiVersion, EngineError> {
        let version = ApiVersion::parse_segments(raw)?;
        if !self.is_known(&version) {
            debug!(version = raw, "rejecting unknown api release");
            return Err(EngineError::MalformedVersion(raw.to_string()));
        }
        Ok(version)
    }

    pub fn is_known(&self, version: &ApiVersion) -> bool {
        self.releases.binary_search(version).is_ok()
    }

    pub fn compare(&self, a: &ApiVersion, b: &ApiVersion) -> Relation {
        a.relation_to(b)
    }

    /// A resource may only be seen or mutated from its own release or a later one.
    pub fn is_access_allowed(&self, requested: &ApiVersion, origin: &ApiVersion) -> bool {
        requested >= origin
    }

    pub fn latest(&self) -> Option<ApiVersion> {
        self.releases.last().copied()
    }

    pub fn releases(&self) -> impl Iterator<Item = &ApiVersion> {
        self.releases.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_not_lexicographic() {
        let registry = VersionRegistry::default();
        let v9 = registry.parse("3.1.9").unwrap();
        let v10 = registry.parse("v3.1.10").unwrap();

        assert_eq!(registry.compare(&v10, &v9), Relation::Newer);
        assert_eq!(registry.compare(&v9, &v10), Relation::Older);
        assert_eq!(registry.compare(&v9, &v9), Relation::Same);
    }

    #[test]
    fn short_form_reads_as_patch_zero() {
        let registry = VersionRegistry::default();
        assert_eq!(registry.parse("v3.1").unwrap(), ApiVersion::new(3, 1, 0));
        assert_eq!(ApiVersion::new(3, 1, 0).to_string(), "v3.1");
        assert_eq!(ApiVersion::new(4, 0, 0).to_string(), "v4.0.0");
    }

    #[test]
    fn rejects_garbage_and_unknown_releases() {
        let registry = VersionRegistry::default();
        for raw in ["", "3", "3.x.1", "3.1.2.4", "2.0", "3.1.99", "latest"] {
            assert!(
                matches!(registry.parse(raw), Err(EngineError::MalformedVersion(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn registry_is_sorted() {
        let registry = VersionRegistry::new([
            ApiVersion::new(4, 0, 0),
            ApiVersion::new(3, 1, 2),
            ApiVersion::new(3, 1, 2),
        ]);
        let releases: Vec<_> = registry.releases().copied().collect();
        assert_eq!(
            releases,
            vec![ApiVersion::new(3, 1, 2), ApiVersion::new(4, 0, 0)]
        );
        assert_eq!(registry.latest(), Some(ApiVersion::new(4, 0, 0)));
    }
}
