//! Release versions and their canonical tag strings.
//!
//! Supports:
//! - Final releases: `10.0.0`
//! - Release candidates: `10.0.0rc2` (also accepted as `10.0.0-rc2`)

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when parsing a [`ReleaseVersion`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionError {
    /// The base version is not a `major.minor.patch` triple.
    #[error("Invalid version '{input}': {reason}")]
    Invalid {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A release version: a base `major.minor.patch` plus an optional
/// release-candidate number.
///
/// Ordering compares `(major, minor, patch)` first; for equal triples a
/// release candidate sorts before the final release.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseVersion {
    base: semver::Version,
    release_candidate: Option<u32>,
}

impl ReleaseVersion {
    /// Create a version from its parts.
    pub fn new(base: semver::Version, release_candidate: Option<u32>) -> Self {
        Self {
            base,
            release_candidate,
        }
    }

    /// Parse a version like `10.0.0`, `10.0.0rc2` or `10.0.0-rc2`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Invalid`] if the base is not a plain
    /// `major.minor.patch` triple or the candidate number is not numeric.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::Invalid {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (base, rc) = match input.split_once("rc") {
            Some((base, rc)) => {
                let rc = rc
                    .parse::<u32>()
                    .map_err(|_| invalid("release candidate must be a number"))?;
                (base.trim_end_matches('-'), Some(rc))
            }
            None => (input, None),
        };

        let base = semver::Version::parse(base).map_err(|e| invalid(&e.to_string()))?;
        if !base.pre.is_empty() || !base.build.is_empty() {
            return Err(invalid("expected major.minor.patch"));
        }

        Ok(Self::new(base, rc))
    }

    /// Replace the release-candidate number.
    pub fn with_release_candidate(mut self, release_candidate: Option<u32>) -> Self {
        self.release_candidate = release_candidate;
        self
    }

    /// The base `major.minor.patch` version.
    pub fn base(&self) -> &semver::Version {
        &self.base
    }

    /// The leading version component, e.g. `10` for `10.0.0`.
    pub fn major(&self) -> u64 {
        self.base.major
    }

    /// The release-candidate number, if any.
    pub fn release_candidate(&self) -> Option<u32> {
        self.release_candidate
    }

    /// True iff this is a release candidate.
    pub fn is_prerelease(&self) -> bool {
        self.release_candidate.is_some()
    }

    /// Canonical tag string: `10.0.0` or `10.0.0rc2`.
    pub fn tag(&self) -> String {
        match self.release_candidate {
            Some(rc) => format!("{}rc{rc}", self.base),
            None => self.base.to_string(),
        }
    }

    /// Name llvm-project uses for the release: `10.0.0` or `10.0.0-rc2`.
    pub fn upstream_name(&self) -> String {
        match self.release_candidate {
            Some(rc) => format!("{}-rc{rc}", self.base),
            None => self.base.to_string(),
        }
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let triple = |v: &Self| (v.base.major, v.base.minor, v.base.patch);
        triple(self)
            .cmp(&triple(other))
            .then_with(|| match (self.release_candidate, other.release_candidate) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl FromStr for ReleaseVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_final() {
        let v = ReleaseVersion::parse("10.0.0").unwrap();
        assert_eq!(v.major(), 10);
        assert_eq!(v.release_candidate(), None);
        assert!(!v.is_prerelease());
        assert_eq!(v.tag(), "10.0.0");
        assert_eq!(v.upstream_name(), "10.0.0");
    }

    #[test]
    fn test_parse_release_candidate() {
        let v = ReleaseVersion::parse("11.0.0rc2").unwrap();
        assert_eq!(v.release_candidate(), Some(2));
        assert_eq!(v.tag(), "11.0.0rc2");

        let dashed = ReleaseVersion::parse("11.0.0-rc2").unwrap();
        assert_eq!(dashed, v);
        assert_eq!(dashed.tag(), "11.0.0rc2");
        assert_eq!(dashed.upstream_name(), "11.0.0-rc2");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ReleaseVersion::parse("10.0").is_err());
        assert!(ReleaseVersion::parse("10.0.0rcX").is_err());
        assert!(ReleaseVersion::parse("10.0.0-beta").is_err());
        assert!(ReleaseVersion::parse("").is_err());
    }

    #[test]
    fn test_ordering() {
        let parse = |s: &str| ReleaseVersion::parse(s).unwrap();
        assert!(parse("9.0.1") < parse("10.0.0"));
        assert!(parse("10.0.0") < parse("10.0.1"));
        assert!(parse("10.1.0") > parse("10.0.9"));
        assert!(parse("10.0.0rc1") < parse("10.0.0rc2"));
        assert!(parse("10.0.0rc2") < parse("10.0.0"));
    }

    #[test]
    fn test_with_release_candidate() {
        let v = ReleaseVersion::parse("12.0.1")
            .unwrap()
            .with_release_candidate(Some(3));
        assert!(v.is_prerelease());
        assert_eq!(v.to_string(), "12.0.1rc3");
    }
}
