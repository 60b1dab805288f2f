//! Semantic versions and their precedence
//!
//! `SemanticVersion` wraps a parsed [`semver::Version`] but defines its own
//! equality, hashing and ordering so that build metadata never takes part in
//! precedence: `1.0.0+a` and `1.0.0+b` are the same version.
//!
//! Pre-release identifiers are compared left to right. Numeric identifiers
//! compare numerically and sort below alphanumeric ones, alphanumeric
//! identifiers compare in ASCII order, and a shorter identifier list sorts
//! first when all shared identifiers are equal. A version without a
//! pre-release sorts above any pre-release of the same core version.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A parsed `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]` version
#[derive(Debug, Clone)]
pub struct SemanticVersion(semver::Version);

impl SemanticVersion {
    /// Parse canonical version text
    ///
    /// Rejects missing components, leading zeros in numeric components,
    /// empty identifiers and any surrounding noise such as a `v` prefix.
    pub fn parse(text: &str) -> Result<Self> {
        semver::Version::parse(text)
            .map(Self)
            .map_err(|e| Error::malformed_version(text, e.to_string()))
    }

    /// Create a release version without pre-release or build metadata
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Dot-separated pre-release identifiers, empty for a release version
    pub fn pre_release(&self) -> &str {
        self.0.pre.as_str()
    }

    /// Build metadata, empty when absent
    pub fn build(&self) -> &str {
        self.0.build.as_str()
    }

    /// True when any pre-release identifier is present
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// Borrow the underlying `semver` value
    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }

    /// Describe how far this version is from `latest`
    pub fn delta_to(&self, latest: &SemanticVersion) -> VersionDelta {
        match self.cmp(latest) {
            Ordering::Equal => VersionDelta::Current,
            Ordering::Greater => VersionDelta::Ahead,
            Ordering::Less => {
                let (level, by) = if latest.major() > self.major() {
                    (ChangeLevel::Major, latest.major() - self.major())
                } else if latest.minor() > self.minor() {
                    (ChangeLevel::Minor, latest.minor() - self.minor())
                } else if latest.patch() > self.patch() {
                    (ChangeLevel::Patch, latest.patch() - self.patch())
                } else {
                    (ChangeLevel::PreRelease, 1)
                };
                VersionDelta::Behind { level, by }
            }
        }
    }
}

fn compare_prerelease(left: &str, right: &str) -> Ordering {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let mut left_ids = left.split('.');
    let mut right_ids = right.split('.');
    loop {
        match (left_ids.next(), right_ids.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(a), Some(b)) => match compare_identifier(a, b) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

fn compare_identifier(a: &str, b: &str) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        // Numeric identifiers carry no leading zeros, so length orders them
        // before digit-wise comparison and arbitrarily large values work.
        (true, true) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.as_bytes().cmp(b.as_bytes()),
    }
}

fn is_numeric(identifier: &str) -> bool {
    !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit())
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .major
            .cmp(&other.0.major)
            .then_with(|| self.0.minor.cmp(&other.0.minor))
            .then_with(|| self.0.patch.cmp(&other.0.patch))
            .then_with(|| compare_prerelease(self.0.pre.as_str(), other.0.pre.as_str()))
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.major.hash(state);
        self.0.minor.hash(state);
        self.0.patch.hash(state);
        self.0.pre.as_str().hash(state);
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SemanticVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Which version component separates two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeLevel {
    Major,
    Minor,
    Patch,
    PreRelease,
}

impl fmt::Display for ChangeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeLevel::Major => "major",
            ChangeLevel::Minor => "minor",
            ChangeLevel::Patch => "patch",
            ChangeLevel::PreRelease => "pre-release",
        };
        f.write_str(label)
    }
}

/// Position of an installed version relative to the newest known one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDelta {
    /// Same precedence as the latest version
    Current,
    /// Newer than anything published (local build, yanked release)
    Ahead,
    /// Older, `by` steps at the highest differing `level`
    Behind { level: ChangeLevel, by: u64 },
}

impl fmt::Display for VersionDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionDelta::Current => f.write_str("up to date"),
            VersionDelta::Ahead => f.write_str("ahead of the latest release"),
            VersionDelta::Behind {
                level: ChangeLevel::PreRelease,
                ..
            } => f.write_str("behind by a pre-release"),
            VersionDelta::Behind { level, by } => {
                write!(f, "{} {} version(s) behind", by, level)
            }
        }
    }
}
