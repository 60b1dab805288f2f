//! Update policies
//!
//! A policy decides whether a candidate version may replace the current one.
//! No policy ever accepts a candidate that does not strictly exceed the
//! current version, so downgrades and re-installs are never offered.

use crate::error::Error;
use crate::version::SemanticVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which newer versions are acceptable update targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdatePolicy {
    /// Any newer release version, never a pre-release
    #[default]
    Stable,
    /// Newer release versions with the same major version
    MinorOnly,
    /// Newer release versions with the same major and minor version
    PatchOnly,
    /// Any newer version, pre-releases included
    AllowPrerelease,
}

impl UpdatePolicy {
    /// All policies, in documentation order
    pub const ALL: [UpdatePolicy; 4] = [
        UpdatePolicy::Stable,
        UpdatePolicy::MinorOnly,
        UpdatePolicy::PatchOnly,
        UpdatePolicy::AllowPrerelease,
    ];

    /// Decide whether `candidate` is an acceptable update from `current`
    pub fn accepts(self, current: &SemanticVersion, candidate: &SemanticVersion) -> bool {
        if candidate <= current {
            return false;
        }

        match self {
            UpdatePolicy::AllowPrerelease => true,
            UpdatePolicy::Stable => !candidate.is_prerelease(),
            UpdatePolicy::MinorOnly => {
                !candidate.is_prerelease() && candidate.major() == current.major()
            }
            UpdatePolicy::PatchOnly => {
                !candidate.is_prerelease()
                    && candidate.major() == current.major()
                    && candidate.minor() == current.minor()
            }
        }
    }

    /// Whether releases flagged as pre-release by the feed are eligible
    pub fn allows_prerelease(self) -> bool {
        matches!(self, UpdatePolicy::AllowPrerelease)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpdatePolicy::Stable => "stable",
            UpdatePolicy::MinorOnly => "minor-only",
            UpdatePolicy::PatchOnly => "patch-only",
            UpdatePolicy::AllowPrerelease => "allow-prerelease",
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpdatePolicy::ALL
            .into_iter()
            .find(|policy| policy.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::invalid_policy(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> SemanticVersion {
        SemanticVersion::parse(text).unwrap()
    }

    #[test]
    fn test_no_policy_accepts_equal_or_older() {
        for policy in UpdatePolicy::ALL {
            assert!(!policy.accepts(&v("1.2.3"), &v("1.2.3")), "{}", policy);
            assert!(!policy.accepts(&v("1.2.3"), &v("1.2.3+build")), "{}", policy);
            assert!(!policy.accepts(&v("1.2.3"), &v("1.2.2")), "{}", policy);
            assert!(!policy.accepts(&v("1.2.3"), &v("1.2.3-rc.1")), "{}", policy);
        }
    }

    #[test]
    fn test_stable_rejects_prereleases() {
        assert!(UpdatePolicy::Stable.accepts(&v("1.0.0"), &v("2.0.0")));
        assert!(!UpdatePolicy::Stable.accepts(&v("1.0.0"), &v("2.0.0-beta")));
    }

    #[test]
    fn test_minor_only_holds_major() {
        let policy = UpdatePolicy::MinorOnly;
        assert!(policy.accepts(&v("1.2.0"), &v("1.9.4")));
        assert!(!policy.accepts(&v("1.2.0"), &v("2.0.0")));
        assert!(!policy.accepts(&v("1.2.0"), &v("1.3.0-rc.1")));
    }

    #[test]
    fn test_patch_only_holds_major_and_minor() {
        let policy = UpdatePolicy::PatchOnly;
        assert!(policy.accepts(&v("1.2.0"), &v("1.2.7")));
        assert!(!policy.accepts(&v("1.2.0"), &v("1.3.0")));
        assert!(!policy.accepts(&v("1.2.0"), &v("2.2.1")));
    }

    #[test]
    fn test_allow_prerelease_takes_any_newer() {
        let policy = UpdatePolicy::AllowPrerelease;
        assert!(policy.accepts(&v("1.0.0"), &v("2.0.0-alpha")));
        assert!(policy.accepts(&v("1.0.0-rc.1"), &v("1.0.0-rc.2")));
        assert!(policy.accepts(&v("1.0.0-rc.1"), &v("1.0.0")));
    }

    #[test]
    fn test_patch_only_implies_minor_only_implies_stable() {
        let current = v("1.4.2");
        let candidates = ["1.4.3", "1.5.0", "2.0.0", "1.4.3-rc.1", "0.9.0", "1.4.2"];
        for text in candidates {
            let candidate = v(text);
            if UpdatePolicy::PatchOnly.accepts(&current, &candidate) {
                assert!(UpdatePolicy::MinorOnly.accepts(&current, &candidate));
            }
            if UpdatePolicy::MinorOnly.accepts(&current, &candidate) {
                assert!(UpdatePolicy::Stable.accepts(&current, &candidate));
            }
            if UpdatePolicy::Stable.accepts(&current, &candidate) {
                assert!(UpdatePolicy::AllowPrerelease.accepts(&current, &candidate));
            }
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("stable".parse::<UpdatePolicy>().unwrap(), UpdatePolicy::Stable);
        assert_eq!(
            "Allow-Prerelease".parse::<UpdatePolicy>().unwrap(),
            UpdatePolicy::AllowPrerelease
        );
        assert!(matches!(
            "nightly".parse::<UpdatePolicy>(),
            Err(Error::InvalidPolicy { .. })
        ));
    }
}
