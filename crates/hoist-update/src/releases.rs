//! Release catalog: normalization, candidate selection and asset selection

use crate::error::{Result, UpdateError};
use crate::verify::{Digest, DigestAlgorithm};
use chrono::{DateTime, Utc};
use hoist_core::{SemanticVersion, UpdatePolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Release record as published by the feed (GitHub releases API shape)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<RawAsset>,
}

/// Asset record as published by the feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    /// Feed-provided digest such as `sha256:<hex>`
    #[serde(default)]
    pub digest: Option<String>,
}

/// A release record that failed validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid release record: {reason}")]
pub struct InvalidRecord {
    pub reason: String,
}

/// Location of a downloadable file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLink {
    pub name: String,
    pub url: String,
    pub size: u64,
}

/// Where the expected digest of an asset comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checksum {
    /// Published alongside the asset metadata
    Inline(Digest),
    /// A `<asset>.sha256` style file holding the digest of one asset
    Sidecar {
        link: AssetLink,
        algorithm: DigestAlgorithm,
    },
    /// A release-wide `checksums.txt` / `SHA256SUMS` listing
    Manifest {
        link: AssetLink,
        algorithm: DigestAlgorithm,
    },
}

/// An installable file of a release with its integrity material references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    link: AssetLink,
    checksum: Option<Checksum>,
    signature: Option<AssetLink>,
}

impl Asset {
    pub fn name(&self) -> &str {
        &self.link.name
    }

    pub fn url(&self) -> &str {
        &self.link.url
    }

    pub fn size(&self) -> u64 {
        self.link.size
    }

    pub fn link(&self) -> &AssetLink {
        &self.link
    }

    pub fn checksum(&self) -> Option<&Checksum> {
        self.checksum.as_ref()
    }

    /// Reference to a detached signature envelope
    pub fn signature(&self) -> Option<&AssetLink> {
        self.signature.as_ref()
    }

    /// Whether any integrity material is referenced at all
    pub fn has_integrity_material(&self) -> bool {
        self.checksum.is_some() || self.signature.is_some()
    }
}

/// A normalized, immutable release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    tag: String,
    name: String,
    body: String,
    published_at: Option<DateTime<Utc>>,
    flagged_prerelease: bool,
    version: Option<SemanticVersion>,
    assets: Vec<Asset>,
}

#[derive(Clone, Copy)]
enum Sidecar {
    Checksum(DigestAlgorithm),
    Signature,
    /// Certificates and foreign signature formats; never installed or used
    Ignored,
}

impl Release {
    /// Validate and normalize a feed record
    ///
    /// Drafts and records without a tag are rejected. A tag that is not a
    /// version (after dropping a leading `v`) is kept with `version() == None`
    /// so the release can still be listed.
    pub fn from_raw(raw: RawRelease) -> std::result::Result<Self, InvalidRecord> {
        let tag = raw.tag_name.trim().to_string();
        if tag.is_empty() {
            return Err(InvalidRecord {
                reason: "release has an empty tag".to_string(),
            });
        }
        if raw.draft {
            return Err(InvalidRecord {
                reason: format!("release {} is a draft", tag),
            });
        }

        let version = match SemanticVersion::parse(strip_tag_prefix(&tag)) {
            Ok(version) => Some(version),
            Err(e) => {
                debug!(tag = %tag, error = %e, "release tag is not a version");
                None
            }
        };

        let assets = normalize_assets(&tag, raw.assets);

        Ok(Self {
            name: raw
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| tag.clone()),
            tag,
            body: raw.body.unwrap_or_default(),
            published_at: raw.published_at,
            flagged_prerelease: raw.prerelease,
            version,
            assets,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release notes
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    /// Parsed version, `None` when the tag is not a version
    pub fn version(&self) -> Option<&SemanticVersion> {
        self.version.as_ref()
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    /// Marked as pre-release by the feed or carrying pre-release identifiers
    pub fn is_prerelease(&self) -> bool {
        self.flagged_prerelease
            || self
                .version
                .as_ref()
                .map(SemanticVersion::is_prerelease)
                .unwrap_or(false)
    }
}

fn strip_tag_prefix(tag: &str) -> &str {
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
}

/// Suffixes of files that annotate another file rather than list checksums
const ANNOTATION_SUFFIXES: [&str; 4] = [".sig", ".asc", ".pem", ".cert"];

/// Names that are unambiguously a release-wide checksum listing
const EXACT_MANIFESTS: [&str; 6] = [
    "checksums.txt",
    "checksums",
    "sha256sums",
    "sha256sums.txt",
    "sha512sums",
    "sha512sums.txt",
];

/// Recognize a release-wide checksum listing
///
/// Returns the digest algorithm and a rank; rank 0 (an exact name such as
/// `checksums.txt`) beats rank 1 (`widget_1.2.0_checksums.txt`). Signatures
/// and certificates of a listing are never listings themselves.
fn manifest_kind(name: &str) -> Option<(DigestAlgorithm, u8)> {
    let lower = name.to_ascii_lowercase();
    if ANNOTATION_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return None;
    }

    let rank = if EXACT_MANIFESTS.contains(&lower.as_str()) {
        0
    } else if ["checksums", "sha256sums", "sha512sums"]
        .iter()
        .any(|word| lower.contains(word))
    {
        1
    } else {
        return None;
    };
    let algorithm = if lower.contains("512") {
        DigestAlgorithm::Sha512
    } else {
        DigestAlgorithm::Sha256
    };
    Some((algorithm, rank))
}

fn classify_sidecar(name: &str) -> Option<(&str, Sidecar)> {
    const SUFFIXES: [(&str, Sidecar); 7] = [
        (".sha256", Sidecar::Checksum(DigestAlgorithm::Sha256)),
        (".sha256sum", Sidecar::Checksum(DigestAlgorithm::Sha256)),
        (".sha512", Sidecar::Checksum(DigestAlgorithm::Sha512)),
        (".sig", Sidecar::Signature),
        (".asc", Sidecar::Ignored),
        (".pem", Sidecar::Ignored),
        (".cert", Sidecar::Ignored),
    ];

    SUFFIXES
        .iter()
        .find_map(|(suffix, kind)| Some((name.strip_suffix(suffix)?, *kind)))
}

fn normalize_assets(tag: &str, raw_assets: Vec<RawAsset>) -> Vec<Asset> {
    let mut primaries = Vec::new();
    let mut checksum_sidecars: HashMap<String, Checksum> = HashMap::new();
    let mut signatures: HashMap<String, AssetLink> = HashMap::new();
    let mut manifest: Option<(u8, Checksum)> = None;

    for raw in raw_assets {
        let name = raw.name.trim().to_string();
        let url = raw.browser_download_url.trim().to_string();
        if name.is_empty() || url.is_empty() {
            warn!(release = %tag, asset = %raw.name, "skipping asset without name or URL");
            continue;
        }
        let link = AssetLink {
            name: name.clone(),
            url,
            size: raw.size,
        };

        if let Some((algorithm, rank)) = manifest_kind(&name) {
            match &manifest {
                Some((kept, _)) if *kept <= rank => {
                    debug!(release = %tag, asset = %name, "ignoring extra checksum listing");
                }
                _ => manifest = Some((rank, Checksum::Manifest { link, algorithm })),
            }
            continue;
        }

        match classify_sidecar(&name) {
            Some((base, Sidecar::Checksum(algorithm))) => {
                checksum_sidecars.insert(base.to_string(), Checksum::Sidecar { link, algorithm });
            }
            Some((base, Sidecar::Signature)) => {
                signatures.insert(base.to_string(), link);
            }
            Some((_, Sidecar::Ignored)) => {
                debug!(release = %tag, asset = %name, "ignoring certificate or foreign signature");
            }
            None => {
                let inline = raw.digest.as_deref().and_then(|d| match Digest::parse(d) {
                    Ok(digest) => Some(digest),
                    Err(e) => {
                        warn!(release = %tag, asset = %name, error = %e, "ignoring malformed asset digest");
                        None
                    }
                });
                primaries.push((link, inline));
            }
        }
    }

    let manifest = manifest.map(|(_, checksum)| checksum);
    primaries
        .into_iter()
        .map(|(link, inline)| {
            let checksum = inline
                .map(Checksum::Inline)
                .or_else(|| checksum_sidecars.remove(&link.name))
                .or_else(|| manifest.clone());
            let signature = signatures.remove(&link.name);
            Asset {
                link,
                checksum,
                signature,
            }
        })
        .collect()
}

/// Host platform used to pick an asset when no hint is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    fn os_tokens(&self) -> &'static [&'static str] {
        match self.os.as_str() {
            "linux" => &["linux"],
            "macos" => &["darwin", "macos", "apple", "osx"],
            "windows" => &["windows", "win64", "win32"],
            "freebsd" => &["freebsd"],
            _ => &[],
        }
    }

    fn arch_tokens(&self) -> &'static [&'static str] {
        match self.arch.as_str() {
            "x86_64" => &["x86_64", "amd64", "x64"],
            "aarch64" => &["aarch64", "arm64"],
            "x86" => &["i686", "i386", "x86", "386"],
            "arm" => &["armv7", "armv7l", "armhf", "arm"],
            _ => &[],
        }
    }

    /// Tokens of a wider architecture that embed one of ours (`x86` in `x86_64`)
    fn wider_arch_tokens(&self) -> &'static [&'static str] {
        match self.arch.as_str() {
            "x86" => &["x86_64", "amd64", "x64"],
            "arm" => &["arm64", "aarch64"],
            _ => &[],
        }
    }

    /// Whether an asset name mentions both this OS and this architecture
    ///
    /// Architecture tokens only count as whole words, so `arm` does not match
    /// `arm64`.
    pub fn matches(&self, asset_name: &str) -> bool {
        let lower = asset_name.to_ascii_lowercase();
        self.os_tokens().iter().any(|t| lower.contains(t))
            && self.arch_tokens().iter().any(|t| mentions_word(&lower, t))
            && !self.wider_arch_tokens().iter().any(|t| mentions_word(&lower, t))
    }
}

/// Whether `token` occurs in `text` with no letter or digit on either side
fn mentions_word(text: &str, token: &str) -> bool {
    text.match_indices(token).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + token.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

/// Pick the asset to install from `release` for the host platform
pub fn select_asset<'a>(release: &'a Release, hint: Option<&str>) -> Result<&'a Asset> {
    select_asset_for(release, hint, &Platform::current())
}

/// Pick the asset to install from `release`
///
/// With a hint, assets whose name contains it (case-insensitively) match and
/// an exact name match wins over substring matches. Without a hint a lone
/// asset is taken as is and several assets are narrowed to the one naming
/// `platform`.
pub fn select_asset_for<'a>(
    release: &'a Release,
    hint: Option<&str>,
    platform: &Platform,
) -> Result<&'a Asset> {
    let hint = hint.map(str::trim).filter(|h| !h.is_empty());
    let assets = release.assets();

    let no_match = || UpdateError::NoMatchingAsset {
        release: release.tag().to_string(),
        hint: hint.map(str::to_string),
    };
    let ambiguous = |matches: &[&Asset]| UpdateError::AmbiguousAsset {
        release: release.tag().to_string(),
        candidates: matches.iter().map(|a| a.name().to_string()).collect(),
    };

    match hint {
        Some(hint) => {
            let needle = hint.to_ascii_lowercase();
            let matches: Vec<&Asset> = assets
                .iter()
                .filter(|a| a.name().to_ascii_lowercase().contains(&needle))
                .collect();

            match matches.as_slice() {
                [] => Err(no_match()),
                [only] => Ok(*only),
                several => several
                    .iter()
                    .copied()
                    .find(|a| a.name().eq_ignore_ascii_case(hint))
                    .ok_or_else(|| ambiguous(several)),
            }
        }
        None => match assets {
            [] => Err(no_match()),
            [only] => Ok(only),
            several => {
                let all: Vec<&Asset> = several.iter().collect();
                let native: Vec<&Asset> = several
                    .iter()
                    .filter(|a| platform.matches(a.name()))
                    .collect();
                match native.as_slice() {
                    [only] => Ok(*only),
                    [] => Err(ambiguous(&all)),
                    narrowed => Err(ambiguous(narrowed)),
                }
            }
        },
    }
}

/// Why a release is or is not an update candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseVerdict {
    /// Acceptable under the policy
    Candidate,
    /// Not newer than the current version
    NotNewer,
    /// Newer, but outside the policy
    OutsidePolicy,
    /// Tag is not a version
    UnparseableTag,
}

/// The releases known from one feed query
#[derive(Debug, Clone, Default)]
pub struct ReleaseCatalog {
    releases: Vec<Release>,
}

impl ReleaseCatalog {
    pub fn new(releases: Vec<Release>) -> Self {
        Self { releases }
    }

    /// Normalize feed records, dropping drafts and invalid records
    pub fn from_raw(records: Vec<RawRelease>) -> Self {
        let releases = records
            .into_iter()
            .filter_map(|raw| match Release::from_raw(raw) {
                Ok(release) => Some(release),
                Err(e) => {
                    debug!(error = %e, "skipping release record");
                    None
                }
            })
            .collect();
        Self { releases }
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Find a release by tag, with or without its `v` prefix
    pub fn find_by_tag(&self, tag: &str) -> Option<&Release> {
        let wanted = strip_tag_prefix(tag.trim());
        self.releases
            .iter()
            .find(|r| r.tag() == tag || strip_tag_prefix(r.tag()) == wanted)
    }

    /// Classify a release against the current version and policy
    pub fn verdict(
        release: &Release,
        current: &SemanticVersion,
        policy: UpdatePolicy,
    ) -> ReleaseVerdict {
        let Some(version) = release.version() else {
            return ReleaseVerdict::UnparseableTag;
        };
        if version <= current {
            return ReleaseVerdict::NotNewer;
        }
        if release.is_prerelease() && !policy.allows_prerelease() {
            return ReleaseVerdict::OutsidePolicy;
        }
        if policy.accepts(current, version) {
            ReleaseVerdict::Candidate
        } else {
            ReleaseVerdict::OutsidePolicy
        }
    }

    /// The highest-precedence release acceptable under `policy`
    ///
    /// Releases of equal precedence resolve to the most recently published.
    pub fn select_best_candidate(
        &self,
        current: &SemanticVersion,
        policy: UpdatePolicy,
    ) -> Option<&Release> {
        self.releases
            .iter()
            .filter(|r| Self::verdict(r, current, policy) == ReleaseVerdict::Candidate)
            .max_by(|a, b| {
                a.version()
                    .cmp(&b.version())
                    .then_with(|| a.published_at().cmp(&b.published_at()))
            })
    }

    /// The newest parseable release regardless of policy
    pub fn latest(&self) -> Option<&Release> {
        self.releases
            .iter()
            .filter(|r| r.version().is_some())
            .max_by(|a, b| a.version().cmp(&b.version()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn asset(name: &str) -> RawAsset {
        RawAsset {
            name: name.to_string(),
            browser_download_url: format!("https://example.com/dl/{}", name),
            size: 10,
            digest: None,
        }
    }

    fn raw(tag: &str, assets: Vec<RawAsset>) -> RawRelease {
        RawRelease {
            tag_name: tag.to_string(),
            assets,
            ..Default::default()
        }
    }

    fn release(tag: &str, names: &[&str]) -> Release {
        Release::from_raw(raw(tag, names.iter().map(|n| asset(n)).collect())).unwrap()
    }

    #[test]
    fn test_tag_prefix_stripped() {
        let release = release("v1.4.0", &[]);
        assert_eq!(release.tag(), "v1.4.0");
        assert_eq!(release.version().unwrap().to_string(), "1.4.0");
        assert_eq!(release.name(), "v1.4.0");
    }

    #[test]
    fn test_unparseable_tag_retained_without_version() {
        let release = release("nightly", &[]);
        assert!(release.version().is_none());
    }

    #[test]
    fn test_drafts_and_empty_tags_rejected() {
        let mut draft = raw("v1.0.0", vec![]);
        draft.draft = true;
        assert!(Release::from_raw(draft).is_err());
        assert!(Release::from_raw(raw("  ", vec![])).is_err());

        let catalog = ReleaseCatalog::from_raw(vec![raw("", vec![]), raw("v1.0.0", vec![])]);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_sidecars_attach_to_primary_asset() {
        let release = release(
            "v1.0.0",
            &["app-linux.tar.gz", "app-linux.tar.gz.sha256", "app-linux.tar.gz.sig"],
        );
        assert_eq!(release.assets().len(), 1);

        let asset = &release.assets()[0];
        assert!(matches!(
            asset.checksum(),
            Some(Checksum::Sidecar { algorithm: DigestAlgorithm::Sha256, link }) if link.name == "app-linux.tar.gz.sha256"
        ));
        assert_eq!(asset.signature().unwrap().name, "app-linux.tar.gz.sig");
    }

    #[test]
    fn test_manifest_covers_assets_without_sidecar() {
        let release = release("v1.0.0", &["a.zip", "b.zip", "b.zip.sha512", "checksums.txt"]);
        let a = release.assets().iter().find(|x| x.name() == "a.zip").unwrap();
        let b = release.assets().iter().find(|x| x.name() == "b.zip").unwrap();
        assert!(matches!(a.checksum(), Some(Checksum::Manifest { .. })));
        assert!(matches!(
            b.checksum(),
            Some(Checksum::Sidecar {
                algorithm: DigestAlgorithm::Sha512,
                ..
            })
        ));
    }

    #[test]
    fn test_inline_digest_preferred() {
        let mut with_digest = asset("app.bin");
        with_digest.digest = Some(format!("sha256:{}", "ab".repeat(32)));
        let release =
            Release::from_raw(raw("v1.0.0", vec![with_digest, asset("app.bin.sha256")])).unwrap();
        assert!(matches!(
            release.assets()[0].checksum(),
            Some(Checksum::Inline(_))
        ));
    }

    #[test]
    fn test_best_candidate_stable_skips_prerelease() {
        let catalog = ReleaseCatalog::new(vec![
            release("v2.0.0", &[]),
            release("v1.9.9", &[]),
            release("v2.0.0-beta", &[]),
        ]);
        let current = SemanticVersion::parse("1.9.0").unwrap();

        let best = catalog
            .select_best_candidate(&current, UpdatePolicy::Stable)
            .unwrap();
        assert_eq!(best.tag(), "v2.0.0");
    }

    #[test]
    fn test_best_candidate_none_when_up_to_date() {
        let catalog = ReleaseCatalog::new(vec![release("v1.0.0", &[]), release("junk", &[])]);
        let current = SemanticVersion::parse("1.0.0").unwrap();
        assert!(catalog
            .select_best_candidate(&current, UpdatePolicy::AllowPrerelease)
            .is_none());
    }

    #[test]
    fn test_flagged_prerelease_needs_allow_prerelease() {
        let mut flagged = raw("v1.1.0", vec![]);
        flagged.prerelease = true;
        let catalog = ReleaseCatalog::new(vec![Release::from_raw(flagged).unwrap()]);
        let current = SemanticVersion::parse("1.0.0").unwrap();

        assert!(catalog
            .select_best_candidate(&current, UpdatePolicy::Stable)
            .is_none());
        assert!(catalog
            .select_best_candidate(&current, UpdatePolicy::AllowPrerelease)
            .is_some());
    }

    #[test]
    fn test_equal_precedence_prefers_latest_published() {
        let mut older = raw("v2.0.0+build.1", vec![]);
        older.name = Some("older".into());
        older.published_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let mut newer = raw("v2.0.0+build.2", vec![]);
        newer.name = Some("newer".into());
        newer.published_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

        for order in [vec![older.clone(), newer.clone()], vec![newer.clone(), older.clone()]] {
            let catalog = ReleaseCatalog::from_raw(order);
            let current = SemanticVersion::parse("1.0.0").unwrap();
            let best = catalog
                .select_best_candidate(&current, UpdatePolicy::Stable)
                .unwrap();
            assert_eq!(best.name(), "newer");
        }
    }

    #[test]
    fn test_select_asset_with_hint() {
        let release = release("v1.0.0", &["app-linux-x86_64.tar.gz", "app-macos.tar.gz"]);
        let asset = select_asset(&release, Some("LINUX")).unwrap();
        assert_eq!(asset.name(), "app-linux-x86_64.tar.gz");

        assert!(matches!(
            select_asset(&release, Some("windows")),
            Err(UpdateError::NoMatchingAsset { .. })
        ));
        assert!(matches!(
            select_asset(&release, Some("app")),
            Err(UpdateError::AmbiguousAsset { ref candidates, .. }) if candidates.len() == 2
        ));
    }

    #[test]
    fn test_select_asset_exact_name_wins() {
        let release = release("v1.0.0", &["app", "app-debug"]);
        assert_eq!(select_asset(&release, Some("app")).unwrap().name(), "app");
    }

    #[test]
    fn test_select_asset_without_hint() {
        let platform = Platform {
            os: "linux".into(),
            arch: "aarch64".into(),
        };

        let empty = release("v1.0.0", &[]);
        assert!(matches!(
            select_asset_for(&empty, None, &platform),
            Err(UpdateError::NoMatchingAsset { .. })
        ));

        let single = release("v1.0.0", &["whatever.bin"]);
        assert_eq!(
            select_asset_for(&single, None, &platform).unwrap().name(),
            "whatever.bin"
        );

        let multi = release(
            "v1.0.0",
            &["app-linux-amd64.tgz", "app-linux-arm64.tgz", "app-darwin-arm64.tgz"],
        );
        assert_eq!(
            select_asset_for(&multi, None, &platform).unwrap().name(),
            "app-linux-arm64.tgz"
        );

        let unknown = Platform {
            os: "haiku".into(),
            arch: "riscv64".into(),
        };
        assert!(matches!(
            select_asset_for(&multi, None, &unknown),
            Err(UpdateError::AmbiguousAsset { .. })
        ));
    }

    #[test]
    fn test_signed_manifest_keeps_the_listing() {
        let release = release(
            "v1.0.0",
            &["app-linux.tar.gz", "checksums.txt", "checksums.txt.sig", "checksums.txt.pem"],
        );
        assert_eq!(release.assets().len(), 1);
        assert!(matches!(
            release.assets()[0].checksum(),
            Some(Checksum::Manifest { link, algorithm: DigestAlgorithm::Sha256 }) if link.name == "checksums.txt"
        ));
        assert!(release.assets()[0].signature().is_none());
    }

    #[test]
    fn test_exact_manifest_name_beats_prefixed_one() {
        for names in [
            ["app.zip", "SHA256SUMS", "app_1.0.0_checksums.txt"],
            ["app.zip", "app_1.0.0_checksums.txt", "SHA256SUMS"],
        ] {
            let release = release("v1.0.0", &names);
            assert!(matches!(
                release.assets()[0].checksum(),
                Some(Checksum::Manifest { link, .. }) if link.name == "SHA256SUMS"
            ));
        }

        let prefixed = release("v1.0.0", &["app.zip", "app_1.0.0_checksums.txt"]);
        assert!(matches!(
            prefixed.assets()[0].checksum(),
            Some(Checksum::Manifest { link, .. }) if link.name == "app_1.0.0_checksums.txt"
        ));
    }

    #[test]
    fn test_platform_arch_matches_whole_words() {
        let x86 = Platform {
            os: "linux".into(),
            arch: "x86".into(),
        };
        assert!(x86.matches("app-linux-i686.tar.gz"));
        assert!(x86.matches("app_linux_x86.tar.gz"));
        assert!(!x86.matches("app-linux-x86_64.tar.gz"));
        assert!(!x86.matches("app-linux-amd64.tar.gz"));

        let arm = Platform {
            os: "linux".into(),
            arch: "arm".into(),
        };
        assert!(arm.matches("app-linux-armv7.tar.gz"));
        assert!(arm.matches("app-linux-arm.tar.gz"));
        assert!(!arm.matches("app-linux-arm64.tar.gz"));
        assert!(!arm.matches("app-linux-aarch64.tar.gz"));

        let multi = release(
            "v1.0.0",
            &["app-linux-x86_64.tar.gz", "app-linux-i686.tar.gz", "app-linux-arm64.tar.gz"],
        );
        assert_eq!(
            select_asset_for(&multi, None, &x86).unwrap().name(),
            "app-linux-i686.tar.gz"
        );
    }

    #[test]
    fn test_find_by_tag() {
        let catalog = ReleaseCatalog::new(vec![release("v1.2.0", &[]), release("v1.3.0", &[])]);
        assert_eq!(catalog.find_by_tag("1.3.0").unwrap().tag(), "v1.3.0");
        assert_eq!(catalog.find_by_tag("v1.2.0").unwrap().tag(), "v1.2.0");
        assert!(catalog.find_by_tag("2.0.0").is_none());
    }
}
