//! Release catalog tests
//!
//! Tests cover:
//! - Feed normalization (drafts, unparseable tags, sidecar and manifest pairing)
//! - Candidate selection per policy
//! - Equal-version tie-break
//! - Asset selection by hint and platform

mod common;

use common::*;
use hoist_core::UpdatePolicy;
use hoist_update::releases::{select_asset_for, Checksum};
use hoist_update::{Release, ReleaseCatalog, ReleaseVerdict, UpdateError};

fn catalog(records: Vec<hoist_update::RawRelease>) -> ReleaseCatalog {
    ReleaseCatalog::from_raw(records)
}

fn tags(catalog: &ReleaseCatalog) -> Vec<&str> {
    catalog.releases().iter().map(|r| r.tag()).collect()
}

#[test]
fn test_stable_policy_picks_newest_release_over_prerelease() {
    let catalog = catalog(vec![
        RawReleaseBuilder::new(TAG_V2_0_0).build(),
        RawReleaseBuilder::new("v1.9.9").build(),
        RawReleaseBuilder::new(TAG_V2_0_0_BETA).build(),
    ]);

    let best = catalog
        .select_best_candidate(&v("1.9.0"), UpdatePolicy::Stable)
        .unwrap();
    assert_eq!(best.tag(), TAG_V2_0_0);
}

#[test]
fn test_stable_policy_from_1_2_3() {
    let catalog = catalog(vec![
        RawReleaseBuilder::new(TAG_V1_3_0_RC1).build(),
        RawReleaseBuilder::new(TAG_V1_2_3).build(),
    ]);
    let current = v(VERSION_1_2_3);

    let rc = catalog.find_by_tag(TAG_V1_3_0_RC1).unwrap();
    let same = catalog.find_by_tag(TAG_V1_2_3).unwrap();
    assert_eq!(
        ReleaseCatalog::verdict(rc, &current, UpdatePolicy::Stable),
        ReleaseVerdict::OutsidePolicy
    );
    assert_eq!(
        ReleaseCatalog::verdict(same, &current, UpdatePolicy::Stable),
        ReleaseVerdict::NotNewer
    );
    assert!(catalog
        .select_best_candidate(&current, UpdatePolicy::Stable)
        .is_none());

    let with_final = ReleaseCatalog::from_raw(vec![
        RawReleaseBuilder::new(TAG_V1_3_0_RC1).build(),
        RawReleaseBuilder::new(TAG_V1_3_0).build(),
    ]);
    let best = with_final
        .select_best_candidate(&current, UpdatePolicy::Stable)
        .unwrap();
    assert_eq!(best.tag(), TAG_V1_3_0);
}

#[test]
fn test_allow_prerelease_policy_takes_release_candidate() {
    let catalog = catalog(vec![
        RawReleaseBuilder::new(TAG_V1_3_0_RC1).build(),
        RawReleaseBuilder::new(TAG_V1_2_3).build(),
    ]);
    let best = catalog
        .select_best_candidate(&v(VERSION_1_2_3), UpdatePolicy::AllowPrerelease)
        .unwrap();
    assert_eq!(best.tag(), TAG_V1_3_0_RC1);
}

#[test]
fn test_feed_prerelease_flag_is_honoured() {
    let catalog = catalog(vec![RawReleaseBuilder::new(TAG_V1_3_0).prerelease().build()]);
    assert!(catalog
        .select_best_candidate(&v(VERSION_1_2_3), UpdatePolicy::Stable)
        .is_none());
    assert!(catalog
        .select_best_candidate(&v(VERSION_1_2_3), UpdatePolicy::AllowPrerelease)
        .is_some());
}

#[test]
fn test_narrow_policies_bound_the_jump() {
    let catalog = catalog(vec![
        RawReleaseBuilder::new(TAG_V2_0_0).build(),
        RawReleaseBuilder::new(TAG_V1_3_0).build(),
        RawReleaseBuilder::new("v1.2.9").build(),
    ]);
    let current = v(VERSION_1_2_3);

    let pick = |policy| {
        catalog
            .select_best_candidate(&current, policy)
            .map(|r| r.tag().to_string())
    };
    assert_eq!(pick(UpdatePolicy::Stable).as_deref(), Some(TAG_V2_0_0));
    assert_eq!(pick(UpdatePolicy::MinorOnly).as_deref(), Some(TAG_V1_3_0));
    assert_eq!(pick(UpdatePolicy::PatchOnly).as_deref(), Some("v1.2.9"));
}

#[test]
fn test_equal_versions_resolve_to_latest_publish() {
    let catalog = catalog(vec![
        RawReleaseBuilder::new("v2.0.0+build.1").published_day(3).build(),
        RawReleaseBuilder::new("2.0.0").published_day(9).build(),
        RawReleaseBuilder::new("v2.0.0+build.0").published_day(1).build(),
    ]);
    let best = catalog
        .select_best_candidate(&v(VERSION_1_0_0), UpdatePolicy::Stable)
        .unwrap();
    assert_eq!(best.tag(), "2.0.0");
}

#[test]
fn test_drafts_dropped_and_unparseable_tags_kept_for_listing() {
    let catalog = catalog(vec![
        RawReleaseBuilder::new(TAG_V2_0_0).draft().build(),
        RawReleaseBuilder::new("nightly").build(),
        RawReleaseBuilder::new(TAG_V1_3_0).build(),
    ]);

    assert_eq!(tags(&catalog), vec!["nightly", TAG_V1_3_0]);
    let nightly = catalog.find_by_tag("nightly").unwrap();
    assert!(nightly.version().is_none());
    assert_eq!(
        ReleaseCatalog::verdict(nightly, &v(VERSION_1_0_0), UpdatePolicy::AllowPrerelease),
        ReleaseVerdict::UnparseableTag
    );
    assert_eq!(catalog.latest().unwrap().tag(), TAG_V1_3_0);
}

#[test]
fn test_find_by_tag_ignores_v_prefix() {
    let catalog = catalog(vec![RawReleaseBuilder::new(TAG_V1_3_0).build()]);
    assert!(catalog.find_by_tag("1.3.0").is_some());
    assert!(catalog.find_by_tag(TAG_V1_3_0).is_some());
    assert!(catalog.find_by_tag("v1.3.1").is_none());
}

#[test]
fn test_sidecars_and_manifest_attach_to_assets() {
    let release = Release::from_raw(
        RawReleaseBuilder::new(TAG_V2_0_0)
            .asset(ASSET_TARBALL, 100)
            .asset(&format!("{}.sha256", ASSET_TARBALL), 90)
            .asset(&format!("{}.sig", ASSET_TARBALL), 120)
            .asset(ASSET_ZIP, 100)
            .asset("SHA256SUMS", 200)
            .build(),
    )
    .unwrap();

    let names: Vec<&str> = release.assets().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec![ASSET_TARBALL, ASSET_ZIP]);

    let tarball = &release.assets()[0];
    assert!(matches!(tarball.checksum(), Some(Checksum::Sidecar { .. })));
    assert!(tarball.signature().is_some());

    let zip = &release.assets()[1];
    assert!(matches!(zip.checksum(), Some(Checksum::Manifest { .. })));
    assert!(zip.signature().is_none());
}

#[test]
fn test_signed_checksum_listing_stays_the_manifest() {
    let release = Release::from_raw(
        RawReleaseBuilder::new(TAG_V2_0_0)
            .asset(ASSET_TARBALL, 100)
            .asset("checksums.txt", 200)
            .asset("checksums.txt.sig", 64)
            .asset("checksums.txt.pem", 900)
            .build(),
    )
    .unwrap();

    let names: Vec<&str> = release.assets().iter().map(|a| a.name()).collect();
    assert_eq!(names, vec![ASSET_TARBALL]);
    match release.assets()[0].checksum() {
        Some(Checksum::Manifest { link, .. }) => assert_eq!(link.name, "checksums.txt"),
        other => panic!("expected the checksums.txt manifest, got {:?}", other),
    }
}

#[test]
fn test_asset_hint_prefers_exact_name() {
    let release = Release::from_raw(
        RawReleaseBuilder::new(TAG_V2_0_0)
            .asset("widget-linux-x86_64", 10)
            .asset("widget-linux-x86_64.tar.gz", 10)
            .build(),
    )
    .unwrap();

    let chosen = select_asset_for(&release, Some("widget-linux-x86_64"), &linux_x86_64()).unwrap();
    assert_eq!(chosen.name(), "widget-linux-x86_64");

    let err = select_asset_for(&release, Some("darwin"), &linux_x86_64()).unwrap_err();
    assert!(matches!(err, UpdateError::NoMatchingAsset { .. }));
}

#[test]
fn test_platform_narrows_without_hint() {
    let release = Release::from_raw(
        RawReleaseBuilder::new(TAG_V2_0_0)
            .asset(ASSET_ZIP, 10)
            .asset(ASSET_TARBALL, 10)
            .asset("widget-darwin-arm64.tar.gz", 10)
            .build(),
    )
    .unwrap();

    let chosen = select_asset_for(&release, None, &linux_x86_64()).unwrap();
    assert_eq!(chosen.name(), ASSET_TARBALL);

    let unknown = hoist_update::Platform {
        os: "plan9".to_string(),
        arch: "mips".to_string(),
    };
    let err = select_asset_for(&release, None, &unknown).unwrap_err();
    assert!(matches!(err, UpdateError::AmbiguousAsset { ref candidates, .. } if candidates.len() == 3));
}

#[test]
fn test_release_without_assets_has_no_match() {
    let release = Release::from_raw(RawReleaseBuilder::new(TAG_V2_0_0).build()).unwrap();
    assert!(matches!(
        select_asset_for(&release, None, &linux_x86_64()),
        Err(UpdateError::NoMatchingAsset { hint: None, .. })
    ));
}
