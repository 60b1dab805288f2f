//! Builders for feed records and artifacts

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use ed25519_dalek::{Signer, SigningKey};
use flate2::write::GzEncoder;
use flate2::Compression;
use hoist_update::verify::{Digest, DigestAlgorithm, SignatureEnvelope};
use hoist_update::{RawAsset, RawRelease};

use super::constants::*;

/// Builder for raw feed releases
#[derive(Debug, Clone)]
pub struct RawReleaseBuilder {
    release: RawRelease,
}

impl RawReleaseBuilder {
    pub fn new(tag: &str) -> Self {
        Self {
            release: RawRelease {
                tag_name: tag.to_string(),
                name: Some(format!("Widget {}", tag)),
                body: Some(format!("Changes in {}", tag)),
                ..Default::default()
            },
        }
    }

    pub fn body(mut self, body: &str) -> Self {
        self.release.body = Some(body.to_string());
        self
    }

    pub fn prerelease(mut self) -> Self {
        self.release.prerelease = true;
        self
    }

    pub fn draft(mut self) -> Self {
        self.release.draft = true;
        self
    }

    /// Published `day` days into 2026
    pub fn published_day(mut self, day: u32) -> Self {
        self.release.published_at = Some(day_of_2026(day));
        self
    }

    /// Add an asset served from `ASSET_BASE_URL/<tag>/<name>`
    pub fn asset(mut self, name: &str, size: u64) -> Self {
        let url = asset_url(&self.release.tag_name, name);
        self.release.assets.push(RawAsset {
            name: name.to_string(),
            browser_download_url: url,
            size,
            digest: None,
        });
        self
    }

    /// Add an asset with a feed-provided `sha256:` digest
    pub fn asset_with_digest(mut self, name: &str, body: &[u8]) -> Self {
        let digest = Digest::of_bytes(DigestAlgorithm::Sha256, body);
        self.release.assets.push(RawAsset {
            name: name.to_string(),
            browser_download_url: asset_url(&self.release.tag_name, name),
            size: body.len() as u64,
            digest: Some(digest.to_string()),
        });
        self
    }

    pub fn build(self) -> RawRelease {
        self.release
    }
}

pub fn asset_url(tag: &str, name: &str) -> String {
    format!("{}/{}/{}", ASSET_BASE_URL, tag, name)
}

pub fn day_of_2026(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap() + chrono::Duration::days(day as i64)
}

/// `.tar.gz` holding `files` under a single `widget/` directory
pub fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("widget/{}", name), *data)
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// The standard new-version payload
pub fn new_payload() -> Vec<u8> {
    tarball(&[("bin/widget", NEW_BINARY), ("widget.yaml", NEW_CONFIG)])
}

/// `sha256sum` style line for `body`
pub fn sha256_line(body: &[u8], name: &str) -> String {
    format!("{}  {}\n", Digest::of_bytes(DigestAlgorithm::Sha256, body).to_hex(), name)
}

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn public_key_base64(seed: u8) -> String {
    BASE64.encode(signing_key(seed).verifying_key().as_bytes())
}

/// Detached signature envelope over the artifact's SHA-256 digest
pub fn signature_envelope(seed: u8, artifact: &[u8]) -> Vec<u8> {
    let key = signing_key(seed);
    let digest = Digest::of_bytes(DigestAlgorithm::Sha256, artifact);
    let signature = key.sign(digest.as_bytes());
    serde_json::to_vec(&SignatureEnvelope {
        public_key: BASE64.encode(key.verifying_key().as_bytes()),
        signature: BASE64.encode(signature.to_bytes()),
    })
    .unwrap()
}
