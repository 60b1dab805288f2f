//! Artifact integrity verification
//!
//! Handles SHA-256/SHA-512 checksums and Ed25519 signatures.
//!
//! A signature travels as a small JSON envelope holding the signer's public
//! key and the signature, both base64. The signed message is the raw SHA-256
//! digest of the artifact, so signatures stay valid across repackaging of the
//! metadata but not of the artifact itself.
//!
//! Verification fails closed: an asset with neither checksum nor signature
//! is rejected unless the caller explicitly opted in to unverified installs.

use crate::error::{Result, UpdateError};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

const READ_CHUNK: usize = 1024 * 1024;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Digest length in bytes
    pub fn output_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DigestParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(DigestAlgorithm::Sha256),
            "sha512" | "sha-512" => Ok(DigestAlgorithm::Sha512),
            other => Err(DigestParseError::new(s, format!("unsupported algorithm '{}'", other))),
        }
    }
}

/// Digest text that could not be understood
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid digest '{input}': {reason}")]
pub struct DigestParseError {
    pub input: String,
    pub reason: String,
}

impl DigestParseError {
    fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// A checksum value tagged with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    /// Parse `sha256:<hex>`, `sha512:<hex>`, or bare hex (algorithm from length)
    pub fn parse(text: &str) -> std::result::Result<Self, DigestParseError> {
        let text = text.trim();
        match text.split_once(':') {
            Some((algorithm, hex)) => Self::from_hex(algorithm.parse()?, hex),
            None => {
                let algorithm = match text.len() {
                    64 => DigestAlgorithm::Sha256,
                    128 => DigestAlgorithm::Sha512,
                    n => {
                        return Err(DigestParseError::new(
                            text,
                            format!("{} hex characters match no supported algorithm", n),
                        ))
                    }
                };
                Self::from_hex(algorithm, text)
            }
        }
    }

    /// Decode hex text for a known algorithm
    pub fn from_hex(
        algorithm: DigestAlgorithm,
        hex_text: &str,
    ) -> std::result::Result<Self, DigestParseError> {
        let bytes = hex::decode(hex_text.trim())
            .map_err(|e| DigestParseError::new(hex_text, e.to_string()))?;
        if bytes.len() != algorithm.output_len() {
            return Err(DigestParseError::new(
                hex_text,
                format!(
                    "{} digest must be {} bytes, got {}",
                    algorithm,
                    algorithm.output_len(),
                    bytes.len()
                ),
            ));
        }
        Ok(Self { algorithm, bytes })
    }

    pub fn of_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let bytes = match algorithm {
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        };
        Self { algorithm, bytes }
    }

    pub fn of_reader<R: Read>(algorithm: DigestAlgorithm, reader: R) -> io::Result<Self> {
        let bytes = match algorithm {
            DigestAlgorithm::Sha256 => hash_reader::<Sha256, _>(reader)?,
            DigestAlgorithm::Sha512 => hash_reader::<Sha512, _>(reader)?,
        };
        Ok(Self { algorithm, bytes })
    }

    /// Hash a file in 1MB chunks
    pub fn of_file(algorithm: DigestAlgorithm, path: &Path) -> io::Result<Self> {
        Self::of_reader(algorithm, BufReader::new(File::open(path)?))
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

fn hash_reader<H: sha2::Digest, R: Read>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut hasher = H::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_vec())
}

/// Find the digest for `asset_name` in `sha256sum`-style text
///
/// Lines look like `<hex>  <name>` (a leading `*` marks binary mode). A file
/// holding a single bare digest applies to whichever asset it accompanies.
pub fn parse_checksum_listing(
    text: &str,
    asset_name: &str,
    algorithm: DigestAlgorithm,
) -> Option<Digest> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    for line in &lines {
        let mut parts = line.split_whitespace();
        let Some(hex_text) = parts.next() else {
            continue;
        };
        match parts.next() {
            Some(name) => {
                let name = name.trim_start_matches('*');
                let file_name = name.rsplit('/').next().unwrap_or(name);
                if file_name == asset_name {
                    return Digest::from_hex(algorithm, hex_text).ok();
                }
            }
            None if lines.len() == 1 => return Digest::from_hex(algorithm, hex_text).ok(),
            None => {}
        }
    }
    None
}

/// Detached signature document published next to an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEnvelope {
    /// Signer's Ed25519 public key, base64
    pub public_key: String,
    /// Ed25519 signature over the artifact's SHA-256 digest, base64
    pub signature: String,
}

#[derive(Debug, Clone)]
struct TrustedKey {
    name: String,
    key: VerifyingKey,
}

/// Signer keys whose signatures are accepted
#[derive(Debug, Clone, Default)]
pub struct TrustSet {
    keys: Vec<TrustedKey>,
}

impl TrustSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, name: impl Into<String>, key: VerifyingKey) -> Self {
        self.add(name, key);
        self
    }

    pub fn add(&mut self, name: impl Into<String>, key: VerifyingKey) {
        self.keys.push(TrustedKey {
            name: name.into(),
            key,
        });
    }

    /// Build from `(name, base64 public key)` pairs
    pub fn from_base64<I, N, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, K)>,
        N: Into<String>,
        K: AsRef<str>,
    {
        let mut trust = Self::new();
        for (name, encoded) in entries {
            let name = name.into();
            let key = decode_public_key(encoded.as_ref()).map_err(|reason| {
                UpdateError::config(format!("trusted key '{}' is invalid: {}", name, reason))
            })?;
            trust.add(name, key);
        }
        Ok(trust)
    }

    /// Display name of a trusted key
    pub fn find(&self, key: &VerifyingKey) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.key.as_bytes() == key.as_bytes())
            .map(|k| k.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn decode_public_key(encoded: &str) -> std::result::Result<VerifyingKey, String> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| format!("public key is not base64: {}", e))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("public key must be 32 bytes, got {}", bytes.len()))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| format!("public key is not a valid point: {}", e))
}

/// Integrity material resolved for one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationMaterial {
    /// Expected digest
    pub checksum: Option<Digest>,
    /// Raw signature envelope
    pub signature: Option<Vec<u8>>,
}

impl VerificationMaterial {
    pub fn is_empty(&self) -> bool {
        self.checksum.is_none() && self.signature.is_none()
    }
}

/// What verification established about an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// SHA-256 of the artifact as verified
    pub sha256: Digest,
    /// Algorithm of the checksum that matched, if one was checked
    pub checksum: Option<DigestAlgorithm>,
    /// Trusted signer name, if a signature was checked
    pub signer: Option<String>,
    /// Installed without any verification (explicit opt-out)
    pub unverified: bool,
}

/// Checks artifacts against their checksum and signature
#[derive(Debug, Clone)]
pub struct Verifier {
    trust: TrustSet,
    allow_unverified: bool,
}

impl Verifier {
    pub fn new(trust: TrustSet) -> Self {
        Self {
            trust,
            allow_unverified: false,
        }
    }

    /// Accept assets that carry no integrity material at all
    pub fn allow_unverified(mut self, allow: bool) -> Self {
        self.allow_unverified = allow;
        self
    }

    pub fn trust(&self) -> &TrustSet {
        &self.trust
    }

    /// Verify a downloaded file; the file is only read
    pub fn verify_file(
        &self,
        path: &Path,
        asset_name: &str,
        material: &VerificationMaterial,
    ) -> Result<VerificationResult> {
        self.verify_with(asset_name, material, |algorithm| {
            Digest::of_file(algorithm, path)
        })
    }

    /// Verify an in-memory artifact
    pub fn verify_bytes(
        &self,
        bytes: &[u8],
        asset_name: &str,
        material: &VerificationMaterial,
    ) -> Result<VerificationResult> {
        self.verify_with(asset_name, material, |algorithm| {
            Ok(Digest::of_bytes(algorithm, bytes))
        })
    }

    fn verify_with<F>(
        &self,
        asset_name: &str,
        material: &VerificationMaterial,
        digest_of: F,
    ) -> Result<VerificationResult>
    where
        F: Fn(DigestAlgorithm) -> io::Result<Digest>,
    {
        if material.is_empty() && !self.allow_unverified {
            return Err(UpdateError::UnverifiableAsset {
                asset: asset_name.to_string(),
            });
        }

        let sha256 = digest_of(DigestAlgorithm::Sha256)?;

        if material.is_empty() {
            warn!(
                asset = %asset_name,
                sha256 = %sha256.to_hex(),
                "installing without checksum or signature verification (allow-unverified is set)"
            );
            return Ok(VerificationResult {
                sha256,
                checksum: None,
                signer: None,
                unverified: true,
            });
        }

        let checksum = match &material.checksum {
            Some(expected) => {
                let actual = if expected.algorithm() == DigestAlgorithm::Sha256 {
                    sha256.clone()
                } else {
                    digest_of(expected.algorithm())?
                };
                if actual.as_bytes() != expected.as_bytes() {
                    return Err(UpdateError::ChecksumMismatch {
                        asset: asset_name.to_string(),
                        expected: expected.to_hex(),
                        actual: actual.to_hex(),
                    });
                }
                debug!(asset = %asset_name, algorithm = %expected.algorithm(), "checksum verified");
                Some(expected.algorithm())
            }
            None => None,
        };

        let signer = match &material.signature {
            Some(envelope) => Some(self.check_signature(asset_name, envelope, &sha256)?),
            None => None,
        };

        Ok(VerificationResult {
            sha256,
            checksum,
            signer,
            unverified: false,
        })
    }

    fn check_signature(&self, asset_name: &str, raw: &[u8], sha256: &Digest) -> Result<String> {
        let invalid = |reason: String| UpdateError::SignatureInvalid {
            asset: asset_name.to_string(),
            reason,
        };

        let envelope: SignatureEnvelope = serde_json::from_slice(raw)
            .map_err(|e| invalid(format!("malformed signature envelope: {}", e)))?;
        let key = decode_public_key(&envelope.public_key).map_err(invalid)?;

        let signature_bytes = BASE64
            .decode(envelope.signature.trim())
            .map_err(|e| invalid(format!("signature is not base64: {}", e)))?;
        let signature_bytes: [u8; 64] = signature_bytes
            .as_slice()
            .try_into()
            .map_err(|_| invalid(format!("signature must be 64 bytes, got {}", signature_bytes.len())))?;
        let signature = Signature::from_bytes(&signature_bytes);

        key.verify_strict(sha256.as_bytes(), &signature)
            .map_err(|_| invalid("signature does not match the artifact".to_string()))?;

        match self.trust.find(&key) {
            Some(name) => {
                debug!(asset = %asset_name, signer = %name, "signature verified");
                Ok(name.to_string())
            }
            None => Err(UpdateError::UntrustedSigner {
                asset: asset_name.to_string(),
                signer: BASE64.encode(key.as_bytes()),
            }),
        }
    }
}
