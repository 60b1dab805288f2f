//! Per-attempt staging area
//!
//! Every attempt gets a fresh temporary directory under the install root's
//! `.staging/`, on the same filesystem as the live installation so the
//! committed payload can be moved into place with a rename. The directory is
//! removed when the `StagingArea` is dropped, whatever the outcome.

use crate::error::{Result, UpdateError};
use crate::releases::Asset;
use crate::verify::VerificationResult;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Artifact payload ready to be committed
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    /// Directory whose contents become the installation
    pub location: PathBuf,
    /// Asset the payload came from
    pub asset: Asset,
    /// How the artifact was verified
    pub verification: VerificationResult,
}

/// Temporary workspace for one update attempt
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a fresh staging directory inside `parent`
    pub fn create(parent: &Path) -> Result<Self> {
        fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix("attempt-")
            .tempdir_in(parent)?;
        debug!("Created staging area {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the downloaded artifact for `asset_name` is written
    pub fn download_path(&self, asset_name: &str) -> PathBuf {
        self.dir.path().join(sanitize_file_name(asset_name))
    }

    fn payload_dir(&self) -> PathBuf {
        self.dir.path().join("payload")
    }

    /// Unpack a verified artifact into the payload directory
    ///
    /// `.tar.gz`/`.tgz` and `.zip` archives are extracted, flattening a single
    /// top-level directory. Any other file is staged on its own as
    /// `entry_name` (default: the asset name) and made executable.
    pub fn stage(
        &self,
        artifact: &Path,
        asset: &Asset,
        verification: VerificationResult,
        entry_name: Option<&str>,
    ) -> Result<StagedArtifact> {
        let payload = self.payload_dir();
        fs::create_dir_all(&payload)?;

        let staging_error = |e: io::Error| UpdateError::Staging {
            asset: asset.name().to_string(),
            message: e.to_string(),
        };

        match ArchiveKind::detect(asset.name()) {
            ArchiveKind::TarGz => extract_tar_gz(artifact, &payload).map_err(staging_error)?,
            ArchiveKind::Zip => extract_zip(artifact, &payload).map_err(staging_error)?,
            ArchiveKind::Raw => {
                let name = sanitize_file_name(entry_name.unwrap_or(asset.name()));
                let target = payload.join(name);
                fs::copy(artifact, &target).map_err(staging_error)?;
                make_executable(&target).map_err(staging_error)?;
            }
        }

        let location = flatten_single_dir(&payload).map_err(staging_error)?;
        if is_empty_dir(&location).map_err(staging_error)? {
            return Err(UpdateError::Staging {
                asset: asset.name().to_string(),
                message: "archive contains no files".to_string(),
            });
        }

        debug!("Staged {} at {}", asset.name(), location.display());
        Ok(StagedArtifact {
            location,
            asset: asset.clone(),
            verification,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    TarGz,
    Zip,
    Raw,
}

impl ArchiveKind {
    fn detect(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            ArchiveKind::TarGz
        } else if lower.ends_with(".zip") {
            ArchiveKind::Zip
        } else {
            ArchiveKind::Raw
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base {
        "" | "." | ".." => "artifact".to_string(),
        other => other.to_string(),
    }
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> io::Result<()> {
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    // `unpack` refuses entries that would escape `dest`
    tar.unpack(dest)
}

fn extract_zip(archive: &Path, dest: &Path) -> io::Result<()> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(io::Error::other)?;

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(io::Error::other)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("zip entry escapes the archive root: {}", entry.name()),
            ));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o7777))?;
        }
    }
    Ok(())
}

/// Descend into a lone top-level directory (`app-1.2.0/…`)
fn flatten_single_dir(payload: &Path) -> io::Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(payload)?.collect::<io::Result<_>>()?;
    match entries.as_slice() {
        [only] if only.file_type()?.is_dir() => Ok(only.path()),
        _ => Ok(payload.to_path_buf()),
    }
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
