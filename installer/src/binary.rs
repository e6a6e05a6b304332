//! Installing the k3s binary.
//!
//! The installed binary is only replaced when its digest differs from the
//! release being installed. For published releases the comparison happens
//! against the manifest before anything is downloaded, so re-running the
//! installer on a current host costs one small text fetch. Replacement is
//! atomic: the new bytes are staged next to the live binary and renamed over
//! it, so a failed run never leaves a truncated executable behind.

use crate::artefact::manifest::expected_digest;
use crate::artefact::sha256_digest::Sha256Digest;
use crate::artefact::verification::VerificationPolicy;
use crate::error::{InstallerError, Result};
use crate::output::Progress;
use crate::release::pull_request::extract_binary;
use crate::release::{ArtifactLocator, ArtifactSource};
use crate::tempdir::{InterruptGuard, ScopedTempDir};
use crate::transport::Transport;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Mode applied to installed executables.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Numeric file ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    /// User id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
}

impl Owner {
    /// `root:root`.
    pub const ROOT: Self = Self { uid: 0, gid: 0 };
}

/// Where the binary goes and who should own it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTarget {
    /// Live path of the binary.
    pub path: Utf8PathBuf,
    /// Owner to apply; `None` keeps the invoking user's ownership.
    pub owner: Option<Owner>,
}

/// What [`ensure_binary`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The installed binary already matched; nothing was written.
    AlreadyCurrent {
        /// Digest of the installed binary.
        digest: Sha256Digest,
    },
    /// A new binary was moved into place.
    Installed {
        /// Digest of the new binary.
        digest: Sha256Digest,
    },
}

impl InstallOutcome {
    /// Digest of the binary now on disk.
    #[must_use]
    pub fn digest(&self) -> &Sha256Digest {
        match self {
            Self::AlreadyCurrent { digest } | Self::Installed { digest } => digest,
        }
    }
}

/// Bring the binary at `target` up to date with `locator`.
///
/// # Errors
///
/// Returns an error if any download fails, the manifest lacks the binary,
/// the hash gate rejects the download, or the install cannot be written.
/// On a hash mismatch the live binary is left untouched.
pub fn ensure_binary(
    locator: &ArtifactLocator,
    transport: &dyn Transport,
    target: &BinaryTarget,
    progress: &mut Progress<'_>,
) -> Result<InstallOutcome> {
    let installed = Sha256Digest::of_existing_file(target.path.as_std_path())
        .map_err(InstallerError::filesystem("hash", &target.path))?;

    match &locator.source {
        ArtifactSource::Release {
            binary_url,
            manifest_url,
        } => {
            progress.info(format!("Downloading hash {manifest_url}"));
            let manifest = transport.fetch_text(manifest_url, None)?;
            let expected = expected_digest(&manifest, &locator.binary_filename)?;

            if installed.as_ref() == Some(&expected) {
                progress.info("Skipping binary downloaded, installed k3s matches hash");
                return Ok(InstallOutcome::AlreadyCurrent { digest: expected });
            }

            let scratch = ScopedTempDir::new()?;
            let download = scratch.path().join(&locator.binary_filename);
            progress.info(format!("Downloading binary {binary_url}"));
            transport.fetch_to_file(binary_url, None, &download)?;

            progress.info("Verifying binary download");
            let digest = VerificationPolicy::Checksum { expected }.verify(&download)?;
            install_staged(&download, target, progress)?;
            Ok(InstallOutcome::Installed { digest })
        }
        ArtifactSource::PullRequest { archive_url, token } => {
            let scratch = ScopedTempDir::new()?;
            let archive = scratch.path().join("k3s.zip");
            let download = scratch.path().join(&locator.binary_filename);
            progress.info(format!("Downloading pull request artifact {archive_url}"));
            transport.fetch_to_file(archive_url, Some(token), &archive)?;
            extract_binary(&archive, &locator.binary_filename, &download)?;

            progress.warn("Pull request builds have no hash manifest; skipping verification");
            let digest = VerificationPolicy::Unverified.verify(&download)?;
            if installed.as_ref() == Some(&digest) {
                progress.info("Skipping binary install, installed k3s matches artifact");
                return Ok(InstallOutcome::AlreadyCurrent { digest });
            }
            install_staged(&download, target, progress)?;
            Ok(InstallOutcome::Installed { digest })
        }
    }
}

fn install_staged(source: &Path, target: &BinaryTarget, progress: &mut Progress<'_>) -> Result<()> {
    progress.info(format!("Installing k3s to {}", target.path));
    install_binary(source, target)
}

/// Atomically replace `target.path` with the contents of `source`.
///
/// The copy is staged in the target directory so the final rename never
/// crosses filesystems.
///
/// # Errors
///
/// Returns [`InstallerError::FilesystemFailure`] naming the failed step.
pub fn install_binary(source: &Path, target: &BinaryTarget) -> Result<()> {
    let dir = parent_dir(&target.path);
    fs::create_dir_all(dir).map_err(InstallerError::filesystem("create", dir))?;

    let mut staged = tempfile::Builder::new()
        .prefix(".k3s.")
        .tempfile_in(dir)
        .map_err(InstallerError::filesystem("stage", dir))?;
    let _interrupt = InterruptGuard::new(staged.path());

    let mut input = fs::File::open(source)?;
    io::copy(&mut input, staged.as_file_mut())
        .map_err(InstallerError::filesystem("write", &target.path))?;

    fs::set_permissions(staged.path(), fs::Permissions::from_mode(EXECUTABLE_MODE))
        .map_err(InstallerError::filesystem("chmod", &target.path))?;
    if let Some(owner) = target.owner {
        std::os::unix::fs::chown(staged.path(), Some(owner.uid), Some(owner.gid))
            .map_err(InstallerError::filesystem("chown", &target.path))?;
    }

    staged
        .persist(&target.path)
        .map_err(|e| InstallerError::filesystem("move", &target.path)(e.error))?;
    log::debug!("installed {}", target.path);
    Ok(())
}

fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."))
}
