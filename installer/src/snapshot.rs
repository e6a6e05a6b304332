//! Before/after snapshots of the installed artefacts.
//!
//! The service is restarted only when at least one of the binary, the unit
//! file, or the environment file changed during a run. A snapshot records
//! the digest of each, with `None` for a file that does not exist.

use crate::artefact::sha256_digest::Sha256Digest;
use crate::error::{InstallerError, Result};
use crate::layout::InstallLayout;
use camino::Utf8Path;
use std::fmt;

/// Digests of the three tracked files at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledState {
    /// The k3s binary.
    pub binary: Option<Sha256Digest>,
    /// The unit file.
    pub unit_file: Option<Sha256Digest>,
    /// The environment file.
    pub env_file: Option<Sha256Digest>,
}

impl InstalledState {
    /// Hash the tracked files of `layout` as they are now.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::FilesystemFailure`] if a file exists but
    /// cannot be read.
    pub fn capture(layout: &InstallLayout) -> Result<Self> {
        Ok(Self {
            binary: digest_of(&layout.binary)?,
            unit_file: digest_of(&layout.unit_file)?,
            env_file: digest_of(&layout.env_file)?,
        })
    }
}

fn digest_of(path: &Utf8Path) -> Result<Option<Sha256Digest>> {
    Sha256Digest::of_existing_file(path.as_std_path()).map_err(InstallerError::filesystem("hash", path))
}

impl fmt::Display for InstalledState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digest in [&self.binary, &self.unit_file, &self.env_file] {
            match digest {
                Some(digest) => writeln!(f, "{digest}")?,
                None => writeln!(f, "-")?,
            }
        }
        Ok(())
    }
}
