//! SHA-256 digests as used by release hash manifests.
//!
//! Digests are held as lowercase hex so that a value parsed from a
//! `sha256sum` manifest compares equal to one computed locally, whatever
//! case the manifest was written in.

use super::error::{ArtefactError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

const HEX_DIGITS: usize = 64;

/// A hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use k3s_installer::artefact::sha256_digest::Sha256Digest;
///
/// let parsed: Sha256Digest = "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
///     .parse()
///     .unwrap();
/// assert_eq!(parsed, Sha256Digest::of_bytes(b""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Hash an in-memory byte slice.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self::finish(Sha256::new_with_prefix(bytes))
    }

    /// Stream a file through SHA-256.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while opening or reading `path`.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        io::copy(&mut fs::File::open(path)?, &mut hasher)?;
        Ok(Self::finish(hasher))
    }

    /// Hash `path`, or `None` if there is no file there.
    ///
    /// # Errors
    ///
    /// Returns I/O errors other than `NotFound`.
    pub fn of_existing_file(path: &Path) -> io::Result<Option<Self>> {
        match Self::of_file(path) {
            Ok(digest) => Ok(Some(digest)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lowercase hex text of the digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn finish(hasher: Sha256) -> Self {
        Self(format!("{:x}", hasher.finalize()))
    }
}

impl FromStr for Sha256Digest {
    type Err = ArtefactError;

    fn from_str(text: &str) -> Result<Self> {
        let invalid = |reason: String| ArtefactError::InvalidSha256Digest { reason };
        if let Some(bad) = text.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(invalid(format!("{bad:?} is not a hex digit")));
        }
        if text.len() != HEX_DIGITS {
            return Err(invalid(format!(
                "{} hex digits where {HEX_DIGITS} are required",
                text.len()
            )));
        }
        Ok(Self(text.to_ascii_lowercase()))
    }
}

impl TryFrom<&str> for Sha256Digest {
    type Error = ArtefactError;

    fn try_from(text: &str) -> Result<Self> {
        text.parse()
    }
}

impl TryFrom<String> for Sha256Digest {
    type Error = ArtefactError;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
