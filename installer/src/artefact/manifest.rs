//! Hash manifest lookup.
//!
//! Release manifests are plain `sha256sum` output: one entry per line, a hex
//! digest, whitespace, then a filename. Only the line whose trailing token
//! is exactly the architecture-qualified binary name is considered.

use super::error::{ArtefactError, Result};
use super::sha256_digest::Sha256Digest;

/// Extract the expected digest for `filename` from manifest text.
///
/// The first line whose last whitespace-delimited token equals `filename`
/// wins. Its leading field is parsed as the digest; any further columns are
/// ignored.
///
/// # Errors
///
/// Returns [`ArtefactError::MissingManifestEntry`] when no line names
/// `filename`, or [`ArtefactError::InvalidSha256Digest`] when the matching
/// line carries a malformed digest.
///
/// # Examples
///
/// ```
/// use k3s_installer::artefact::manifest::expected_digest;
///
/// let digest = "a".repeat(64);
/// let manifest = format!("{digest}  k3s\n{}  k3s-arm64\n", "b".repeat(64));
/// let found = expected_digest(&manifest, "k3s").unwrap();
/// assert_eq!(found.as_str(), digest);
/// ```
pub fn expected_digest(manifest: &str, filename: &str) -> Result<Sha256Digest> {
    let digest = manifest
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let digest = fields.next()?;
            let name = fields.next_back()?;
            (name == filename).then_some(digest)
        })
        .next()
        .ok_or_else(|| ArtefactError::MissingManifestEntry {
            filename: filename.to_owned(),
        })?;
    Sha256Digest::try_from(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(c: char) -> String {
        std::iter::repeat_n(c, 64).collect()
    }

    #[test]
    fn selects_line_for_exact_filename() {
        let manifest = format!(
            "{}  k3s-airgap-images-amd64.tar\n{}  k3s\n{}  k3s-arm64\n",
            hex('1'),
            hex('2'),
            hex('3')
        );
        let digest = expected_digest(&manifest, "k3s").expect("entry present");
        assert_eq!(digest.as_str(), hex('2'));
    }

    #[test]
    fn does_not_match_filename_suffixes() {
        let manifest = format!("{}  k3s-arm64\n", hex('3'));
        let err = expected_digest(&manifest, "k3s").expect_err("no exact match");
        assert!(matches!(err, ArtefactError::MissingManifestEntry { .. }));
    }

    #[test]
    fn accepts_tab_separated_columns() {
        let manifest = format!("{}\t\tk3s\n", hex('4'));
        assert!(expected_digest(&manifest, "k3s").is_ok());
    }

    #[test]
    fn ignores_lines_without_a_filename() {
        let manifest = format!("k3s\n{}  k3s\n", hex('5'));
        let digest = expected_digest(&manifest, "k3s").expect("second line matches");
        assert_eq!(digest.as_str(), hex('5'));
    }

    #[test]
    fn rejects_malformed_digest_on_matching_line() {
        let err = expected_digest("abcd1234  k3s\n", "k3s").expect_err("short digest");
        assert!(matches!(err, ArtefactError::InvalidSha256Digest { .. }));
    }

    #[test]
    fn empty_manifest_is_missing_entry() {
        assert!(expected_digest("", "k3s").is_err());
    }
}
