//! Error types for the k3s installer.
//!
//! Every variant is fatal. The lifecycle controller stops at the first error
//! it sees and the binary prints a single diagnostic line before exiting
//! non-zero. Nothing here is retried.

use crate::artefact::error::ArtefactError;
use crate::artefact::sha256_digest::Sha256Digest;
use crate::transport::DownloadError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur during an install or upgrade run.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The host lacks systemd or reports an architecture that is not enabled.
    #[error("unsupported platform: {reason}")]
    UnsupportedPlatform {
        /// Description of the missing facility or rejected architecture.
        reason: String,
    },

    /// Installer options contradict each other or name an invalid service.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the rejected setting.
        reason: String,
    },

    /// The requested channel, commit, or pull request could not be turned
    /// into a download location.
    #[error("unable to resolve release: {reason}")]
    UnresolvedRelease {
        /// Description of why resolution failed.
        reason: String,
    },

    /// A transport reported a failure while fetching remote bytes.
    #[error(transparent)]
    DownloadFailure(#[from] DownloadError),

    /// The hash manifest or a digest inside it was malformed.
    #[error(transparent)]
    Artefact(#[from] ArtefactError),

    /// The fetched binary does not hash to the digest named by the manifest.
    #[error("download sha256 does not match {expected}, got {actual}")]
    HashMismatch {
        /// Digest listed in the release manifest.
        expected: Sha256Digest,
        /// Digest computed from the downloaded bytes.
        actual: Sha256Digest,
    },

    /// A filesystem mutation on one of the installed paths failed.
    #[error("failed to {action} {path}: {source}")]
    FilesystemFailure {
        /// What the installer was attempting (`write`, `chmod`, ...).
        action: &'static str,
        /// The path being operated on.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `systemctl` rejected a lifecycle operation.
    #[error("systemctl {operation} {unit} failed: {message}")]
    ServiceManager {
        /// The systemctl verb that failed.
        operation: &'static str,
        /// The unit the verb was applied to.
        unit: String,
        /// Captured stderr from systemctl.
        message: String,
    },

    /// The interrupt handler that cleans up temporary downloads could not be
    /// installed.
    #[error("failed to install interrupt handler: {0}")]
    SignalHandler(#[from] ctrlc::Error),

    /// An I/O operation failed outside the tracked install paths.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallerError {
    /// Wrap an I/O error raised while mutating `path`.
    pub(crate) fn filesystem(
        action: &'static str,
        path: impl Into<Utf8PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::FilesystemFailure {
            action,
            path,
            source,
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_mismatch_reports_both_digests() {
        let expected = Sha256Digest::try_from("a".repeat(64)).expect("valid digest");
        let actual = Sha256Digest::try_from("b".repeat(64)).expect("valid digest");
        let msg = InstallerError::HashMismatch { expected, actual }.to_string();
        assert!(msg.contains(&"a".repeat(64)));
        assert!(msg.contains(&"b".repeat(64)));
    }

    #[test]
    fn filesystem_failure_names_action_and_path() {
        let source = std::io::Error::other("read-only file system");
        let err = InstallerError::filesystem("chmod", "/usr/local/bin/k3s")(source);
        let msg = err.to_string();
        assert!(msg.contains("chmod"));
        assert!(msg.contains("/usr/local/bin/k3s"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn service_manager_error_includes_operation_and_unit() {
        let err = InstallerError::ServiceManager {
            operation: "restart",
            unit: "k3s".to_owned(),
            message: "Unit k3s.service not found.".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("restart"));
        assert!(msg.contains("k3s"));
    }

    #[test]
    fn download_failure_is_transparent() {
        let err = InstallerError::from(DownloadError::NotFound {
            url: "https://example.test/k3s".to_owned(),
        });
        assert!(err.to_string().contains("https://example.test/k3s"));
    }
}
