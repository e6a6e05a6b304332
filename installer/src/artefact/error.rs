//! Error types for digest and manifest validation.
//!
//! Each variant provides a descriptive message identifying the invalid input
//! and the constraint that was violated.

use thiserror::Error;

/// Errors arising from invalid artefact-related values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtefactError {
    /// A SHA-256 digest is not a valid 64-character hex string.
    #[error("invalid SHA-256 digest: {reason}")]
    InvalidSha256Digest {
        /// Description of the validation failure.
        reason: String,
    },

    /// The hash manifest has no line for the requested binary.
    #[error("hash manifest has no entry for {filename}")]
    MissingManifestEntry {
        /// The architecture-qualified filename that was looked up.
        filename: String,
    },

    /// A pull-request build archive could not be read or lacks the binary.
    #[error("invalid build archive: {reason}")]
    InvalidArchive {
        /// Description of the archive problem.
        reason: String,
    },
}

/// Result type alias using [`ArtefactError`].
pub type Result<T> = std::result::Result<T, ArtefactError>;
