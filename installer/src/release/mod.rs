//! Release resolution: from a requested reference to download URLs.
//!
//! Exactly one [`ReleaseReference`] is active per run. They are checked in a
//! fixed priority order: pull request, then commit, then explicit version,
//! then channel. The result is an [`ArtifactLocator`] describing where the
//! binary lives and, for published releases, where its hash manifest lives.
//!
//! # Sub-modules
//!
//! - [`channel`] - Channel-to-version resolution via HTTP redirect.
//! - [`pull_request`] - CI artefact lookup for pull-request builds.

pub mod channel;
pub mod pull_request;

use crate::error::{InstallerError, Result};
use crate::platform::Architecture;
use crate::transport::Transport;
use std::fmt;

/// Default GitHub release download root.
pub const DEFAULT_GITHUB_URL: &str = "https://github.com/k3s-io/k3s/releases";
/// Default storage bucket for per-commit CI builds.
pub const DEFAULT_STORAGE_URL: &str = "https://k3s-ci-builds.s3.amazonaws.com";
/// Default channel-resolution endpoint.
pub const DEFAULT_CHANNEL_URL: &str = "https://update.k3s.io/v1-release/channels";
/// Default GitHub API root for the k3s repository.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com/repos/k3s-io/k3s";
/// Channel used when no version, commit, or channel is requested.
pub const DEFAULT_CHANNEL: &str = "stable";

/// Length of a full git commit id.
const COMMIT_LEN: usize = 40;

/// Remote endpoints consulted during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSources {
    /// Release download root (`{github_url}/download/{version}/...`).
    pub github_url: String,
    /// Bucket holding per-commit builds.
    pub storage_url: String,
    /// Channel-resolution endpoint.
    pub channel_url: String,
    /// GitHub REST API root for pull-request lookups.
    pub github_api_url: String,
}

impl Default for ReleaseSources {
    fn default() -> Self {
        Self {
            github_url: DEFAULT_GITHUB_URL.to_owned(),
            storage_url: DEFAULT_STORAGE_URL.to_owned(),
            channel_url: DEFAULT_CHANNEL_URL.to_owned(),
            github_api_url: DEFAULT_GITHUB_API_URL.to_owned(),
        }
    }
}

/// The release a run should install.
#[derive(Clone, PartialEq, Eq)]
pub enum ReleaseReference {
    /// A pull-request build fetched from CI with a GitHub token.
    PullRequest {
        /// Pull request number.
        number: u64,
        /// Token sent as `Authorization: Bearer`.
        token: String,
    },
    /// A per-commit CI build.
    Commit(String),
    /// An explicit release tag such as `v1.30.2+k3s1`.
    Version(String),
    /// A named release stream resolved through the channel endpoint.
    Channel(String),
}

impl fmt::Debug for ReleaseReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PullRequest { number, .. } => f
                .debug_struct("PullRequest")
                .field("number", number)
                .field("token", &"<redacted>")
                .finish(),
            Self::Commit(commit) => f.debug_tuple("Commit").field(commit).finish(),
            Self::Version(version) => f.debug_tuple("Version").field(version).finish(),
            Self::Channel(channel) => f.debug_tuple("Channel").field(channel).finish(),
        }
    }
}

/// Raw release selectors as supplied by the operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseSelectors<'a> {
    /// Pull request number.
    pub pull_request: Option<u64>,
    /// GitHub token for pull-request downloads.
    pub github_token: Option<&'a str>,
    /// Commit id.
    pub commit: Option<&'a str>,
    /// Release tag.
    pub version: Option<&'a str>,
    /// Channel name; defaults to [`DEFAULT_CHANNEL`].
    pub channel: Option<&'a str>,
}

impl ReleaseReference {
    /// Choose the active reference by priority.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfiguration`] when a pull request is
    /// requested without a token, or a commit id is not a full sha.
    ///
    /// # Examples
    ///
    /// ```
    /// use k3s_installer::release::{ReleaseReference, ReleaseSelectors};
    ///
    /// let reference = ReleaseReference::select(&ReleaseSelectors {
    ///     version: Some("v1.30.2+k3s1"),
    ///     channel: Some("latest"),
    ///     ..ReleaseSelectors::default()
    /// })
    /// .unwrap();
    /// assert_eq!(reference, ReleaseReference::Version("v1.30.2+k3s1".to_owned()));
    /// ```
    pub fn select(selectors: &ReleaseSelectors<'_>) -> Result<Self> {
        if let Some(number) = selectors.pull_request {
            let token = non_empty(selectors.github_token).ok_or_else(|| {
                InstallerError::InvalidConfiguration {
                    reason: "GITHUB_TOKEN is required to install a pull request build".to_owned(),
                }
            })?;
            return Ok(Self::PullRequest {
                number,
                token: token.to_owned(),
            });
        }
        if let Some(commit) = non_empty(selectors.commit) {
            validate_commit(commit)?;
            return Ok(Self::Commit(commit.to_owned()));
        }
        if let Some(version) = non_empty(selectors.version) {
            return Ok(Self::Version(version.to_owned()));
        }
        let channel = non_empty(selectors.channel).unwrap_or(DEFAULT_CHANNEL);
        Ok(Self::Channel(channel.to_owned()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn validate_commit(commit: &str) -> Result<()> {
    let valid = commit.len() == COMMIT_LEN
        && commit
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if valid {
        Ok(())
    } else {
        Err(InstallerError::InvalidConfiguration {
            reason: format!("commit id {commit} must be a full {COMMIT_LEN} character sha"),
        })
    }
}

/// Where the bytes for a resolved release come from.
#[derive(Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// A published binary with a companion hash manifest.
    Release {
        /// URL of the binary itself.
        binary_url: String,
        /// URL of the `sha256sum` manifest.
        manifest_url: String,
    },
    /// A CI build archive. No manifest exists, so the hash gate is skipped.
    PullRequest {
        /// URL of the zipped build artefact.
        archive_url: String,
        /// Token sent as `Authorization: Bearer`.
        token: String,
    },
}

impl fmt::Debug for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release {
                binary_url,
                manifest_url,
            } => f
                .debug_struct("Release")
                .field("binary_url", binary_url)
                .field("manifest_url", manifest_url)
                .finish(),
            Self::PullRequest { archive_url, .. } => f
                .debug_struct("PullRequest")
                .field("archive_url", archive_url)
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// A concrete, architecture-qualified download location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocator {
    /// Human-readable version label (`v1.2.3` or `commit <sha>`).
    pub version: String,
    /// Binary filename as listed in manifests (`k3s{suffix}`).
    pub binary_filename: String,
    /// Download URLs.
    pub source: ArtifactSource,
}

/// Resolve `reference` into download URLs for `arch`.
///
/// Channel references cost one network round trip to follow the channel
/// redirect; pull-request references query the GitHub API. Commit and
/// version references are resolved offline.
///
/// # Errors
///
/// Returns [`InstallerError::UnresolvedRelease`] when a channel or pull
/// request cannot be resolved, or a download error from the transport.
pub fn resolve(
    reference: &ReleaseReference,
    arch: Architecture,
    sources: &ReleaseSources,
    transport: &dyn Transport,
) -> Result<ArtifactLocator> {
    let binary_filename = arch.binary_filename();
    let locator = match reference {
        ReleaseReference::PullRequest { number, token } => {
            let artifact = pull_request::resolve_pull_request(
                transport,
                &sources.github_api_url,
                *number,
                token,
            )?;
            ArtifactLocator {
                version: format!("commit {}", artifact.commit),
                binary_filename,
                source: ArtifactSource::PullRequest {
                    archive_url: artifact.archive_url,
                    token: token.clone(),
                },
            }
        }
        ReleaseReference::Commit(commit) => {
            let storage = sources.storage_url.trim_end_matches('/');
            let binary_url = format!("{storage}/{binary_filename}-{commit}");
            ArtifactLocator {
                version: format!("commit {commit}"),
                source: ArtifactSource::Release {
                    manifest_url: format!("{binary_url}.sha256sum"),
                    binary_url,
                },
                binary_filename,
            }
        }
        ReleaseReference::Version(version) => {
            release_locator(version.clone(), binary_filename, arch, sources)
        }
        ReleaseReference::Channel(channel) => {
            let version = channel::resolve_channel(transport, &sources.channel_url, channel)?;
            release_locator(version, binary_filename, arch, sources)
        }
    };
    log::debug!("resolved {reference:?} to {locator:?}");
    Ok(locator)
}

fn release_locator(
    version: String,
    binary_filename: String,
    arch: Architecture,
    sources: &ReleaseSources,
) -> ArtifactLocator {
    let base = format!(
        "{}/download/{version}",
        sources.github_url.trim_end_matches('/')
    );
    ArtifactLocator {
        source: ArtifactSource::Release {
            binary_url: format!("{base}/{binary_filename}"),
            manifest_url: format!("{base}/sha256sum-{}.txt", arch.canonical_name()),
        },
        version,
        binary_filename,
    }
}
