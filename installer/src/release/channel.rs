//! Channel-to-version resolution.
//!
//! The update server answers `GET {channel_url}/{channel}` with a redirect
//! to the release page of the current version. The final path segment of
//! the redirect target is the version string.

use crate::error::{InstallerError, Result};
use crate::transport::Transport;

/// Resolve `channel` to a concrete version by following its redirect.
///
/// # Errors
///
/// Returns [`InstallerError::UnresolvedRelease`] when the endpoint does not
/// redirect, or the redirect target ends in an empty segment or in the
/// channel name itself.
pub fn resolve_channel(transport: &dyn Transport, channel_url: &str, channel: &str) -> Result<String> {
    let url = format!("{}/{channel}", channel_url.trim_end_matches('/'));
    let effective = transport.effective_url(&url)?;
    log::debug!("channel {channel} redirected to {effective}");
    version_from_redirect(&url, &effective)
        .filter(|version| *version != channel)
        .map(str::to_owned)
        .ok_or_else(|| InstallerError::UnresolvedRelease {
            reason: format!("channel {channel} did not redirect to a release (got {effective})"),
        })
}

/// Extract the version from a redirect target.
///
/// Returns `None` when `effective` is the requested URL itself or ends in an
/// empty segment.
///
/// # Examples
///
/// ```
/// use k3s_installer::release::channel::version_from_redirect;
///
/// let version = version_from_redirect(
///     "https://update.k3s.io/v1-release/channels/stable",
///     "https://github.com/k3s-io/k3s/releases/tag/v1.30.2%2Bk3s1",
/// );
/// assert_eq!(version, Some("v1.30.2%2Bk3s1"));
/// ```
#[must_use]
pub fn version_from_redirect<'a>(requested: &str, effective: &'a str) -> Option<&'a str> {
    let effective = effective.trim();
    if effective.trim_end_matches('/') == requested.trim_end_matches('/') {
        return None;
    }
    let path = effective
        .split(['?', '#'])
        .next()
        .unwrap_or(effective);
    path.rsplit('/').next().filter(|segment| !segment.is_empty())
}
