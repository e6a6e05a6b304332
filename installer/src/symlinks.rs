//! Convenience symlinks for the tools k3s embeds.
//!
//! The k3s binary dispatches on `argv[0]`, so `kubectl`, `crictl` and `ctr`
//! work as relative symlinks to it. Existing files are left alone, as are
//! commands an operator already has elsewhere on `PATH`, unless linking is
//! forced.

use crate::error::{InstallerError, Result};
use crate::output::Progress;
use camino::Utf8Path;
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

/// Commands linked to the k3s binary.
pub const SYMLINK_COMMANDS: [&str; 3] = ["kubectl", "crictl", "ctr"];

/// Relative link target, resolved against the link's own directory.
pub const LINK_TARGET: &str = "k3s";

/// `INSTALL_K3S_SYMLINK` behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SymlinkPolicy {
    /// Link commands that are neither present in the bin dir nor on `PATH`.
    #[default]
    Auto,
    /// Create no links.
    Skip,
    /// Replace whatever is present.
    Force,
}

impl FromStr for SymlinkPolicy {
    type Err = InstallerError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "" | "auto" => Ok(Self::Auto),
            "skip" => Ok(Self::Skip),
            "force" => Ok(Self::Force),
            other => Err(InstallerError::InvalidConfiguration {
                reason: format!("INSTALL_K3S_SYMLINK must be skip or force, not {other:?}"),
            }),
        }
    }
}

/// What happened to one command's link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymlinkAction {
    /// The link was written.
    Created(&'static str),
    /// The bin dir already has an entry of that name.
    AlreadyExists(&'static str),
    /// The command resolves elsewhere on `PATH`.
    FoundOnPath(&'static str, PathBuf),
}

/// Create the symlinks in `bin_dir`, searching `search_path` (a `PATH`
/// value) for commands the operator already has.
///
/// # Errors
///
/// Returns [`InstallerError::FilesystemFailure`] if a link cannot be
/// replaced or written.
pub fn create_symlinks(
    bin_dir: &Utf8Path,
    policy: SymlinkPolicy,
    search_path: Option<&OsStr>,
    progress: &mut Progress<'_>,
) -> Result<Vec<SymlinkAction>> {
    if policy == SymlinkPolicy::Skip {
        return Ok(Vec::new());
    }

    let mut actions = Vec::with_capacity(SYMLINK_COMMANDS.len());
    for cmd in SYMLINK_COMMANDS {
        let link = bin_dir.join(cmd);
        let action = if policy == SymlinkPolicy::Force {
            replace_link(&link)?;
            SymlinkAction::Created(cmd)
        } else if link.symlink_metadata().is_ok() {
            SymlinkAction::AlreadyExists(cmd)
        } else if let Some(found) = find_on_path(cmd, search_path) {
            SymlinkAction::FoundOnPath(cmd, found)
        } else {
            replace_link(&link)?;
            SymlinkAction::Created(cmd)
        };

        match &action {
            SymlinkAction::Created(_) => progress.info(format!("Creating {link} symlink to k3s")),
            SymlinkAction::AlreadyExists(_) => {
                progress.info(format!("Skipping {link} symlink to k3s, already exists"));
            }
            SymlinkAction::FoundOnPath(_, found) => progress.info(format!(
                "Skipping {link} symlink to k3s, command exists in PATH at {}",
                found.display()
            )),
        }
        actions.push(action);
    }
    Ok(actions)
}

fn replace_link(link: &Utf8Path) -> Result<()> {
    match std::fs::remove_file(link) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            return Err(InstallerError::filesystem("remove", link)(e));
        }
        _ => {}
    }
    std::os::unix::fs::symlink(LINK_TARGET, link).map_err(InstallerError::filesystem("link", link))
}

fn find_on_path(cmd: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    std::env::split_paths(search_path?)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(cmd))
        .find(|candidate| candidate.is_file())
}
