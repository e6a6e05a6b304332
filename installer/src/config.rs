//! Resolved installer configuration.
//!
//! [`InstallConfig`] is the validated form of the command line. Everything
//! that can be checked without touching the network or the filesystem is
//! checked here, so a bad combination of options fails before any step of
//! the install runs.

use crate::binary::Owner;
use crate::cli::Cli;
use crate::error::Result;
use crate::layout::InstallLayout;
use crate::release::{ReleaseReference, ReleaseSelectors, ReleaseSources};
use crate::service::exec::{ExecCommand, JoinSettings};
use crate::service::unit::unit_name;
use crate::symlinks::SymlinkPolicy;

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Machine name to map to an architecture.
    pub machine: String,
    /// Release to install; `None` when downloads are skipped.
    pub release: Option<ReleaseReference>,
    /// Remote endpoints used to resolve the release.
    pub sources: ReleaseSources,
    /// Installed paths.
    pub layout: InstallLayout,
    /// What the service runs.
    pub exec: ExecCommand,
    /// Symlink handling.
    pub symlinks: SymlinkPolicy,
    /// Whether the bin dir must not be written.
    pub bin_dir_read_only: bool,
    /// Stop after writing files.
    pub skip_enable: bool,
    /// Enable but do not restart.
    pub skip_start: bool,
    /// Restart even when nothing changed.
    pub force_restart: bool,
    /// Ownership for installed executables; `None` keeps the caller's.
    pub owner: Option<Owner>,
    /// Whether the uninstall script re-executes itself under sudo.
    pub uninstall_requires_root: bool,
    /// Join settings given on the command line, as environment entries.
    pub join_environment: Vec<(String, String)>,
}

impl InstallConfig {
    /// Validate `cli`, using `host_machine` unless `--arch` overrides it.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfiguration`](crate::error::InstallerError::InvalidConfiguration)
    /// for malformed selectors, join settings, unit names, or symlink modes.
    pub fn from_cli(cli: &Cli, host_machine: &str) -> Result<Self> {
        let skip_download = cli.skip_download || cli.bin_dir_read_only;
        let release = if skip_download {
            None
        } else {
            Some(ReleaseReference::select(&ReleaseSelectors {
                pull_request: cli.pull_request,
                github_token: cli.github_token.as_deref(),
                commit: cli.commit.as_deref(),
                version: cli.k3s_version.as_deref(),
                channel: cli.channel.as_deref(),
            })?)
        };

        let exec = ExecCommand::resolve(
            cli.exec.as_deref(),
            &cli.exec_args,
            &JoinSettings {
                url: cli.k3s_url.as_deref(),
                token: cli.k3s_token.as_deref(),
                token_file: cli.k3s_token_file.as_deref(),
            },
        )?;
        let unit = unit_name(cli.name.as_deref(), &exec)?;
        let join_environment = [
            ("K3S_URL", &cli.k3s_url),
            ("K3S_TOKEN", &cli.k3s_token),
            ("K3S_TOKEN_FILE", &cli.k3s_token_file),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            let value = value.as_deref().filter(|value| !value.is_empty())?;
            Some((name.to_owned(), value.to_owned()))
        })
        .collect();
        let symlinks = cli.symlink.as_deref().unwrap_or_default().parse::<SymlinkPolicy>()?;

        Ok(Self {
            machine: cli
                .arch
                .clone()
                .unwrap_or_else(|| host_machine.to_owned()),
            release,
            sources: ReleaseSources {
                github_url: cli.github_url.clone(),
                storage_url: cli.storage_url.clone(),
                channel_url: cli.channel_url.clone(),
                github_api_url: cli.github_api_url.clone(),
            },
            layout: InstallLayout::new(&cli.bin_dir, &cli.systemd_dir, &unit),
            exec,
            symlinks,
            bin_dir_read_only: cli.bin_dir_read_only,
            skip_enable: cli.skip_enable,
            skip_start: cli.skip_start,
            force_restart: cli.force_restart,
            owner: Some(Owner::ROOT),
            uninstall_requires_root: true,
            join_environment,
        })
    }

    /// Human-readable summary for `--dry-run`.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let release = self.release.as_ref().map_or_else(
            || "existing binary (download skipped)".to_owned(),
            |reference| format!("{reference:?}"),
        );
        let mut lines = vec![
            format!("Architecture:     {}", self.machine),
            format!("Release:          {release}"),
            format!("Binary:           {}", self.layout.binary),
            format!("Unit:             {}", self.layout.unit_file),
            format!("Environment file: {}", self.layout.env_file),
            format!(
                "ExecStart:        {}",
                self.exec.exec_start(&self.layout.binary)
            ),
        ];
        if !self.bin_dir_read_only {
            lines.push(format!(
                "Uninstaller:      {}",
                self.layout.uninstall_script
            ));
        }
        lines
    }
}
