//! Install and upgrade orchestration.
//!
//! A run verifies the host, writes every installed artefact, and restarts
//! the service only if the binary, unit file, or environment file changed.
//! Change detection compares digests captured before the first write and
//! after the last one, so a run against an already-current host performs
//! no restart. Every step is fatal on failure; there is no rollback.

use crate::binary::{BinaryTarget, InstallOutcome, ensure_binary};
use crate::command::CommandExecutor;
use crate::config::InstallConfig;
use crate::environment::{ENVIRONMENT_RULES, filter_environment, write_environment_file};
use crate::error::{InstallerError, Result};
use crate::output::Progress;
use crate::platform::{Architecture, verify_platform};
use crate::release::resolve;
use crate::service::ServiceManager;
use crate::service::unit::{render_unit, write_unit_file};
use crate::snapshot::InstalledState;
use crate::symlinks::{SymlinkAction, create_symlinks};
use crate::transport::Transport;
use crate::uninstall::write_uninstall_script;
use std::ffi::OsStr;

/// How far a run got and what it changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Architecture the binary was chosen for.
    pub architecture: Architecture,
    /// Resolved version label, when a release was resolved.
    pub version: Option<String>,
    /// Binary outcome, when downloads were not skipped.
    pub binary: Option<InstallOutcome>,
    /// Symlink decisions.
    pub symlinks: Vec<SymlinkAction>,
    /// Whether the service was enabled.
    pub enabled: bool,
    /// Whether any tracked file changed; `None` if the run stopped before
    /// the comparison.
    pub changed: Option<bool>,
    /// Whether the service was restarted.
    pub restarted: bool,
}

/// The host seams a run drives.
pub struct Lifecycle<'a> {
    executor: &'a dyn CommandExecutor,
    transport: &'a dyn Transport,
    services: &'a dyn ServiceManager,
}

impl<'a> Lifecycle<'a> {
    /// Assemble a lifecycle from its collaborators.
    pub fn new(
        executor: &'a dyn CommandExecutor,
        transport: &'a dyn Transport,
        services: &'a dyn ServiceManager,
    ) -> Self {
        Self {
            executor,
            transport,
            services,
        }
    }

    /// Install or upgrade according to `config`.
    ///
    /// `ambient` is the operator's environment; matching entries are
    /// written to the environment file and its `PATH` is searched for
    /// commands that should not be shadowed by symlinks.
    ///
    /// # Errors
    ///
    /// Returns the first error from any step. Files written by earlier
    /// steps are left in place.
    pub fn run(
        &self,
        config: &InstallConfig,
        ambient: &[(String, String)],
        progress: &mut Progress<'_>,
    ) -> Result<InstallReport> {
        let architecture = verify_platform(self.executor, &config.machine)?;
        let layout = &config.layout;
        let mut report = InstallReport {
            architecture,
            version: None,
            binary: None,
            symlinks: Vec::new(),
            enabled: false,
            changed: None,
            restarted: false,
        };

        let before = InstalledState::capture(layout)?;
        log::debug!("state before install:\n{before}");

        if !config.bin_dir_read_only {
            progress.info(format!("Creating uninstall script {}", layout.uninstall_script));
            write_uninstall_script(layout, config.owner, config.uninstall_requires_root)?;

            let search_path = ambient
                .iter()
                .find(|(name, _)| name == "PATH")
                .map(|(_, value)| OsStr::new(value.as_str()));
            report.symlinks = create_symlinks(&layout.bin_dir, config.symlinks, search_path, progress)?;
        }

        self.disable_previous(&layout.unit);

        match &config.release {
            Some(reference) => {
                let locator = resolve(reference, architecture, &config.sources, self.transport)?;
                progress.info(format!("Using {} as release", locator.version));
                let target = BinaryTarget {
                    path: layout.binary.clone(),
                    owner: config.owner,
                };
                report.binary = Some(ensure_binary(&locator, self.transport, &target, progress)?);
                report.version = Some(locator.version);
            }
            None => {
                if !layout.binary.is_file() {
                    return Err(InstallerError::InvalidConfiguration {
                        reason: format!("download skipped but {} is not installed", layout.binary),
                    });
                }
                progress.info("Skipping k3s download and verify");
            }
        }

        progress.info(format!("env: Creating environment file {}", layout.env_file));
        let mut snapshot = filter_environment(ambient.iter().cloned(), ENVIRONMENT_RULES);
        for (name, value) in &config.join_environment {
            snapshot.set(name, value);
        }
        write_environment_file(&layout.env_file, &snapshot)?;

        progress.info(format!("systemd: Creating service file {}", layout.unit_file));
        write_unit_file(
            &layout.unit_file,
            &render_unit(&layout.binary, &layout.env_file, &config.exec),
        )?;

        if config.skip_enable {
            return Ok(report);
        }
        progress.info(format!("systemd: Enabling {} unit", layout.unit));
        self.services.enable(&layout.unit)?;
        self.services.daemon_reload()?;
        report.enabled = true;

        if config.skip_start {
            return Ok(report);
        }

        let after = InstalledState::capture(layout)?;
        let changed = before != after;
        report.changed = Some(changed);
        if !changed && !config.force_restart {
            progress.info("No change detected so skipping service start");
            return Ok(report);
        }

        progress.info(format!("systemd: Starting {}", layout.unit));
        self.services.restart(&layout.unit)?;
        report.restarted = true;
        Ok(report)
    }

    /// Disable an existing registration of `unit`; failures are ignored.
    fn disable_previous(&self, unit: &str) {
        match self.services.exists(unit) {
            Ok(true) => {
                if let Err(e) = self.services.disable(unit) {
                    log::debug!("ignoring failure to disable {unit}: {e}");
                }
            }
            Ok(false) => {}
            Err(e) => log::debug!("could not query {unit}: {e}"),
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
