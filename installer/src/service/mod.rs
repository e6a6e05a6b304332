//! Service registration with systemd.
//!
//! # Sub-modules
//!
//! - [`exec`] - The k3s subcommand and arguments placed on `ExecStart`.
//! - [`unit`] - Unit naming and unit file rendering.

pub mod exec;
pub mod unit;

use crate::command::{CommandExecutor, stderr_text};
use crate::error::{InstallerError, Result};

/// Lifecycle operations on a service unit.
///
/// Units are named without the `.service` suffix. All operations are
/// synchronous and idempotent from the caller's point of view.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceManager {
    /// Whether a unit file for `unit` is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the service manager cannot be queried.
    fn exists(&self, unit: &str) -> Result<bool>;

    /// Enable `unit` at boot.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ServiceManager`] on failure.
    fn enable(&self, unit: &str) -> Result<()>;

    /// Disable `unit` at boot.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ServiceManager`] on failure.
    fn disable(&self, unit: &str) -> Result<()>;

    /// Reload unit files from disk.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ServiceManager`] on failure.
    fn daemon_reload(&self) -> Result<()>;

    /// Restart `unit`, starting it if stopped.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ServiceManager`] on failure.
    fn restart(&self, unit: &str) -> Result<()>;

    /// Stop `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ServiceManager`] on failure.
    fn stop(&self, unit: &str) -> Result<()>;

    /// Clear the failed state of `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ServiceManager`] on failure.
    fn reset_failed(&self, unit: &str) -> Result<()>;
}

/// [`ServiceManager`] backed by `systemctl`.
#[derive(Debug, Clone)]
pub struct SystemdManager<E> {
    executor: E,
}

impl<E: CommandExecutor> SystemdManager<E> {
    /// Drive `systemctl` through `executor`.
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    fn systemctl(&self, operation: &'static str, unit: Option<&str>) -> Result<std::process::Output> {
        let service = unit.map(|name| format!("{name}.service"));
        let mut args = vec![operation];
        args.extend(service.as_deref());
        log::debug!("systemctl {}", args.join(" "));

        let failure = |message: String| InstallerError::ServiceManager {
            operation,
            unit: unit.unwrap_or_default().to_owned(),
            message,
        };
        let output = self
            .executor
            .run("systemctl", &args)
            .map_err(|e| failure(e.to_string()))?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(failure(stderr_text(&output)))
        }
    }
}

impl<E: CommandExecutor> ServiceManager for SystemdManager<E> {
    fn exists(&self, unit: &str) -> Result<bool> {
        let service = format!("{unit}.service");
        let output = self
            .executor
            .run("systemctl", &["list-unit-files", "--no-legend", &service])?;
        Ok(output.status.success() && !output.stdout.trim_ascii().is_empty())
    }

    fn enable(&self, unit: &str) -> Result<()> {
        self.systemctl("enable", Some(unit)).map(drop)
    }

    fn disable(&self, unit: &str) -> Result<()> {
        self.systemctl("disable", Some(unit)).map(drop)
    }

    fn daemon_reload(&self) -> Result<()> {
        self.systemctl("daemon-reload", None).map(drop)
    }

    fn restart(&self, unit: &str) -> Result<()> {
        self.systemctl("restart", Some(unit)).map(drop)
    }

    fn stop(&self, unit: &str) -> Result<()> {
        self.systemctl("stop", Some(unit)).map(drop)
    }

    fn reset_failed(&self, unit: &str) -> Result<()> {
        self.systemctl("reset-failed", Some(unit)).map(drop)
    }
}
