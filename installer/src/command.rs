//! External command execution.
//!
//! Every host tool the installer shells out to (`systemctl`, `curl`, `wget`)
//! goes through [`CommandExecutor`] so tests can substitute scripted
//! responses.

use crate::error::{InstallerError, Result};
use std::process::{Command, Output};

/// Runs host programs and captures what they print.
pub trait CommandExecutor {
    /// Run `cmd` with `args`, waiting for it to exit.
    ///
    /// A non-zero exit is not an error; inspect the returned status.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the program cannot be spawned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use k3s_installer::command::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor;
    /// let output = executor.run("systemctl", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), k3s_installer::error::InstallerError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        log::trace!("running {cmd} {}", args.join(" "));
        Command::new(cmd)
            .args(args)
            .output()
            .map_err(InstallerError::from)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        (**self).run(cmd, args)
    }
}

/// Whether `cmd args` spawns and exits zero.
pub fn command_succeeds(executor: &dyn CommandExecutor, cmd: &str, args: &[&str]) -> bool {
    executor.run(cmd, args).is_ok_and(|o| o.status.success())
}

/// Returns true if `tool --version` runs and exits zero.
pub fn tool_available(executor: &dyn CommandExecutor, tool: &str) -> bool {
    command_succeeds(executor, tool, &["--version"])
}

/// Trimmed, lossily decoded stderr of a finished command.
#[must_use]
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_owned()
}
