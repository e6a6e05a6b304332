//! Host platform verification.
//!
//! The installer only targets hosts managed by systemd, and only publishes
//! binaries for a fixed set of processor architectures. Both checks run
//! before any network access so an unsupported host fails fast.

use crate::command::{CommandExecutor, tool_available};
use crate::error::{InstallerError, Result};
use std::fmt;

/// The service manager binary whose presence is required.
pub const SERVICE_MANAGER: &str = "systemctl";

/// Processor architectures with published k3s binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    /// 64-bit x86.
    Amd64,
}

impl Architecture {
    /// Canonical architecture name used in release manifest filenames.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
        }
    }

    /// Suffix appended to the binary name (`k3s{suffix}`).
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Amd64 => "",
        }
    }

    /// The architecture-qualified binary filename published in releases.
    ///
    /// # Examples
    ///
    /// ```
    /// use k3s_installer::platform::Architecture;
    ///
    /// assert_eq!(Architecture::Amd64.binary_filename(), "k3s");
    /// ```
    #[must_use]
    pub fn binary_filename(self) -> String {
        format!("k3s{}", self.suffix())
    }

    /// Map a machine name as reported by `uname -m` or
    /// `std::env::consts::ARCH`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::UnsupportedPlatform`] for machines that are
    /// unknown or known but not yet enabled.
    pub fn from_machine(machine: &str) -> Result<Self> {
        let entry = MACHINE_TABLE
            .iter()
            .find(|(name, _)| *name == machine)
            .map(|(_, arch)| *arch)
            .or_else(|| machine.starts_with("arm").then_some(None));

        match entry {
            Some(Some(arch)) => Ok(arch),
            Some(None) => Err(InstallerError::UnsupportedPlatform {
                reason: format!("architecture {machine} is not enabled for this installer"),
            }),
            None => Err(InstallerError::UnsupportedPlatform {
                reason: format!("unsupported architecture {machine}"),
            }),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Recognised machine names. `None` marks architectures that k3s publishes
/// but this installer does not enable yet.
const MACHINE_TABLE: &[(&str, Option<Architecture>)] = &[
    ("amd64", Some(Architecture::Amd64)),
    ("x86_64", Some(Architecture::Amd64)),
    ("arm64", None),
    ("aarch64", None),
    ("s390x", None),
];

/// Confirm the host can run the installed service.
///
/// Checks for systemd first, then maps `machine` to an [`Architecture`].
///
/// # Errors
///
/// Returns [`InstallerError::UnsupportedPlatform`] if `systemctl` cannot be
/// run or the architecture is rejected.
pub fn verify_platform(executor: &dyn CommandExecutor, machine: &str) -> Result<Architecture> {
    if !tool_available(executor, SERVICE_MANAGER) {
        return Err(InstallerError::UnsupportedPlatform {
            reason: "can not find systemd to use as a process supervisor".to_owned(),
        });
    }
    Architecture::from_machine(machine)
}
