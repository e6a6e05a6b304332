//! Where an installation lives on disk.

use camino::{Utf8Path, Utf8PathBuf};

/// Default directory for the binary, symlinks and uninstaller.
pub const DEFAULT_BIN_DIR: &str = "/usr/local/bin";
/// Default directory for the unit and environment files.
pub const DEFAULT_SYSTEMD_DIR: &str = "/etc/systemd/system";

/// Every path an installation writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    /// Directory holding the binary and its companions.
    pub bin_dir: Utf8PathBuf,
    /// Unit name without the `.service` suffix.
    pub unit: String,
    /// `{bin_dir}/k3s`.
    pub binary: Utf8PathBuf,
    /// `{systemd_dir}/{unit}.service`.
    pub unit_file: Utf8PathBuf,
    /// `{systemd_dir}/{unit}.service.env`.
    pub env_file: Utf8PathBuf,
    /// `{bin_dir}/{unit}-uninstall.sh`.
    pub uninstall_script: Utf8PathBuf,
}

impl InstallLayout {
    /// Derive the layout for `unit`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use k3s_installer::layout::InstallLayout;
    ///
    /// let layout = InstallLayout::new(
    ///     Utf8Path::new("/usr/local/bin"),
    ///     Utf8Path::new("/etc/systemd/system"),
    ///     "k3s-agent",
    /// );
    /// assert_eq!(layout.env_file, "/etc/systemd/system/k3s-agent.service.env");
    /// assert_eq!(layout.uninstall_script, "/usr/local/bin/k3s-agent-uninstall.sh");
    /// ```
    #[must_use]
    pub fn new(bin_dir: &Utf8Path, systemd_dir: &Utf8Path, unit: &str) -> Self {
        Self {
            bin_dir: bin_dir.to_owned(),
            unit: unit.to_owned(),
            binary: bin_dir.join("k3s"),
            unit_file: systemd_dir.join(format!("{unit}.service")),
            env_file: systemd_dir.join(format!("{unit}.service.env")),
            uninstall_script: bin_dir.join(format!("{unit}-uninstall.sh")),
        }
    }
}
