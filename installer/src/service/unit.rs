//! Unit naming and the unit file itself.

use super::exec::ExecCommand;
use crate::error::{InstallerError, Result};
use camino::Utf8Path;
use std::fs;

/// Characters systemd or the generated shell scripts cannot carry in a
/// unit name.
const INVALID_NAME_CHARS: &[char] = &[
    '[', ']', '!', '#', '$', '%', '&', '(', ')', '*', ';', '<', '=', '>', '?', '\\', '_', '`',
    '{', '|', '}', '/',
];

/// Choose the unit name: `k3s-{name}` when a name is configured, otherwise
/// the command's default.
///
/// # Errors
///
/// Returns [`InstallerError::InvalidConfiguration`] if the resulting name
/// contains whitespace or shell and path metacharacters.
///
/// # Examples
///
/// ```
/// use k3s_installer::service::exec::{ExecCommand, JoinSettings};
/// use k3s_installer::service::unit::unit_name;
///
/// let exec = ExecCommand::resolve(None, &[], &JoinSettings::default()).unwrap();
/// assert_eq!(unit_name(Some("edge"), &exec).unwrap(), "k3s-edge");
/// assert_eq!(unit_name(None, &exec).unwrap(), "k3s");
/// ```
pub fn unit_name(name: Option<&str>, exec: &ExecCommand) -> Result<String> {
    let unit = match name.filter(|n| !n.is_empty()) {
        Some(name) => format!("k3s-{name}"),
        None => exec.default_unit_name(),
    };
    let invalid: String = unit
        .chars()
        .filter(|c| c.is_whitespace() || INVALID_NAME_CHARS.contains(c))
        .collect();
    if invalid.is_empty() {
        Ok(unit)
    } else {
        Err(InstallerError::InvalidConfiguration {
            reason: format!("invalid characters for system name {unit:?}: {invalid:?}"),
        })
    }
}

/// Render the unit file for `binary` running `exec`, loading its
/// environment from `env_file`.
#[must_use]
pub fn render_unit(binary: &Utf8Path, env_file: &Utf8Path, exec: &ExecCommand) -> String {
    format!(
        "[Unit]
Description=Lightweight Kubernetes
Documentation=https://k3s.io
Wants=network-online.target
After=network-online.target

[Install]
WantedBy=multi-user.target

[Service]
Type={unit_type}
EnvironmentFile=-{env_file}
KillMode=process
Delegate=yes
# Having non-zero Limit*s causes performance problems due to accounting overhead
# in the kernel. We recommend using cgroups to do container-local accounting.
LimitNOFILE=infinity
LimitNPROC=infinity
LimitCORE=infinity
TasksMax=infinity
TimeoutStartSec=0
Restart=always
RestartSec=5s
ExecStartPre=-/sbin/modprobe br_netfilter
ExecStartPre=-/sbin/modprobe overlay
ExecStart={exec_start}
",
        unit_type = exec.unit_type(),
        exec_start = exec.exec_start(binary),
    )
}

/// Write `contents` to `path`, replacing any existing unit file.
///
/// # Errors
///
/// Returns [`InstallerError::FilesystemFailure`] if the write fails.
pub fn write_unit_file(path: &Utf8Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(InstallerError::filesystem("create", parent))?;
    }
    fs::write(path, contents).map_err(InstallerError::filesystem("write", path))?;
    log::debug!("wrote unit file {path}");
    Ok(())
}
