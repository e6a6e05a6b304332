//! Uninstall script generation.
//!
//! Every install leaves a `{unit}-uninstall.sh` beside the binary. The
//! script stops and unregisters the service, then deletes everything the
//! installer wrote. It runs without `set -e` so one failed removal never
//! strands the rest, and it deletes itself from an `EXIT` trap so it
//! disappears however it finishes.

use crate::binary::{EXECUTABLE_MODE, Owner};
use crate::error::{InstallerError, Result};
use crate::layout::InstallLayout;
use crate::symlinks::{LINK_TARGET, SYMLINK_COMMANDS};
use camino::Utf8Path;
use std::borrow::Cow;
use std::fs;
use std::os::unix::fs::PermissionsExt;

fn quote(path: &Utf8Path) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(path.as_str()))
}

/// Render the uninstall script for `layout`.
///
/// With `require_root` the script re-executes itself under `sudo` when not
/// run as root. The binary and its command links are shared by every k3s
/// unit in the systemd directory, so they are kept while another
/// `k3s*.service` remains.
#[must_use]
pub fn render_uninstall_script(layout: &InstallLayout, require_root: bool) -> String {
    let service = shell_escape::unix::escape(Cow::Owned(format!("{}.service", layout.unit)));
    let systemd_dir = layout.unit_file.parent().unwrap_or(Utf8Path::new("."));
    let binary = quote(&layout.binary);

    let mut script = String::from("#!/bin/sh\nset -x\n");
    if require_root {
        script.push_str("[ \"$(id -u)\" -eq 0 ] || exec sudo \"$0\" \"$@\"\n");
    }
    script.push_str(&format!(
        "
if command -v systemctl >/dev/null 2>&1; then
    systemctl stop {service}
    systemctl disable {service}
    systemctl reset-failed {service}
    systemctl daemon-reload
fi

remove_uninstall() {{
    rm -f {uninstall}
}}
trap remove_uninstall EXIT

rm -f {unit_file}
rm -f {env_file}

if ls {systemd_dir}/k3s*.service >/dev/null 2>&1; then
    echo \"Additional k3s services installed, skipping uninstall of k3s\"
    exit
fi

",
        uninstall = quote(&layout.uninstall_script),
        unit_file = quote(&layout.unit_file),
        env_file = quote(&layout.env_file),
        systemd_dir = quote(systemd_dir),
    ));
    for cmd in SYMLINK_COMMANDS {
        let link = quote(&layout.bin_dir.join(cmd)).into_owned();
        script.push_str(&format!(
            "if [ -L {link} ]; then
    case \"$(readlink {link})\" in
        {LINK_TARGET}|{binary}) rm -f {link} ;;
    esac
fi
"
        ));
    }
    script.push_str(&format!("rm -f {binary}\n"));
    script
}

/// Write the uninstall script to `layout.uninstall_script`.
///
/// # Errors
///
/// Returns [`InstallerError::FilesystemFailure`] if the script cannot be
/// written, made executable, or handed to `owner`.
pub fn write_uninstall_script(
    layout: &InstallLayout,
    owner: Option<Owner>,
    require_root: bool,
) -> Result<()> {
    let path = &layout.uninstall_script;
    fs::create_dir_all(&layout.bin_dir).map_err(InstallerError::filesystem("create", &layout.bin_dir))?;
    fs::write(path, render_uninstall_script(layout, require_root))
        .map_err(InstallerError::filesystem("write", path))?;
    fs::set_permissions(path, fs::Permissions::from_mode(EXECUTABLE_MODE))
        .map_err(InstallerError::filesystem("chmod", path))?;
    if let Some(owner) = owner {
        std::os::unix::fs::chown(path, Some(owner.uid), Some(owner.gid))
            .map_err(InstallerError::filesystem("chown", path))?;
    }
    log::debug!("wrote uninstall script {path}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn layout() -> InstallLayout {
        InstallLayout::new(
            Utf8Path::new("/usr/local/bin"),
            Utf8Path::new("/etc/systemd/system"),
            "k3s",
        )
    }

    fn position(script: &str, needle: &str) -> usize {
        script
            .find(needle)
            .unwrap_or_else(|| panic!("missing {needle:?} in:\n{script}"))
    }

    #[test]
    fn script_runs_steps_in_order() {
        let script = render_uninstall_script(&layout(), true);
        let order = [
            "exec sudo",
            "systemctl stop k3s.service",
            "systemctl disable k3s.service",
            "systemctl reset-failed k3s.service",
            "systemctl daemon-reload",
            "trap remove_uninstall EXIT",
            "rm -f /etc/systemd/system/k3s.service\n",
            "rm -f /etc/systemd/system/k3s.service.env",
            "if ls /etc/systemd/system/k3s*.service",
            "exit\nfi",
            "if [ -L /usr/local/bin/kubectl ]",
            "rm -f /usr/local/bin/k3s\n",
        ];
        let positions: Vec<usize> = order.iter().map(|n| position(&script, n)).collect();
        assert!(positions.is_sorted(), "out of order:\n{script}");
        assert!(!script.contains("set -e"));
    }

    #[test]
    fn paths_with_spaces_are_quoted() {
        let layout = InstallLayout::new(
            Utf8Path::new("/opt/my bin"),
            Utf8Path::new("/etc/systemd/system"),
            "k3s",
        );
        let script = render_uninstall_script(&layout, false);
        assert!(script.contains("rm -f '/opt/my bin/k3s'"));
        assert!(!script.contains("sudo"));
    }

    #[test]
    fn links_are_removed_only_when_they_point_at_k3s() {
        let script = render_uninstall_script(&layout(), false);
        assert!(script.contains(
            "case \"$(readlink /usr/local/bin/crictl)\" in\n        \
             k3s|/usr/local/bin/k3s) rm -f /usr/local/bin/crictl ;;"
        ));
        assert!(!script.contains("then rm -f /usr/local/bin/crictl"));
    }

    #[test]
    fn written_script_is_executable() {
        let dir = tempfile::tempdir().expect("temp dir");
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8");
        let layout = InstallLayout::new(&base.join("bin"), &base.join("systemd"), "k3s-edge");

        write_uninstall_script(&layout, None, false).expect("writes");
        let mode = fs::metadata(&layout.uninstall_script)
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, EXECUTABLE_MODE);
        assert!(layout.uninstall_script.ends_with("k3s-edge-uninstall.sh"));
    }
}
