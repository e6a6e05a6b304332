//! The service environment file.
//!
//! k3s reads its cluster settings (`K3S_URL`, `K3S_TOKEN`, ...) and proxy
//! settings from the environment. The installer captures the relevant
//! subset of the operator's environment into a file referenced by the unit
//! through `EnvironmentFile=`. The file can hold join tokens, so it is
//! created owner-only and never exists with looser permissions.

use crate::error::{InstallerError, Result};
use camino::Utf8Path;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Mode of the environment file.
pub const ENVIRONMENT_FILE_MODE: u32 = 0o600;

/// A name prefix that selects variables for the environment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixRule {
    /// The prefix to match.
    pub prefix: &'static str,
    /// Whether letter case must match.
    pub case_sensitive: bool,
}

impl PrefixRule {
    /// Whether `name` starts with this rule's prefix.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.case_sensitive {
            return name.starts_with(self.prefix);
        }
        name.get(..self.prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(self.prefix))
    }
}

/// Variables k3s and its embedded containerd understand, plus proxy
/// settings in either case.
pub const ENVIRONMENT_RULES: &[PrefixRule] = &[
    PrefixRule {
        prefix: "K3S_",
        case_sensitive: true,
    },
    PrefixRule {
        prefix: "CONTAINERD_",
        case_sensitive: true,
    },
    PrefixRule {
        prefix: "NO_PROXY",
        case_sensitive: false,
    },
    PrefixRule {
        prefix: "HTTP_PROXY",
        case_sensitive: false,
    },
    PrefixRule {
        prefix: "HTTPS_PROXY",
        case_sensitive: false,
    },
];

/// The filtered variables, in the order they were encountered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentSnapshot {
    entries: Vec<(String, String)>,
}

impl EnvironmentSnapshot {
    /// The retained `(name, value)` pairs.
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Whether `name` was retained.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    /// Set `name` to `value`, replacing a retained entry of that name in
    /// place.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) => value.clone_into(current),
            None => self.entries.push((name.to_owned(), value.to_owned())),
        }
    }

    /// File contents: one `NAME=value` line per entry.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(name, value)| format!("{name}={value}\n"))
            .collect()
    }
}

/// Keep the variables in `vars` matched by any of `rules`.
///
/// # Examples
///
/// ```
/// use k3s_installer::environment::{ENVIRONMENT_RULES, filter_environment};
///
/// let vars = [("FOO_BAR", "1"), ("K3S_TOKEN", "abc"), ("http_proxy", "y")]
///     .map(|(k, v)| (k.to_owned(), v.to_owned()));
/// let snapshot = filter_environment(vars, ENVIRONMENT_RULES);
/// assert_eq!(snapshot.render(), "K3S_TOKEN=abc\nhttp_proxy=y\n");
/// ```
pub fn filter_environment<I>(vars: I, rules: &[PrefixRule]) -> EnvironmentSnapshot
where
    I: IntoIterator<Item = (String, String)>,
{
    let entries = vars
        .into_iter()
        .filter(|(name, _)| rules.iter().any(|rule| rule.matches(name)))
        .collect();
    EnvironmentSnapshot { entries }
}

/// The process environment as UTF-8 pairs.
///
/// Variables whose name or value is not valid UTF-8 cannot be written to a
/// systemd environment file faithfully and are dropped.
#[must_use]
pub fn ambient_environment() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(name, value)| Some((utf8(name)?, utf8(value)?)))
        .collect()
}

fn utf8(value: OsString) -> Option<String> {
    value
        .into_string()
        .map_err(|raw| log::debug!("skipping non UTF-8 environment entry {raw:?}"))
        .ok()
}

/// Write `snapshot` to `path`, replacing any previous contents.
///
/// # Errors
///
/// Returns [`InstallerError::FilesystemFailure`] if the file cannot be
/// created, restricted, or written.
pub fn write_environment_file(path: &Utf8Path, snapshot: &EnvironmentSnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(InstallerError::filesystem("create", parent))?;
    }
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(ENVIRONMENT_FILE_MODE)
        .open(path)
        .map_err(InstallerError::filesystem("open", path))?;
    // `mode` only applies on creation; tighten a pre-existing file before
    // the new contents land.
    file.set_permissions(fs::Permissions::from_mode(ENVIRONMENT_FILE_MODE))
        .map_err(InstallerError::filesystem("chmod", path))?;
    file.write_all(snapshot.render().as_bytes())
        .map_err(InstallerError::filesystem("write", path))?;
    log::debug!("wrote {} variables to {path}", snapshot.entries().len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;

    fn pairs(vars: &[(&str, &str)]) -> Vec<(String, String)> {
        vars.iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    #[case::k3s("K3S_URL", true)]
    #[case::containerd("CONTAINERD_LOG_LEVEL", true)]
    #[case::k3s_lowercase("k3s_url", false)]
    #[case::proxy_upper("HTTPS_PROXY", true)]
    #[case::proxy_lower("no_proxy", true)]
    #[case::proxy_mixed("Http_Proxy", true)]
    #[case::unrelated("PATH", false)]
    #[case::shorter_than_prefix("K3S", false)]
    fn rule_table_matching(#[case] name: &str, #[case] retained: bool) {
        let snapshot = filter_environment(pairs(&[(name, "v")]), ENVIRONMENT_RULES);
        assert_eq!(snapshot.contains(name), retained);
    }

    #[test]
    fn keeps_encounter_order_and_each_proxy_variant_once() {
        let snapshot = filter_environment(
            pairs(&[
                ("FOO_BAR", "1"),
                ("K3S_TOKEN", "abc"),
                ("HTTP_PROXY", "x"),
                ("http_proxy", "y"),
            ]),
            ENVIRONMENT_RULES,
        );
        assert_eq!(
            snapshot.render(),
            "K3S_TOKEN=abc\nHTTP_PROXY=x\nhttp_proxy=y\n"
        );
    }

    #[test]
    fn set_replaces_in_place_or_appends() {
        let mut snapshot = filter_environment(
            pairs(&[("K3S_TOKEN", "from-env"), ("HTTPS_PROXY", "p")]),
            ENVIRONMENT_RULES,
        );
        snapshot.set("K3S_TOKEN", "from-flag");
        snapshot.set("K3S_URL", "https://server:6443");

        assert_eq!(
            snapshot.render(),
            "K3S_TOKEN=from-flag\nHTTPS_PROXY=p\nK3S_URL=https://server:6443\n"
        );
    }

    #[test]
    fn non_ascii_name_does_not_panic() {
        let snapshot = filter_environment(pairs(&[("ÄTTP_PROXY", "x")]), ENVIRONMENT_RULES);
        assert!(snapshot.entries().is_empty());
    }

    #[test]
    fn rewrite_truncates_and_tightens_permissions() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("k3s.service.env")).expect("utf8");
        fs::write(&path, "K3S_TOKEN=old-and-much-longer\nSTALE=1\n").expect("seed");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");

        let snapshot = filter_environment(pairs(&[("K3S_TOKEN", "new")]), ENVIRONMENT_RULES);
        write_environment_file(&path, &snapshot).expect("writes");

        assert_eq!(fs::read_to_string(&path).expect("read"), "K3S_TOKEN=new\n");
        let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
        assert_eq!(mode, ENVIRONMENT_FILE_MODE);
    }

    #[test]
    fn empty_snapshot_writes_empty_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("k3s.service.env")).expect("utf8");
        write_environment_file(&path, &EnvironmentSnapshot::default()).expect("writes");
        assert_eq!(fs::read_to_string(&path).expect("read"), "");
    }
}
