//! The command line the service runs.
//!
//! `INSTALL_K3S_EXEC` and any trailing installer arguments are joined and
//! split into words. A leading word that is not a flag names the k3s
//! subcommand. Otherwise the subcommand is inferred: `agent` when a server
//! URL to join is configured, `server` when not.

use crate::error::{InstallerError, Result};
use camino::Utf8Path;

/// Settings that influence which subcommand is inferred.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinSettings<'a> {
    /// `K3S_URL`: the server an agent joins.
    pub url: Option<&'a str>,
    /// `K3S_TOKEN`.
    pub token: Option<&'a str>,
    /// `K3S_TOKEN_FILE`.
    pub token_file: Option<&'a str>,
}

/// The k3s subcommand and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCommand {
    command: String,
    args: Vec<String>,
}

impl ExecCommand {
    /// Build the command from `INSTALL_K3S_EXEC` and trailing arguments.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidConfiguration`] when `K3S_URL` is not
    /// an https URL, or when the command defaults to `agent` without a join
    /// token.
    ///
    /// # Examples
    ///
    /// ```
    /// use k3s_installer::service::exec::{ExecCommand, JoinSettings};
    ///
    /// let exec = ExecCommand::resolve(
    ///     Some("--disable traefik"),
    ///     &[],
    ///     &JoinSettings::default(),
    /// )
    /// .unwrap();
    /// assert_eq!(exec.command(), "server");
    /// assert_eq!(exec.args(), ["--disable", "traefik"]);
    /// ```
    pub fn resolve(exec: Option<&str>, trailing: &[String], join: &JoinSettings<'_>) -> Result<Self> {
        let url = join.url.filter(|url| !url.is_empty());
        if let Some(url) = url {
            if !url.starts_with("https://") {
                return Err(InstallerError::InvalidConfiguration {
                    reason: format!("only https:// URLs are supported for K3S_URL (have {url})"),
                });
            }
        }

        let mut words: Vec<String> = exec
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_owned)
            .chain(trailing.iter().cloned())
            .collect();

        let command = match words.first() {
            Some(first) if !first.starts_with('-') => words.remove(0),
            _ if url.is_none() => "server".to_owned(),
            _ => {
                let has_token = [join.token, join.token_file]
                    .iter()
                    .flatten()
                    .any(|value| !value.is_empty());
                if !has_token {
                    return Err(InstallerError::InvalidConfiguration {
                        reason: "defaulted k3s exec command to 'agent' because K3S_URL is defined, \
                                 but K3S_TOKEN or K3S_TOKEN_FILE is not defined"
                            .to_owned(),
                    });
                }
                "agent".to_owned()
            }
        };

        Ok(Self {
            command,
            args: words,
        })
    }

    /// The subcommand (`server`, `agent`, ...).
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Arguments following the subcommand.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Whether the service runs a k3s server.
    #[must_use]
    pub fn is_server(&self) -> bool {
        self.command == "server"
    }

    /// `Type=` for the unit: servers signal readiness, agents do not.
    #[must_use]
    pub fn unit_type(&self) -> &'static str {
        if self.is_server() { "notify" } else { "exec" }
    }

    /// Unit name when none is configured.
    #[must_use]
    pub fn default_unit_name(&self) -> String {
        if self.is_server() {
            "k3s".to_owned()
        } else {
            format!("k3s-{}", self.command)
        }
    }

    /// The `ExecStart=` value for `binary`.
    ///
    /// Arguments are single-quoted for systemd's command line parser.
    #[must_use]
    pub fn exec_start(&self, binary: &Utf8Path) -> String {
        let mut line = format!("{binary} {}", self.command);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&systemd_quote(arg));
        }
        line
    }
}

/// Single-quote `arg`, backslash-escaping `\` and `'`.
fn systemd_quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for c in arg.chars() {
        if matches!(c, '\\' | '\'') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_owned()).collect()
    }

    const JOIN: JoinSettings<'static> = JoinSettings {
        url: Some("https://server:6443"),
        token: Some("secret"),
        token_file: None,
    };

    #[rstest]
    #[case::empty(None, &[], JoinSettings::default(), "server", &[])]
    #[case::flags_only(Some("--write-kubeconfig-mode 644"), &[], JoinSettings::default(), "server", &["--write-kubeconfig-mode", "644"])]
    #[case::url_implies_agent(None, &["--node-label", "a=b"], JOIN, "agent", &["--node-label", "a=b"])]
    #[case::explicit_command(Some("agent --server x"), &["--debug"], JoinSettings::default(), "agent", &["--server", "x", "--debug"])]
    #[case::explicit_beats_url(Some("server"), &[], JOIN, "server", &[])]
    fn resolves_command_and_args(
        #[case] exec: Option<&str>,
        #[case] trailing: &[&str],
        #[case] join: JoinSettings<'static>,
        #[case] command: &str,
        #[case] expected_args: &[&str],
    ) {
        let exec = ExecCommand::resolve(exec, &args(trailing), &join).expect("resolves");
        assert_eq!(exec.command(), command);
        assert_eq!(exec.args(), args(expected_args).as_slice());
    }

    #[test]
    fn agent_default_requires_token() {
        let join = JoinSettings {
            token: None,
            ..JOIN
        };
        let err = ExecCommand::resolve(None, &[], &join).expect_err("token missing");
        assert!(err.to_string().contains("K3S_TOKEN_FILE"));
    }

    #[test]
    fn token_file_satisfies_agent_default() {
        let join = JoinSettings {
            token: None,
            token_file: Some("/etc/k3s/token"),
            ..JOIN
        };
        assert!(ExecCommand::resolve(None, &[], &join).is_ok());
    }

    #[test]
    fn plain_http_url_is_rejected() {
        let join = JoinSettings {
            url: Some("http://server:6443"),
            ..JOIN
        };
        let err = ExecCommand::resolve(None, &[], &join).expect_err("http rejected");
        assert!(matches!(err, InstallerError::InvalidConfiguration { .. }));
    }

    #[rstest]
    #[case::server("server", "notify", "k3s")]
    #[case::agent("agent", "exec", "k3s-agent")]
    fn unit_shape_follows_command(#[case] command: &str, #[case] unit_type: &str, #[case] name: &str) {
        let exec = ExecCommand::resolve(Some(command), &[], &JoinSettings::default()).expect("resolves");
        assert_eq!(exec.unit_type(), unit_type);
        assert_eq!(exec.default_unit_name(), name);
    }

    #[test]
    fn exec_start_quotes_each_argument() {
        let exec = ExecCommand::resolve(
            Some("server"),
            &args(&["--node-label", "team=it's ops", r"--data-dir=C:\k3s"]),
            &JoinSettings::default(),
        )
        .expect("resolves");
        assert_eq!(
            exec.exec_start(Utf8Path::new("/usr/local/bin/k3s")),
            r"/usr/local/bin/k3s server '--node-label' 'team=it\'s ops' '--data-dir=C:\\k3s'"
        );
    }
}
