//! CLI argument definitions for the k3s installer.
//!
//! Every option can also be supplied through the `INSTALL_K3S_*` environment
//! variable the shell installer has always honoured, so existing automation
//! keeps working. Boolean variables follow clap's falsey parsing: unset,
//! empty, `0`, `false`, `no`, `off`, `n` and `f` are false.

use crate::layout::{DEFAULT_BIN_DIR, DEFAULT_SYSTEMD_DIR};
use crate::release::{
    DEFAULT_CHANNEL_URL, DEFAULT_GITHUB_API_URL, DEFAULT_GITHUB_URL, DEFAULT_STORAGE_URL,
};
use camino::Utf8PathBuf;
use clap::Parser;
use clap::builder::FalseyValueParser;

/// Install or upgrade k3s as a systemd service.
#[derive(Parser, Debug, Clone)]
#[command(name = "k3s-install")]
#[command(version, about)]
#[command(long_about = concat!(
    "Install or upgrade k3s as a systemd service.\n\n",
    "The installer resolves a release, downloads and verifies the binary, writes ",
    "the unit and environment files, and restarts the service only when one of ",
    "them changed. Re-running it against a current host is a no-op.\n\n",
    "Arguments after the options are appended to the k3s command line.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Install the stable channel as a server:\n",
    "    $ k3s-install\n\n",
    "  Install a specific version as an agent:\n",
    "    $ K3S_URL=https://server:6443 K3S_TOKEN=xxx k3s-install --k3s-version v1.30.2+k3s1\n\n",
    "  Pass flags to the server:\n",
    "    $ k3s-install -- --disable traefik\n\n",
    "  Preview without changing anything:\n",
    "    $ k3s-install --dry-run",
))]
pub struct Cli {
    /// Release tag to install, e.g. v1.30.2+k3s1.
    #[arg(long, env = "INSTALL_K3S_VERSION", value_name = "VERSION")]
    pub k3s_version: Option<String>,

    /// Release channel to resolve when no version is given [default: stable].
    #[arg(long, env = "INSTALL_K3S_CHANNEL", value_name = "CHANNEL")]
    pub channel: Option<String>,

    /// Channel resolution endpoint.
    #[arg(long, env = "INSTALL_K3S_CHANNEL_URL", value_name = "URL", default_value = DEFAULT_CHANNEL_URL)]
    pub channel_url: String,

    /// Full commit sha of a CI build to install.
    #[arg(long, env = "INSTALL_K3S_COMMIT", value_name = "SHA")]
    pub commit: Option<String>,

    /// Pull request number whose CI build should be installed.
    #[arg(long = "pr", env = "INSTALL_K3S_PR", value_name = "NUMBER")]
    pub pull_request: Option<u64>,

    /// GitHub token used to download pull request builds.
    #[arg(long, env = "GITHUB_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Release download root.
    #[arg(long, env = "GITHUB_URL", value_name = "URL", default_value = DEFAULT_GITHUB_URL)]
    pub github_url: String,

    /// GitHub REST API root used for pull request lookups.
    #[arg(long, env = "GITHUB_API_URL", value_name = "URL", default_value = DEFAULT_GITHUB_API_URL)]
    pub github_api_url: String,

    /// Storage bucket holding per-commit builds.
    #[arg(long, env = "STORAGE_URL", value_name = "URL", default_value = DEFAULT_STORAGE_URL)]
    pub storage_url: String,

    /// Directory for the binary, symlinks and uninstall script.
    #[arg(long, env = "INSTALL_K3S_BIN_DIR", value_name = "DIR", default_value = DEFAULT_BIN_DIR)]
    pub bin_dir: Utf8PathBuf,

    /// Treat the bin directory as read-only (implies --skip-download).
    #[arg(long, env = "INSTALL_K3S_BIN_DIR_READ_ONLY", value_parser = FalseyValueParser::new())]
    pub bin_dir_read_only: bool,

    /// Directory for the unit and environment files.
    #[arg(long, env = "INSTALL_K3S_SYSTEMD_DIR", value_name = "DIR", default_value = DEFAULT_SYSTEMD_DIR)]
    pub systemd_dir: Utf8PathBuf,

    /// Service name suffix; the unit becomes k3s-NAME.
    #[arg(long, env = "INSTALL_K3S_NAME", value_name = "NAME")]
    pub name: Option<String>,

    /// k3s command and flags, e.g. "server --disable traefik".
    #[arg(long, env = "INSTALL_K3S_EXEC", value_name = "COMMAND", allow_hyphen_values = true)]
    pub exec: Option<String>,

    /// Use the binary already installed instead of downloading one.
    #[arg(long, env = "INSTALL_K3S_SKIP_DOWNLOAD", value_parser = FalseyValueParser::new())]
    pub skip_download: bool,

    /// Write files but do not enable or start the service.
    #[arg(long, env = "INSTALL_K3S_SKIP_ENABLE", value_parser = FalseyValueParser::new())]
    pub skip_enable: bool,

    /// Enable the service but do not restart it.
    #[arg(long, env = "INSTALL_K3S_SKIP_START", value_parser = FalseyValueParser::new())]
    pub skip_start: bool,

    /// Restart the service even when nothing changed.
    #[arg(long, env = "INSTALL_K3S_FORCE_RESTART", value_parser = FalseyValueParser::new())]
    pub force_restart: bool,

    /// kubectl/crictl/ctr symlink handling: skip or force.
    #[arg(long, env = "INSTALL_K3S_SYMLINK", value_name = "MODE")]
    pub symlink: Option<String>,

    /// Server URL an agent joins.
    #[arg(long, env = "K3S_URL", value_name = "URL")]
    pub k3s_url: Option<String>,

    /// Cluster join token.
    #[arg(long, env = "K3S_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub k3s_token: Option<String>,

    /// File holding the cluster join token.
    #[arg(long, env = "K3S_TOKEN_FILE", value_name = "FILE")]
    pub k3s_token_file: Option<String>,

    /// Machine architecture to install for [default: host].
    #[arg(long, value_name = "ARCH")]
    pub arch: Option<String>,

    /// Show the resolved configuration and exit without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,

    /// Extra arguments appended to the k3s command line.
    #[arg(value_name = "K3S_ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub exec_args: Vec<String>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
