//! Fetching remote bytes.
//!
//! The installer prefers whichever download tool the host already trusts:
//! `curl`, then `wget`. When neither runs, it falls back to the built-in
//! `ureq` client. The choice is made once at startup and every fetch in a
//! run goes through the same [`Transport`]. Any failure is fatal; there is
//! no retry and transient errors are not distinguished from permanent ones.

use crate::command::{CommandExecutor, stderr_text, tool_available};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Network timeout for the built-in HTTP client.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Download tools probed at startup, most preferred first.
pub const TRANSPORT_PREFERENCE: [DownloadTool; 2] = [DownloadTool::Curl, DownloadTool::Wget];

/// A way of turning URLs into bytes.
///
/// Abstractions allow tests to serve canned responses without network access.
pub trait Transport {
    /// Short name used in progress output (`curl`, `wget`, `ureq`).
    fn name(&self) -> &'static str;

    /// Download `url` into `dest`, optionally sending a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or the file cannot be written.
    fn fetch_to_file(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        dest: &Path,
    ) -> Result<(), DownloadError>;

    /// Download `url` and return the body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer fails or the body is not UTF-8.
    fn fetch_text(&self, url: &str, bearer_token: Option<&str>) -> Result<String, DownloadError>;

    /// Follow redirects from `url` and return the final location.
    ///
    /// Returns `url` unchanged when the server does not redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn effective_url(&self, url: &str) -> Result<String, DownloadError>;
}

/// Errors arising from fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// HTTP request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("artefact not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// An external download tool exited unsuccessfully.
    #[error("{tool} failed for {url} ({status}): {stderr}")]
    CommandFailed {
        /// The download tool that was run.
        tool: &'static str,
        /// The URL being fetched.
        url: String,
        /// The exit status as reported by the OS.
        status: String,
        /// Captured stderr from the tool.
        stderr: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Command-line download tools the installer knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadTool {
    /// `curl`, preferred when present.
    Curl,
    /// `wget`, used when `curl` is missing.
    Wget,
}

impl DownloadTool {
    /// The executable name.
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Curl => "curl",
            Self::Wget => "wget",
        }
    }

    fn file_args(self, url: &str, bearer_token: Option<&str>, dest: &str) -> Vec<String> {
        let mut args = match self {
            Self::Curl => vec!["-o".to_owned(), dest.to_owned(), "-sfL".to_owned()],
            Self::Wget => vec!["-qO".to_owned(), dest.to_owned()],
        };
        args.extend(self.auth_args(bearer_token));
        args.push(url.to_owned());
        args
    }

    fn text_args(self, url: &str, bearer_token: Option<&str>) -> Vec<String> {
        let mut args = match self {
            Self::Curl => vec!["-sfL".to_owned()],
            Self::Wget => vec!["-qO".to_owned(), "-".to_owned()],
        };
        args.extend(self.auth_args(bearer_token));
        args.push(url.to_owned());
        args
    }

    fn redirect_args(self, url: &str) -> Vec<String> {
        let args: &[&str] = match self {
            Self::Curl => &["-w", "%{url_effective}", "-L", "-s", "-S", "-o", "/dev/null"],
            Self::Wget => &["-S", "-q", "-O", "/dev/null"],
        };
        args.iter()
            .map(|arg| (*arg).to_owned())
            .chain(std::iter::once(url.to_owned()))
            .collect()
    }

    fn auth_args(self, bearer_token: Option<&str>) -> Vec<String> {
        let Some(token) = bearer_token else {
            return Vec::new();
        };
        let header = format!("Authorization: Bearer {token}");
        match self {
            Self::Curl => vec!["-H".to_owned(), header],
            Self::Wget => vec![format!("--header={header}")],
        }
    }
}

/// A transport that shells out to `curl` or `wget`.
#[derive(Debug, Clone)]
pub struct CommandTransport<E> {
    tool: DownloadTool,
    executor: E,
}

impl<E: CommandExecutor> CommandTransport<E> {
    /// Create a transport driving `tool` through `executor`.
    pub fn new(tool: DownloadTool, executor: E) -> Self {
        Self { tool, executor }
    }

    fn run(&self, url: &str, args: &[String]) -> Result<std::process::Output, DownloadError> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .executor
            .run(self.tool.program(), &argv)
            .map_err(|e| DownloadError::HttpError {
                url: url.to_owned(),
                reason: format!("could not run {}: {e}", self.tool.program()),
            })?;
        if !output.status.success() {
            return Err(DownloadError::CommandFailed {
                tool: self.tool.program(),
                url: url.to_owned(),
                status: output.status.to_string(),
                stderr: stderr_text(&output),
            });
        }
        Ok(output)
    }
}

impl<E: CommandExecutor> Transport for CommandTransport<E> {
    fn name(&self) -> &'static str {
        self.tool.program()
    }

    fn fetch_to_file(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        dest: &Path,
    ) -> Result<(), DownloadError> {
        let dest = dest.to_string_lossy();
        self.run(url, &self.tool.file_args(url, bearer_token, &dest))?;
        Ok(())
    }

    fn fetch_text(&self, url: &str, bearer_token: Option<&str>) -> Result<String, DownloadError> {
        let output = self.run(url, &self.tool.text_args(url, bearer_token))?;
        String::from_utf8(output.stdout).map_err(|e| DownloadError::HttpError {
            url: url.to_owned(),
            reason: format!("response was not UTF-8: {e}"),
        })
    }

    fn effective_url(&self, url: &str) -> Result<String, DownloadError> {
        let output = self.run(url, &self.tool.redirect_args(url))?;
        let location = match self.tool {
            DownloadTool::Curl => String::from_utf8_lossy(&output.stdout).trim().to_owned(),
            DownloadTool::Wget => last_location(&String::from_utf8_lossy(&output.stderr))
                .unwrap_or(url)
                .to_owned(),
        };
        Ok(location)
    }
}

/// Extract the final `Location:` header from `wget -S` output.
fn last_location(headers: &str) -> Option<&str> {
    headers
        .lines()
        .filter_map(|line| {
            let (name, value) = line.trim().split_once(':')?;
            name.eq_ignore_ascii_case("location").then(|| value.trim())
        })
        .last()
}

/// HTTP-based transport using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "ureq"
    }

    fn fetch_to_file(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        dest: &Path,
    ) -> Result<(), DownloadError> {
        let response = get(url, bearer_token)?;
        let mut file = std::fs::File::create(dest)?;
        std::io::copy(&mut response.into_body().as_reader(), &mut file)?;
        Ok(())
    }

    fn fetch_text(&self, url: &str, bearer_token: Option<&str>) -> Result<String, DownloadError> {
        get(url, bearer_token)?
            .into_body()
            .read_to_string()
            .map_err(|e| DownloadError::HttpError {
                url: url.to_owned(),
                reason: e.to_string(),
            })
    }

    fn effective_url(&self, url: &str) -> Result<String, DownloadError> {
        use ureq::ResponseExt;

        let response = get(url, None)?;
        Ok(response.get_uri().to_string())
    }
}

fn get(
    url: &str,
    bearer_token: Option<&str>,
) -> Result<ureq::http::Response<ureq::Body>, DownloadError> {
    let mut request = http_agent().get(url);
    if let Some(token) = bearer_token {
        request = request.header("Authorization", format!("Bearer {token}"));
    }
    request.call().map_err(|e| map_ureq_error(url, &e))
}

/// Shared `ureq` agent with request timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        other => DownloadError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Pick the first available download tool, falling back to [`HttpTransport`].
///
/// Availability means `<tool> --version` exits zero. Only the first match is
/// used; later tools are not probed once one succeeds.
pub fn detect_transport<E>(executor: E) -> Box<dyn Transport>
where
    E: CommandExecutor + 'static,
{
    for tool in TRANSPORT_PREFERENCE {
        if tool_available(&executor, tool.program()) {
            log::debug!("using {} for downloads", tool.program());
            return Box::new(CommandTransport::new(tool, executor));
        }
    }
    log::debug!("no download tool found; using built-in HTTP client");
    Box::new(HttpTransport)
}
