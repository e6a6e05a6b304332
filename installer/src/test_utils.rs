//! Test doubles for the installer's host seams.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use crate::command::CommandExecutor;
use crate::error::Result;
use crate::service::ServiceManager;
use crate::transport::{DownloadError, Transport};
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::process::{ExitStatus, Output};

/// Exit status as the kernel reports a process exiting with `code`.
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

fn output(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.into(),
        stderr: stderr.into(),
    }
}

/// A silent zero exit.
pub fn success_output() -> Output {
    output(0, "", "")
}

/// A zero exit that printed `stdout`.
pub fn stdout_output(stdout: &str) -> Output {
    output(0, stdout, "")
}

/// Exit status 1 with `stderr` as the diagnostic.
pub fn failure_output(stderr: &str) -> Output {
    output(1, "", stderr)
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// One scripted command and its canned reply.
#[derive(Debug)]
pub struct ExpectedCall {
    /// Program name, such as `systemctl`.
    pub cmd: &'static str,
    /// Exact argument list.
    pub args: Vec<&'static str>,
    /// Reply handed back to the caller.
    pub result: Result<Output>,
}

/// A [`CommandExecutor`] that replays a fixed script.
///
/// Each invocation must match the next scripted call exactly; anything out
/// of order or unscripted panics with the offending command line.
#[derive(Debug)]
pub struct StubExecutor {
    script: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Script the calls in the order they must happen.
    pub fn new(script: Vec<ExpectedCall>) -> Self {
        Self {
            script: RefCell::new(script.into()),
        }
    }

    /// Check that every scripted call was made.
    ///
    /// # Panics
    ///
    /// Panics listing the calls still outstanding.
    pub fn assert_finished(&self) {
        let remaining: Vec<String> = self
            .script
            .borrow()
            .iter()
            .map(|call| format!("{} {}", call.cmd, call.args.join(" ")))
            .collect();
        assert!(remaining.is_empty(), "commands never run: {remaining:?}");
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        let invoked = format!("{cmd} {}", args.join(" "));
        let next = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted command: {invoked}"));
        assert!(
            next.cmd == cmd && next.args.as_slice() == args,
            "expected `{} {}`, got `{invoked}`",
            next.cmd,
            next.args.join(" ")
        );
        next.result
    }
}

/// A transport serving canned bodies and redirects from memory.
///
/// Unknown URLs answer [`DownloadError::NotFound`]. Every request is logged
/// so tests can count network round trips.
#[derive(Debug, Default)]
pub struct StaticTransport {
    bodies: HashMap<String, Vec<u8>>,
    redirects: HashMap<String, String>,
    requests: RefCell<Vec<String>>,
    tokens: RefCell<Vec<String>>,
}

impl StaticTransport {
    /// Serve `body` for `url`.
    #[must_use]
    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_owned(), body.into());
        self
    }

    /// Redirect `from` to `to` when resolving effective URLs.
    #[must_use]
    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_owned(), to.to_owned());
        self
    }

    /// Replace the body served for `url` on an existing transport.
    pub fn set_body(&mut self, url: &str, body: impl Into<Vec<u8>>) {
        self.bodies.insert(url.to_owned(), body.into());
    }

    /// Number of body fetches (file or text) made for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }

    /// Number of requests of any kind, redirect probes included.
    pub fn total_requests(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Bearer tokens sent so far, in request order.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens.borrow().clone()
    }

    fn serve(&self, url: &str, bearer_token: Option<&str>) -> std::result::Result<&[u8], DownloadError> {
        self.requests.borrow_mut().push(url.to_owned());
        if let Some(token) = bearer_token {
            self.tokens.borrow_mut().push(token.to_owned());
        }
        self.bodies
            .get(url)
            .map(Vec::as_slice)
            .ok_or_else(|| DownloadError::NotFound {
                url: url.to_owned(),
            })
    }
}

impl Transport for StaticTransport {
    fn name(&self) -> &'static str {
        "static"
    }

    fn fetch_to_file(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        dest: &Path,
    ) -> std::result::Result<(), DownloadError> {
        let body = self.serve(url, bearer_token)?;
        std::fs::write(dest, body)?;
        Ok(())
    }

    fn fetch_text(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> std::result::Result<String, DownloadError> {
        let body = self.serve(url, bearer_token)?;
        String::from_utf8(body.to_vec()).map_err(|e| DownloadError::HttpError {
            url: url.to_owned(),
            reason: e.to_string(),
        })
    }

    fn effective_url(&self, url: &str) -> std::result::Result<String, DownloadError> {
        self.requests.borrow_mut().push(format!("redirect:{url}"));
        Ok(self
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_owned()))
    }
}

/// A service manager that records every call and always succeeds.
///
/// Calls are logged as `"<operation> <unit>"`, or just `"daemon-reload"`.
#[derive(Debug, Default)]
pub struct RecordingServiceManager {
    existing: BTreeSet<String>,
    calls: RefCell<Vec<String>>,
}

impl RecordingServiceManager {
    /// Report `unit` as already registered.
    #[must_use]
    pub fn with_existing(mut self, unit: &str) -> Self {
        self.existing.insert(unit.to_owned());
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Number of restart calls made so far.
    pub fn restart_count(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with("restart "))
            .count()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

impl ServiceManager for RecordingServiceManager {
    fn exists(&self, unit: &str) -> Result<bool> {
        Ok(self.existing.contains(unit))
    }

    fn enable(&self, unit: &str) -> Result<()> {
        self.record(format!("enable {unit}"))
    }

    fn disable(&self, unit: &str) -> Result<()> {
        self.record(format!("disable {unit}"))
    }

    fn daemon_reload(&self) -> Result<()> {
        self.record("daemon-reload".to_owned())
    }

    fn restart(&self, unit: &str) -> Result<()> {
        self.record(format!("restart {unit}"))
    }

    fn stop(&self, unit: &str) -> Result<()> {
        self.record(format!("stop {unit}"))
    }

    fn reset_failed(&self, unit: &str) -> Result<()> {
        self.record(format!("reset-failed {unit}"))
    }
}
