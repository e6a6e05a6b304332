//! Operator-facing progress output.
//!
//! Progress lines go to stderr prefixed `[INFO]`, and can be silenced with
//! `--quiet`. Warnings and errors are always written. Writes are best-effort:
//! a closed stderr never aborts an install.

use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Format an error for the final diagnostic line.
#[must_use]
pub fn error_line(message: impl Display) -> String {
    format!("[ERROR] {message}")
}

/// Progress reporter for a single run.
pub struct Progress<'a> {
    stderr: &'a mut dyn Write,
    quiet: bool,
}

impl<'a> Progress<'a> {
    /// Report to `stderr`, dropping `[INFO]` lines when `quiet` is set.
    pub fn new(stderr: &'a mut dyn Write, quiet: bool) -> Self {
        Self { stderr, quiet }
    }

    /// A reporter that discards everything.
    #[must_use]
    pub fn silent(sink: &'a mut dyn Write) -> Self {
        Self::new(sink, true)
    }

    /// Report a step.
    pub fn info(&mut self, message: impl Display) {
        if !self.quiet {
            write_stderr_line(self.stderr, format!("[INFO]  {message}"));
        }
    }

    /// Report a non-fatal problem.
    pub fn warn(&mut self, message: impl Display) {
        write_stderr_line(self.stderr, format!("[WARN]  {message}"));
    }
}

impl std::fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}
