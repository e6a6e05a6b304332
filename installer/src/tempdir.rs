//! Download scratch space that survives neither success, failure, nor
//! interruption.
//!
//! [`ScopedTempDir`] removes itself on drop like [`tempfile::TempDir`]. Drop
//! does not run when the process is killed by a signal, so every live
//! directory is also registered in a process-wide list that the interrupt
//! handler installed by [`install_interrupt_cleanup`] sweeps before exiting.
//! Files staged outside a scratch directory join the same list through
//! [`InterruptGuard`].

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Exit status used after an interrupt, as shells report for SIGINT.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

static LIVE_PATHS: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// A temporary directory removed on drop or on interrupt.
#[derive(Debug)]
pub struct ScopedTempDir {
    inner: tempfile::TempDir,
    _guard: InterruptGuard,
}

impl ScopedTempDir {
    /// Create a fresh directory under the system temp location.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn new() -> Result<Self> {
        let inner = tempfile::Builder::new().prefix("k3s-install.").tempdir()?;
        let guard = InterruptGuard::new(inner.path());
        log::trace!("created scratch directory {}", inner.path().display());
        Ok(Self {
            inner,
            _guard: guard,
        })
    }

    /// Path of the directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

/// Keeps a path on the interrupt sweep list until dropped.
///
/// Dropping the guard only forgets the path; removing it in the normal
/// course of events is the owner's job.
#[derive(Debug)]
pub struct InterruptGuard {
    path: PathBuf,
}

impl InterruptGuard {
    /// Register `path` for removal should the process be interrupted.
    #[must_use]
    pub fn new(path: &Path) -> Self {
        live_paths().push(path.to_path_buf());
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        live_paths().retain(|live| *live != self.path);
    }
}

fn live_paths() -> MutexGuard<'static, Vec<PathBuf>> {
    LIVE_PATHS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether `path` is currently on the interrupt sweep list.
#[must_use]
pub fn is_live(path: &Path) -> bool {
    live_paths().iter().any(|live| live == path)
}

/// Remove each file or directory in `paths`, ignoring ones already gone.
pub fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        let removed = match path.symlink_metadata() {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(e) => Err(e),
        };
        match removed {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                log::debug!("could not remove {}: {e}", path.display());
            }
            _ => {}
        }
    }
}

/// Empty `live` and remove everything it listed.
///
/// Returns the number of paths swept.
pub fn sweep(live: &Mutex<Vec<PathBuf>>) -> usize {
    let paths = std::mem::take(&mut *live.lock().unwrap_or_else(PoisonError::into_inner));
    remove_all(&paths);
    paths.len()
}

/// Install a SIGINT/SIGTERM handler that removes live scratch paths and
/// exits with [`INTERRUPTED_EXIT_CODE`].
///
/// # Errors
///
/// Returns [`InstallerError::SignalHandler`](crate::error::InstallerError::SignalHandler)
/// if a handler is already installed.
pub fn install_interrupt_cleanup() -> Result<()> {
    ctrlc::set_handler(|| {
        let swept = sweep(&LIVE_PATHS);
        log::debug!("interrupted; removed {swept} scratch paths");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_is_tracked_until_dropped() {
        let dir = ScopedTempDir::new().expect("temp dir");
        let path = dir.path().to_path_buf();
        assert!(path.is_dir());
        assert!(is_live(&path));

        drop(dir);
        assert!(!path.exists());
        assert!(!is_live(&path));
    }

    #[test]
    fn remove_all_clears_nested_content_and_ignores_missing() {
        let root = tempfile::tempdir().expect("temp dir");
        let scratch = root.path().join("scratch");
        std::fs::create_dir_all(scratch.join("nested")).expect("mkdir");
        std::fs::write(scratch.join("nested/k3s.zip"), b"partial").expect("write");

        remove_all(&[scratch.clone(), root.path().join("never-created")]);
        assert!(!scratch.exists());
    }

    #[test]
    fn guard_tracks_staged_file_until_dropped() {
        let root = tempfile::tempdir().expect("temp dir");
        let staged = root.path().join(".k3s.partial");
        std::fs::write(&staged, b"partial").expect("write");

        let guard = InterruptGuard::new(&staged);
        assert!(is_live(&staged));
        drop(guard);
        assert!(!is_live(&staged));
        assert!(staged.exists());
    }

    #[test]
    fn sweep_drains_list_and_removes_files_and_directories() {
        let root = tempfile::tempdir().expect("temp dir");
        let scratch = root.path().join("k3s-install.scratch");
        let staged = root.path().join(".k3s.partial");
        std::fs::create_dir_all(&scratch).expect("mkdir");
        std::fs::write(scratch.join("k3s"), b"partial").expect("write");
        std::fs::write(&staged, b"partial").expect("write");
        let live = Mutex::new(vec![scratch.clone(), staged.clone()]);

        assert_eq!(sweep(&live), 2);
        assert!(!scratch.exists());
        assert!(!staged.exists());
        assert!(live.lock().expect("lock").is_empty());
        assert_eq!(sweep(&live), 0);
    }
}
