//! Scoped change of the process working directory.
//!
//! The working directory is process-global state. [`WorkdirGuard`] holds a
//! process-wide lock for as long as the directory is changed, so guards taken
//! by concurrent installers in the same process are serialized, and restores
//! the previous directory when dropped, on success and error paths alike.

use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{Error, Result};

static WORKDIR_LOCK: Mutex<()> = Mutex::const_new(());

/// Restores the previous working directory on drop.
#[derive(Debug)]
pub struct WorkdirGuard {
    previous: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl WorkdirGuard {
    /// Switch the process working directory to `dir`.
    ///
    /// Waits for any other live guard in this process to be dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the current directory cannot be read or `dir`
    /// cannot be entered; the working directory is left unchanged.
    pub async fn enter(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let lock = WORKDIR_LOCK.lock().await;
        let previous =
            std::env::current_dir().map_err(|e| Error::io_no_path(e, "current_dir"))?;
        std::env::set_current_dir(dir).map_err(|e| Error::io(e, dir, "chdir"))?;
        debug!(from = %previous.display(), to = %dir.display(), "Entered working directory");
        Ok(Self {
            previous,
            _lock: lock,
        })
    }

    /// Directory that will be restored on drop.
    #[must_use]
    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        match std::env::set_current_dir(&self.previous) {
            Ok(()) => debug!(to = %self.previous.display(), "Restored working directory"),
            Err(e) => warn!(
                to = %self.previous.display(),
                "Failed to restore working directory: {e}"
            ),
        }
    }
}
