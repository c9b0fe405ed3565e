//! The set of directories under watch.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::watcher::Watcher;

/// Leaf names starting with this are never watched (`.git`, `.idea`, ...).
pub const HIDDEN_PREFIX: char = '.';

/// Whether the last component of `path` marks it as hidden.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map_or(false, |name| name.to_string_lossy().starts_with(HIDDEN_PREFIX))
}

/// Directories currently registered with the watcher.
///
/// Grows only; nothing is ever unwatched.
pub struct WatchSet {
    watcher: Watcher,
    paths: BTreeSet<PathBuf>,
}

impl WatchSet {
    pub fn new(watcher: Watcher) -> Self {
        Self {
            watcher,
            paths: BTreeSet::new(),
        }
    }

    /// Starts watching `path`.
    ///
    /// A path seen before is handed to the watcher again: a directory that was
    /// removed and recreated lost its old watch along with its old inode.
    ///
    /// Returns `Ok(false)` when the path is hidden or was already known.
    pub fn register(&mut self, path: &Path) -> Result<bool> {
        debug!("Add: {}", path.display());

        if is_hidden(path) {
            debug!("Skipping hidden directory {}", path.display());
            return Ok(false);
        }

        self.watcher
            .watch(path)
            .map_err(|err| Error::WatchRegistration(path.to_path_buf(), err))?;

        if self.paths.insert(path.to_path_buf()) {
            info!("Watching {}", path.display());
            Ok(true)
        } else {
            debug!("Watching {} again", path.display());
            Ok(false)
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn is_polling(&self) -> bool {
        self.watcher.is_polling()
    }
}
