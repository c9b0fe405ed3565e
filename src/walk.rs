use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::registry::{is_hidden, WatchSet};

/// Registers every directory below `root`, `root` included.
///
/// Hidden directories are skipped along with everything under them, as are
/// subtrees that can't be read. Registration failures are logged and the walk
/// carries on. Only an unreadable root is an error.
///
/// Returns the number of directories newly registered.
pub fn register_tree(root: &Path, registry: &mut WatchSet) -> Result<usize> {
    let metadata = fs::metadata(root).map_err(|err| Error::PathLookup(root.to_path_buf(), err))?;
    if !metadata.is_dir() {
        return Err(Error::PathLookup(
            root.to_path_buf(),
            std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
        ));
    }

    let mut registered = 0;
    let mut entries = WalkDir::new(root).into_iter();
    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable path: {}", err);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        if is_hidden(entry.path()) {
            debug!("Skipping hidden directory {}", entry.path().display());
            entries.skip_current_dir();
            continue;
        }

        match registry.register(entry.path()) {
            Ok(true) => registered += 1,
            Ok(false) => {}
            Err(err) => warn!("{}", err),
        }
    }

    Ok(registered)
}
