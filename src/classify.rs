use std::ffi::OsString;
use std::fs;

use crate::error::Error;
use crate::event::FileEvent;

/// What an event means for the loop. Both may be set at once.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Classification {
    /// A directory appeared and should be watched.
    pub new_directory: bool,
    /// A source file changed and the program should be rebuilt.
    pub triggers_rebuild: bool,
}

/// Decides what a filesystem event means.
#[derive(Clone, Debug)]
pub struct Classifier {
    extension: OsString,
}

impl Classifier {
    /// `extension` is the source file suffix, without the dot.
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').into(),
        }
    }

    pub fn classify(&self, event: &FileEvent) -> Classification {
        let new_directory = event.is_create()
            && match fs::metadata(&event.path) {
                Ok(metadata) => metadata.is_dir(),
                Err(err) => {
                    warn!("{}", Error::PathLookup(event.path.clone(), err));
                    false
                }
            };

        let triggers_rebuild = event.touches_content() && self.is_source(event);

        Classification {
            new_directory,
            triggers_rebuild,
        }
    }

    fn is_source(&self, event: &FileEvent) -> bool {
        event
            .path
            .extension()
            .map_or(false, |ext| ext == self.extension.as_os_str())
    }
}
