use notify::op::{self, Op};
use std::path::{Path, PathBuf};

pub use notify::RawEvent;

/// A path and the `notify` operations observed on it
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub op: Op,
}

impl FileEvent {
    pub fn new(path: &Path, op: Op) -> Self {
        Self {
            path: path.to_path_buf(),
            op,
        }
    }

    /// Splits a raw watcher event into a usable event or the error it carries.
    ///
    /// Events without a path (rescans, mostly) yield `None`.
    pub fn from_raw(raw: RawEvent) -> Option<Result<Self, notify::Error>> {
        match raw {
            RawEvent { op: Err(err), .. } => Some(Err(err)),
            RawEvent {
                path: Some(path),
                op: Ok(op),
                ..
            } => Some(Ok(Self { path, op })),
            RawEvent { path: None, .. } => None,
        }
    }

    pub fn is_create(&self) -> bool {
        self.op.contains(op::CREATE)
    }

    /// True when anything other than metadata changed.
    pub fn touches_content(&self) -> bool {
        !(self.op - op::CHMOD).is_empty()
    }

    pub fn describe(&self) -> String {
        const NAMES: &[(Op, &str)] = &[
            (op::CREATE, "CREATE"),
            (op::WRITE, "WRITE"),
            (op::CLOSE_WRITE, "CLOSE_WRITE"),
            (op::REMOVE, "REMOVE"),
            (op::RENAME, "RENAME"),
            (op::CHMOD, "CHMOD"),
            (op::RESCAN, "RESCAN"),
        ];

        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.op.contains(*flag))
            .map(|(_, name)| *name)
            .collect();

        if names.is_empty() {
            "NONE".into()
        } else {
            names.join("|")
        }
    }
}
