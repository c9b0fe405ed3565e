use std::{error::Error as StdError, fmt, io, path::PathBuf};

use crate::builder::BuildResult;

pub type Result<T> = ::std::result::Result<T, Error>;

#[non_exhaustive]
pub enum Error {
    Canonicalization(String, io::Error),
    Io(io::Error),
    Notify(notify::Error),
    Config(String),
    /// A directory could not be watched.
    WatchRegistration(PathBuf, notify::Error),
    /// An event's target could not be stat'd.
    PathLookup(PathBuf, io::Error),
    /// The build command could not be launched at all.
    BuildSpawn(String, io::Error),
    /// The build command ran and exited non-zero.
    Build(BuildResult),
    ProcessStart(PathBuf, io::Error),
    ProcessTermination(u32, io::Error),
    EventSourceClosed,
    /// Anything that goes wrong before the loop is idle. Not recoverable.
    Startup(Box<Error>),
}

impl Error {
    pub fn startup(err: impl Into<Self>) -> Self {
        match err.into() {
            err @ Self::Startup(_) => err,
            err => Self::Startup(Box::new(err)),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Canonicalization(_, err)
            | Self::Io(err)
            | Self::PathLookup(_, err)
            | Self::BuildSpawn(_, err)
            | Self::ProcessStart(_, err)
            | Self::ProcessTermination(_, err) => Some(err),
            Self::Notify(err) | Self::WatchRegistration(_, err) => Some(err),
            Self::Startup(err) => Some(err.as_ref()),
            Self::Config(_) | Self::Build(_) | Self::EventSourceClosed => None,
        }
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::Config(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<notify::Error> for Error {
    fn from(err: notify::Error) -> Self {
        match err {
            notify::Error::Io(err) => Self::Io(err),
            other => Self::Notify(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (error_type, error) = match self {
            Self::Canonicalization(path, err) => (
                "Path",
                format!("couldn't canonicalize '{}':\n{}", path, err),
            ),
            Self::Io(err) => ("I/O", err.to_string()),
            Self::Notify(err) => ("Notify", err.to_string()),
            Self::Config(err) => ("Config", err.clone()),
            Self::WatchRegistration(path, err) => (
                "Watch",
                format!("couldn't watch '{}': {}", path.display(), err),
            ),
            Self::PathLookup(path, err) => (
                "Path",
                format!("couldn't stat '{}': {}", path.display(), err),
            ),
            Self::BuildSpawn(cmd, err) => ("Build", format!("couldn't run `{}`: {}", cmd, err)),
            Self::Build(result) => ("Build", format!("build failed ({})", result.status())),
            Self::ProcessStart(program, err) => (
                "Process",
                format!("couldn't start '{}': {}", program.display(), err),
            ),
            Self::ProcessTermination(pid, err) => (
                "Process",
                format!("couldn't terminate process {}: {}", pid, err),
            ),
            Self::EventSourceClosed => ("Watch", "event source closed".to_string()),
            Self::Startup(err) => return write!(f, "Startup failed: {}", err),
        };

        write!(f, "{} error: {}", error_type, error)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
