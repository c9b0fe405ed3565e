use notify::{raw_watcher, PollWatcher, RecommendedWatcher, RecursiveMode};
use std::convert::TryFrom;
use std::path::Path;
use std::sync::mpsc::Sender;
use std::time::Duration;

pub use notify::Error;
pub use notify::RawEvent as Event;

/// Thin wrapper over the notify crate
///
/// `PollWatcher` and `RecommendedWatcher` are distinct types, but kumara
/// really just wants to handle them without regard to the exact type
/// (e.g. polymorphically). This has the nice side effect of separating out
/// all coupling to the notify crate's watcher types into this module.
///
/// Directories are watched one by one, never recursively: new subdirectories
/// are picked up from their create events instead.
pub struct Watcher {
    watcher_impl: WatcherImpl,
}

enum WatcherImpl {
    Recommended(RecommendedWatcher),
    Poll(PollWatcher),
}

impl Watcher {
    pub fn new(tx: Sender<Event>, poll: Option<Duration>) -> Result<Self, Error> {
        let imp = if let Some(interval) = poll {
            let ms = u32::try_from(interval.as_millis()).unwrap_or(u32::MAX);
            WatcherImpl::Poll(PollWatcher::with_delay_ms(tx, ms)?)
        } else {
            WatcherImpl::Recommended(raw_watcher(tx)?)
        };

        Ok(Self { watcher_impl: imp })
    }

    pub fn watch(&mut self, path: &Path) -> Result<(), Error> {
        use notify::Watcher;

        match &mut self.watcher_impl {
            WatcherImpl::Recommended(watcher) => watcher.watch(path, RecursiveMode::NonRecursive),
            WatcherImpl::Poll(watcher) => watcher.watch(path, RecursiveMode::NonRecursive),
        }
    }

    pub fn is_polling(&self) -> bool {
        matches!(self.watcher_impl, WatcherImpl::Poll(_))
    }
}
