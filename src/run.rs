use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::builder::Builder;
use crate::classify::Classifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::FileEvent;
use crate::process::{self, Supervisor};
use crate::registry::{is_hidden, WatchSet};
use crate::signal;
use crate::walk;
use crate::watcher::{Event, Watcher};

/// The watch, build, restart loop.
///
/// Everything in here is touched from one thread only: events are handled
/// one at a time, in the order the watcher delivers them.
pub struct Kumara {
    root: PathBuf,
    registry: WatchSet,
    classifier: Classifier,
    builder: Builder,
    supervisor: Supervisor,
    debounce: Option<Duration>,
}

impl Kumara {
    /// Sets up the watcher; events for registered directories are sent to `tx`.
    pub fn new(config: &Config, tx: Sender<Event>) -> Result<Self> {
        let root = config.root.canonicalize().map_err(|err| {
            Error::Canonicalization(config.root.to_string_lossy().into_owned(), err)
        })?;

        let registry = WatchSet::new(Watcher::new(tx, config.poll)?);
        if registry.is_polling() {
            warn!("Polling for changes every {:?}", config.poll.unwrap_or_default());
        }

        Ok(Self {
            registry,
            classifier: Classifier::new(config.source_extension()),
            builder: Builder::new(&config.build_command, &root),
            supervisor: Supervisor::new(&root.join(&config.artifact), &root, config.kill_timeout),
            debounce: config.debounce,
            root,
        })
    }

    pub fn registry(&self) -> &WatchSet {
        &self.registry
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn share_pid(&mut self, live: Arc<AtomicU32>) {
        self.supervisor.share_pid(live);
    }

    /// Registers the root and every non-hidden directory below it.
    pub fn discover(&mut self) -> Result<usize> {
        if is_hidden(&self.root) {
            warn!(
                "{} is hidden, nothing under it will be watched",
                self.root.display()
            );
        }

        let count = walk::register_tree(&self.root, &mut self.registry)?;
        info!("Watching {} directories under {}", count, self.root.display());
        Ok(count)
    }

    /// Builds, and on success replaces the running program.
    ///
    /// A failed build leaves the running program alone.
    pub fn rebuild(&mut self) -> Result<()> {
        self.builder.build()?;
        self.supervisor.restart()
    }

    /// Classifies one raw event, registering any new directory it reveals.
    ///
    /// Returns whether the event calls for a rebuild.
    pub fn observe(&mut self, raw: Event) -> bool {
        let event = match FileEvent::from_raw(raw) {
            Some(Ok(event)) => event,
            Some(Err(err)) => {
                error!("Watch error: {}", err);
                return false;
            }
            None => return false,
        };

        debug!("event: {} - {}", event.describe(), event.path.display());
        let class = self.classifier.classify(&event);

        if class.new_directory {
            if let Err(err) = walk::register_tree(&event.path, &mut self.registry) {
                warn!("{}", err);
            }
        }

        if class.triggers_rebuild {
            debug!("Path updated: {}", event.path.display());
        }

        class.triggers_rebuild
    }

    /// Handles one event to completion. Failures are logged, never returned.
    pub fn handle(&mut self, raw: Event) {
        if self.observe(raw) {
            self.cycle();
        }
    }

    /// Handles events until the watcher goes away.
    ///
    /// A rebuild that is still pending when the channel closes is carried out
    /// before [`Error::EventSourceClosed`] is returned.
    pub fn serve(&mut self, rx: &Receiver<Event>) -> Result<()> {
        loop {
            debug!("Waiting for filesystem activity");
            let raw = rx.recv().map_err(|_| Error::EventSourceClosed)?;
            if !self.observe(raw) {
                continue;
            }

            let open = self.settle(rx);
            self.cycle();
            if !open {
                return Err(Error::EventSourceClosed);
            }
        }
    }

    fn cycle(&mut self) {
        if let Err(err) = self.rebuild() {
            error!("{}", err);
        }
    }

    /// With a debounce window, soaks up events until a full window has passed
    /// since the last one that called for a rebuild. Other events are still
    /// observed on the way but don't hold the rebuild back.
    ///
    /// Returns false if the channel closed while waiting.
    fn settle(&mut self, rx: &Receiver<Event>) -> bool {
        let window = match self.debounce {
            Some(window) => window,
            None => return true,
        };

        let mut deadline = Instant::now() + window;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }

            match rx.recv_timeout(deadline - now) {
                Ok(raw) => {
                    if self.observe(raw) {
                        deadline = Instant::now() + window;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }
}

/// Watches `config.root`, builds, runs, and keeps rebuilding and rerunning.
///
/// Only returns on failure: anything before the loop starts is a
/// [`Error::Startup`], and the loop itself only stops if the watcher dies.
pub fn run(config: Config) -> Result<()> {
    let live = Arc::new(AtomicU32::new(0));
    let target = Arc::clone(&live);
    signal::install_handler(move || {
        let pid = target.load(Ordering::SeqCst);
        if pid != 0 {
            debug!("Killing process {} on the way out", pid);
            if let Err(err) = process::kill(pid) {
                warn!("Unable to kill process {}: {}", pid, err);
            }
        }
    })
    .map_err(Error::startup)?;

    let (tx, rx) = channel();
    let mut kumara = Kumara::new(&config, tx).map_err(Error::startup)?;
    kumara.share_pid(live);

    kumara.discover().map_err(Error::startup)?;
    kumara.rebuild().map_err(Error::startup)?;

    kumara.serve(&rx)
}
