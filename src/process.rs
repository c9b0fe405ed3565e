#![allow(unsafe_code)]

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Exit status of a program, filled in by its reaper thread.
#[derive(Debug, Default)]
struct ExitState {
    lock: Mutex<Option<Option<ExitStatus>>>,
    cvar: Condvar,
}

impl ExitState {
    fn set(&self, status: Option<ExitStatus>) {
        let mut done = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        *done = Some(status);
        self.cvar.notify_all();
    }

    fn is_set(&self) -> bool {
        self.lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while done.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            done = self
                .cvar
                .wait_timeout(done, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        true
    }
}

/// The running program, as far as the supervisor is concerned.
///
/// The [`Child`] itself belongs to the reaper thread; this only keeps the pid
/// and a view of the exit state.
#[derive(Debug)]
pub struct SupervisedProcess {
    pid: u32,
    exit: Arc<ExitState>,
}

impl SupervisedProcess {
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// False once the reaper has collected the process.
    pub fn is_alive(&self) -> bool {
        !self.exit.is_set()
    }

    /// Waits up to `timeout` for the process to be reaped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.exit.wait_timeout(timeout)
    }
}

/// Keeps at most one instance of the built program running.
pub struct Supervisor {
    program: PathBuf,
    cwd: PathBuf,
    kill_timeout: Duration,
    current: Option<SupervisedProcess>,
    live: Arc<AtomicU32>,
}

impl Supervisor {
    pub fn new(program: &Path, cwd: &Path, kill_timeout: Duration) -> Self {
        Self {
            program: program.to_path_buf(),
            cwd: cwd.to_path_buf(),
            kill_timeout,
            current: None,
            live: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn current(&self) -> Option<&SupervisedProcess> {
        self.current.as_ref()
    }

    /// Publishes the pid of the running program (0 for none) into `live`,
    /// for whoever has to kill it from another thread.
    pub fn share_pid(&mut self, live: Arc<AtomicU32>) {
        let pid = self.current.as_ref().map_or(0, |process| process.pid);
        live.store(pid, Ordering::SeqCst);
        self.live = live;
    }

    /// Kills the running program, if any, and starts a fresh one.
    ///
    /// If the old program can't be confirmed dead, it stays current and the
    /// replacement isn't started, so there are never two running at once.
    pub fn restart(&mut self) -> Result<()> {
        self.stop()?;

        info!("Starting process");
        let process = self.start()?;
        info!("Started process {}", process.pid);

        self.current = Some(process);
        Ok(())
    }

    /// Kills the running program, if any, and waits for it to be reaped.
    ///
    /// The kill goes out even when the program already exited, for whatever
    /// it left behind in its group.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(prev) = &self.current {
            let alive = prev.is_alive();
            info!("Stopping process {}", prev.pid);
            imp::kill(prev.pid).map_err(|err| Error::ProcessTermination(prev.pid, err))?;

            if alive && !prev.wait_timeout(self.kill_timeout) {
                return Err(Error::ProcessTermination(
                    prev.pid,
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("still running after {:?}", self.kill_timeout),
                    ),
                ));
            }
        }

        self.current = None;
        self.live.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Spawns the program and publishes its pid before anything else happens.
    fn start(&self) -> Result<SupervisedProcess> {
        let mut command = Command::new(&self.program);
        command
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        imp::prepare(&mut command);

        debug!("Assembled command {:?}", command);
        let mut child = command
            .spawn()
            .map_err(|err| Error::ProcessStart(self.program.clone(), err))?;
        let pid = child.id();
        self.live.store(pid, Ordering::SeqCst);

        if let Some(stdout) = child.stdout.take() {
            spawn_relay(pid, "stdout", stdout, io::stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_relay(pid, "stderr", stderr, io::stderr);
        }

        let exit = Arc::new(ExitState::default());
        spawn_reaper(child, Arc::clone(&exit));

        Ok(SupervisedProcess { pid, exit })
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!("{}", err);
        }
    }
}

/// Kills the process group led by `pid`. Used on the way out.
pub fn kill(pid: u32) -> io::Result<()> {
    imp::kill(pid)
}

/// Copies everything from `from` to `to`, flushing after every read.
pub fn relay(mut from: impl Read, mut to: impl Write) -> io::Result<u64> {
    let mut buf = [0; 8192];
    let mut total = 0;
    loop {
        let n = match from.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        to.write_all(&buf[..n])?;
        to.flush()?;
        total += n as u64;
    }
}

fn spawn_relay<R, W>(pid: u32, name: &str, from: R, to: fn() -> W)
where
    R: Read + Send + 'static,
    W: Write + 'static,
{
    let spawned = thread::Builder::new()
        .name(format!("kumara-{}-{}", name, pid))
        .spawn(move || {
            if let Err(err) = relay(from, to()) {
                debug!("Relay for process {} stopped: {}", pid, err);
            }
        });

    if let Err(err) = spawned {
        warn!("Unable to relay {} of process {}: {}", name, pid, err);
    }
}

fn spawn_reaper(mut child: Child, exit: Arc<ExitState>) {
    let pid = child.id();
    let spawned = thread::Builder::new()
        .name(format!("kumara-reap-{}", pid))
        .spawn(move || {
            let status = match child.wait() {
                Ok(status) => {
                    info!("Process {} exited: {}", pid, status);
                    Some(status)
                }
                Err(err) => {
                    warn!("Unable to wait for process {}: {}", pid, err);
                    None
                }
            };
            exit.set(status);
        });

    // Nothing will ever mark this one as exited, so stopping it times out.
    if let Err(err) = spawned {
        warn!("Unable to watch process {} for exit: {}", pid, err);
    }
}

#[cfg(unix)]
mod imp {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::{setsid, Pid};
    use std::convert::TryFrom;
    use std::io;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    /// Puts the program in its own session so the whole group can be killed.
    pub fn prepare(command: &mut Command) {
        crate::signal::reset_mask(command);
        unsafe {
            command.pre_exec(|| setsid().map(|_| ()).map_err(io::Error::from));
        }
    }

    pub fn kill(pid: u32) -> io::Result<()> {
        let pgid = i32::try_from(pid)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::io;
    use std::process::Command;
    use winapi::shared::minwindef::FALSE;
    use winapi::shared::winerror::ERROR_INVALID_PARAMETER;
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
    use winapi::um::winnt::PROCESS_TERMINATE;

    pub fn prepare(_command: &mut Command) {}

    pub fn kill(pid: u32) -> io::Result<()> {
        let handle = unsafe { OpenProcess(PROCESS_TERMINATE, FALSE, pid) };
        if handle.is_null() {
            let err = io::Error::last_os_error();
            // The process is already gone.
            if err.raw_os_error() == Some(ERROR_INVALID_PARAMETER as i32) {
                return Ok(());
            }
            return Err(err);
        }

        let terminated = unsafe { TerminateProcess(handle, 1) };
        let err = io::Error::last_os_error();
        unsafe {
            CloseHandle(handle);
        }

        if terminated == 0 {
            Err(err)
        } else {
            Ok(())
        }
    }
}
