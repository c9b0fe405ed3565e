//! Interrupt handling.
//!
//! Programs are started in their own session, so a Ctrl-C at the terminal
//! doesn't reach them. Instead kumara traps SIGINT and SIGTERM, runs a cleanup
//! closure (which kills the live program), and then dies of the same signal.
#![allow(unsafe_code)]

#[cfg(unix)]
use nix::sys::signal::{SigSet, Signal};

#[cfg(unix)]
fn termination_signals() -> SigSet {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGTERM);
    mask.add(Signal::SIGINT);
    mask
}

/// Traps termination signals and runs `handler` before letting them through.
///
/// Must be called before any other thread is started: the signal mask is
/// inherited by threads spawned afterwards, and only those ignore the signals.
#[cfg(unix)]
pub fn install_handler<F>(handler: F) -> std::io::Result<()>
where
    F: Fn() + 'static + Send,
{
    use nix::sys::signal::{raise, sigaction, SaFlags, SigAction, SigHandler};
    use std::thread;

    let mask = termination_signals();
    mask.thread_block().map_err(std::io::Error::from)?;

    thread::Builder::new()
        .name("kumara-signals".into())
        .spawn(move || {
            let sig = match mask.wait() {
                Ok(sig) => sig,
                Err(err) => {
                    error!("Unable to wait for signals: {}", err);
                    return;
                }
            };
            debug!("Received {:?}", sig);

            handler();

            // Restore default behavior for received signal and unmask it
            let default_action =
                SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
            unsafe {
                let _ = sigaction(sig, &default_action);
            }

            let mut new_mask = SigSet::empty();
            new_mask.add(sig);
            let _ = new_mask.thread_unblock();

            // Re-raise, killing the process
            let _ = raise(sig);
        })?;

    Ok(())
}

/// Windows delivers console control events to the whole console, programs
/// included, so there's nothing to relay.
#[cfg(not(unix))]
pub fn install_handler<F>(_handler: F) -> std::io::Result<()>
where
    F: Fn() + 'static + Send,
{
    Ok(())
}

/// Makes the spawned process start with termination signals unblocked.
///
/// Children inherit the signal mask, and the main thread blocks these once
/// the handler is installed.
#[cfg(unix)]
pub fn reset_mask(command: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;

    let mask = termination_signals();
    unsafe {
        command.pre_exec(move || mask.thread_unblock().map_err(std::io::Error::from));
    }
}
