use nix::errno::Errno;
use nix::sys::signal::{kill, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;

/// Whether a process with the given pid currently exists. Sends signal
/// 0, which probes without delivering anything. EPERM means the
/// process exists but belongs to someone else, so it counts as alive.
pub fn pid_is_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        // ESRCH and anything else: treat as gone
        Err(_) => false,
    }
}

/// Install `handler` for each of `signals`, *without* SA_RESTART so
/// that a pending blocking `accept` returns EINTR and the caller gets
/// to check its shutdown flag.
pub fn install_handler(signals: &[Signal], handler: extern "C" fn(i32)) -> Result<(), Errno> {
    let action = SigAction::new(
        SigHandler::Handler(handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in signals {
        unsafe {
            // Safe: the handler is an async-signal-safe extern "C" fn
            // provided by the caller (ours only store to an atomic).
            sigaction(*signal, &action)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_pid_is_alive() {
        assert!(pid_is_alive(std::process::id()));
    }

    #[test]
    fn pid_one_is_alive_even_without_permission() {
        // kill(1, 0) yields EPERM for unprivileged callers, which must
        // still count as alive.
        assert!(pid_is_alive(1));
    }

    #[test]
    fn absurd_pid_is_dead() {
        assert!(!pid_is_alive(0));
    }
}
