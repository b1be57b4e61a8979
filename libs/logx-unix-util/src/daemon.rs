//! Classic double-fork daemonization.

use std::fs::File;
use std::os::fd::{AsRawFd, IntoRawFd};

use nix::errno::Errno;
use nix::sys::stat::{umask, Mode};
use nix::unistd::{chdir, close, dup2, setsid};

use crate::unix::easy_fork;

#[derive(thiserror::Error, Debug)]
pub enum DaemonError {
    #[error("{context}: {error}")]
    Errno {
        context: &'static str,
        error: Errno,
    },
    #[error("{context}: {error}")]
    Io {
        context: &'static str,
        error: std::io::Error,
    },
}

fn errno(context: &'static str) -> impl FnOnce(Errno) -> DaemonError {
    move |error| DaemonError::Errno { context, error }
}

/// Point stdin, stdout and stderr at `/dev/null`. The daemon must not
/// chat on descriptors it inherited from the terminal.
pub fn redirect_stdio_to_null() -> Result<(), DaemonError> {
    let null = File::options()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|error| DaemonError::Io {
            context: "opening /dev/null",
            error,
        })?;
    let fd = null.into_raw_fd();
    for target in 0..=2 {
        dup2(fd, target).map_err(errno("dup2 to stdio"))?;
    }
    if fd > 2 {
        close(fd).map_err(errno("closing /dev/null fd"))?;
    }
    Ok(())
}

/// Detach from the terminal: fork (parent exits), start a new session,
/// fork again so the daemon is not a session leader, reset umask,
/// chdir to `/`, and silence stdio.
///
/// Must be called before any thread is spawned; `easy_fork` refuses to
/// fork a multi-threaded process.
pub fn daemonize() -> Result<(), DaemonError> {
    if easy_fork().map_err(errno("first fork"))?.is_some() {
        // Original process: the daemon lives on in the child.
        std::process::exit(0);
    }

    setsid().map_err(errno("setsid"))?;

    // A session leader could re-acquire a controlling terminal; fork
    // once more so it can't.
    if easy_fork().map_err(errno("second fork"))?.is_some() {
        std::process::exit(0);
    }

    umask(Mode::empty());
    chdir("/").map_err(errno("chdir to /"))?;
    redirect_stdio_to_null()?;

    // Self check: fd 2 should now be /dev/null, not the terminal.
    debug_assert!(!crate::unix::fd_is_tty(std::io::stderr().as_raw_fd()));

    Ok(())
}
