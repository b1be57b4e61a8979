//! Thin wrappers around `fork`, `flock` and `isatty`.

use std::fs::File;
use std::ops::{Deref, DerefMut};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use nix::unistd::{fork, isatty, ForkResult, Pid};
use num_threads::is_single_threaded;

/// Fork, returning the child's `Pid` in the parent and `None` in the
/// child. This function can only be run while no other threads are
/// running; it checks and panics if there are.
pub fn easy_fork() -> Result<Option<Pid>, Errno> {
    match is_single_threaded() {
        Some(true) => (),
        Some(false) => panic!("easy_fork: other threads are running, refusing to fork"),
        None => panic!("easy_fork: can't determine if other threads are running"),
    }
    match unsafe {
        // Safe because there are no other threads (we checked above).
        fork()
    }? {
        ForkResult::Parent { child, .. } => Ok(Some(child)),
        ForkResult::Child => Ok(None),
    }
}

/// An `flock` held on an open file. Dropping it releases the lock;
/// closing the file would release it, too.
pub struct FlockGuard<'a> {
    file: &'a mut File,
}

impl<'a> Deref for FlockGuard<'a> {
    type Target = File;

    fn deref(&self) -> &Self::Target {
        self.file
    }
}

impl<'a> DerefMut for FlockGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.file
    }
}

impl<'a> Drop for FlockGuard<'a> {
    fn drop(&mut self) {
        let bfd: BorrowedFd = self.file.as_fd();
        // Nothing useful to do on unlock failure; must not panic in
        // drop, and stderr may be redirected through the very file
        // being unlocked.
        _ = flock(bfd.as_raw_fd(), FlockArg::Unlock);
    }
}

/// Take an exclusive `flock` on `file`, blocking until other lock
/// holders are gone.
pub fn lock_exclusive(file: &mut File) -> Result<FlockGuard<'_>, Errno> {
    let fd = file.as_fd().as_raw_fd();
    flock(fd, FlockArg::LockExclusive)?;
    Ok(FlockGuard { file })
}

/// Take an exclusive `flock` on `file` without blocking. `None` means
/// another process holds the lock.
pub fn try_lock_exclusive(file: &mut File) -> Result<Option<FlockGuard<'_>>, Errno> {
    let fd = file.as_fd().as_raw_fd();
    match flock(fd, FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(Some(FlockGuard { file })),
        // Same as Errno::EAGAIN
        Err(Errno::EWOULDBLOCK) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether the given descriptor refers to a terminal. Errors (closed
/// descriptor etc.) count as "not a terminal".
pub fn fd_is_tty(fd: RawFd) -> bool {
    isatty(fd).unwrap_or(false)
}
