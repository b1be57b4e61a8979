use std::fs::File;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use ouroboros::self_referencing;

use crate::unix::{try_lock_exclusive, FlockGuard};

/// An exclusively locked lock file, held for the lifetime of this
/// value. Used by the daemon to refuse starting a second instance.
#[self_referencing]
pub struct InstanceLock {
    file: File,

    #[borrows(mut file)]
    #[covariant]
    guard: FlockGuard<'this>,
}

#[derive(thiserror::Error, Debug)]
pub enum InstanceLockError {
    #[error("opening lock file")]
    Open(#[from] std::io::Error),
    #[error("calling flock")]
    Flock(#[from] Errno),
    #[error("another process holds the lock")]
    Busy,
}

/// Open (or create) `path` and take a non-blocking exclusive lock on
/// it. The file is left in place on drop; only the lock is released.
pub fn acquire_instance_lock<P: AsRef<Path>>(path: P) -> Result<InstanceLock, InstanceLockError> {
    let mut opts = File::options();
    opts.read(true);
    opts.write(true);
    opts.truncate(false);
    opts.create(true);
    opts.mode(0o600);
    let file = opts.open(path.as_ref())?;
    InstanceLock::try_new(file, |file| {
        if let Some(guard) = try_lock_exclusive(file)? {
            Ok(guard)
        } else {
            Err(InstanceLockError::Busy)
        }
    })
}
