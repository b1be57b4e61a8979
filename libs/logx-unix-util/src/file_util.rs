use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Open a file for writing in append mode, creating it if missing but
/// never truncating it. E.g. for writing logs: another process may be
/// appending to the same path.
pub fn open_append(path: &Path) -> io::Result<File> {
    // Can't use `File::create` since that truncates.
    OpenOptions::new().create(true).append(true).open(path)
}

/// Cut an existing file down to zero length, leaving it in place.
/// A missing file is fine (there is nothing to cut).
pub fn truncate_file(path: &Path) -> io::Result<()> {
    match OpenOptions::new().write(true).truncate(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
