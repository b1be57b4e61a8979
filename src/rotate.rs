//! The rotation engine: shifting numbered backups and deciding when a
//! rotation is due. Locking and reopening are the logger's business;
//! these functions only look at paths and metadata.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;

use logx_unix_util::file_util::truncate_file;

/// `<path>.<i>` — backup number `i` of the given log file.
pub fn backup_path(path: &Path, i: u32) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(format!(".{i}"));
    PathBuf::from(os)
}

/// Shift the backup chain by one and make room at `<path>`:
/// `<path>.N` is deleted, `<path>.i` becomes `<path>.(i+1)` and the
/// live file becomes `<path>.1`. With `max_backups == 0` the live file
/// is truncated in place instead. Renames of missing sources are
/// ignored (holes in the chain are normal). The caller reopens the
/// live path afterwards.
pub fn rotate_files(path: &Path, max_backups: u32) -> io::Result<()> {
    if max_backups == 0 {
        return truncate_file(path);
    }

    // The oldest backup falls off the end.
    match std::fs::remove_file(backup_path(path, max_backups)) {
        Ok(()) => (),
        Err(e) if e.kind() == io::ErrorKind::NotFound => (),
        Err(e) => return Err(e),
    }

    for i in (0..max_backups).rev() {
        let src = if i == 0 {
            path.to_path_buf()
        } else {
            backup_path(path, i)
        };
        // A missing source just means that slot was never filled.
        _ = std::fs::rename(&src, backup_path(path, i + 1));
    }
    Ok(())
}

/// Whether the on-disk size of the open log file has reached the
/// threshold. Stat errors count as "not due".
pub fn size_due(file: &File, size_bytes: u64) -> bool {
    match file.metadata() {
        Ok(md) => md.len() >= size_bytes,
        Err(_) => false,
    }
}

/// Today as `YYYY-MM-DD` in local time, the granularity of date-based
/// rotation.
pub fn today_stamp() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Whether the local date has moved on from the recorded one.
pub fn date_due(recorded_date: &str) -> bool {
    today_stamp() != recorded_date
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, content: &str) {
        std::fs::File::create(path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn first_rotation_creates_dot_one() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        write_file(&log, "old");
        rotate_files(&log, 2).unwrap();
        assert!(!log.exists());
        assert_eq!(read(&backup_path(&log, 1)), "old");
        assert!(!backup_path(&log, 2).exists());
    }

    #[test]
    fn chain_shifts_and_oldest_falls_off() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        write_file(&log, "c");
        write_file(&backup_path(&log, 1), "b");
        write_file(&backup_path(&log, 2), "a");
        rotate_files(&log, 2).unwrap();
        // "a" was the oldest and is gone; everything else moved down
        assert_eq!(read(&backup_path(&log, 1)), "c");
        assert_eq!(read(&backup_path(&log, 2)), "b");
        assert!(!backup_path(&log, 3).exists());
        assert!(!log.exists());
    }

    #[test]
    fn zero_backups_truncates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        write_file(&log, "content");
        rotate_files(&log, 0).unwrap();
        assert!(log.exists());
        assert_eq!(read(&log), "");
        assert!(!backup_path(&log, 1).exists());
    }

    #[test]
    fn rotating_a_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("never-written.log");
        rotate_files(&log, 3).unwrap();
        rotate_files(&log, 0).unwrap();
        assert!(!log.exists());
    }

    #[test]
    fn size_due_at_exact_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app.log");
        write_file(&log, &"x".repeat(100));
        let f = File::open(&log).unwrap();
        assert!(size_due(&f, 100));
        assert!(!size_due(&f, 101));
    }

    #[test]
    fn date_due_against_today() {
        assert!(!date_due(&today_stamp()));
        assert!(date_due("1999-12-31"));
        assert!(date_due(""));
    }
}
