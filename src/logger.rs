//! The logger core. A `Logger` owns its configuration copy, the open
//! log file and the timer table, all behind one mutex: records from
//! concurrent threads come out strictly serialized, and the per-record
//! advisory file lock makes them atomic even across processes sharing
//! the same log path.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use logx_unix_util::file_util::open_append;
use logx_unix_util::unix::{fd_is_tty, lock_exclusive};

use crate::config::{Config, RotateKind};
use crate::format;
use crate::level::Level;
use crate::rotate;
use crate::timers::{self, Timer, TimerGuard, MAX_TIMERS};

pub struct Logger {
    inner: Mutex<Inner>,
}

struct Inner {
    cfg: Config,
    /// Open iff file logging is enabled and the open succeeded.
    file: Option<File>,
    /// `YYYY-MM-DD` of the last write, for date-based rotation.
    current_date: String,
    timers: Vec<Timer>,
    destroyed: bool,
}

impl Logger {
    /// Create a logger from the given configuration, or — without one
    /// — from a config file / built-in defaults plus `LOGX_*` env
    /// overrides. A file that cannot be opened disables file logging
    /// (with a stderr diagnostic) instead of failing creation.
    pub fn create(cfg: Option<Config>) -> Logger {
        let cfg = cfg.unwrap_or_else(|| {
            eprintln!("[logx] no configuration provided, loading from file or defaults");
            Config::load()
        });
        let mut inner = Inner {
            cfg,
            file: None,
            current_date: String::new(),
            timers: Vec::new(),
            destroyed: false,
        };
        if inner.cfg.file_logging {
            match inner.cfg.file_path.clone() {
                Some(path) => match open_append(&path) {
                    Ok(f) => {
                        inner.file = Some(f);
                        inner.current_date = rotate::today_stamp();
                    }
                    Err(e) => {
                        eprintln!(
                            "[logx] opening {path:?} failed ({e}), disabling file logging"
                        );
                        inner.cfg.file_logging = false;
                    }
                },
                None => inner.cfg.file_logging = false,
            }
        }
        if inner.cfg.print_config {
            inner.cfg.dump();
        }
        Logger {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            // A thread that panicked mid-log loses its record; the
            // logger stays usable.
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_live(&self, f: impl FnOnce(&mut Inner)) {
        let mut inner = self.lock();
        if !inner.destroyed {
            f(&mut inner);
        }
    }

    /// Flush and close the log file. Idempotent; all operations on a
    /// destroyed logger are no-ops.
    pub fn destroy(&self) {
        let mut inner = self.lock();
        if inner.destroyed {
            return;
        }
        if let Some(mut f) = inner.file.take() {
            _ = f.flush();
        }
        inner.destroyed = true;
    }

    /// Write one record. `file`/`func`/`line` describe the call site
    /// (the `logx_*!` macros fill them in); empty strings render as
    /// `?`. Sink I/O errors lose the record for that sink only.
    pub fn log(&self, level: Level, file: &str, func: &str, line: u32, args: fmt::Arguments<'_>) {
        if level == Level::Off {
            return;
        }
        let ts = format::timestamp_now();
        let mut inner = self.lock();
        if inner.destroyed {
            return;
        }

        let write_console = inner.cfg.console_logging && level >= inner.cfg.console_level;
        let write_file =
            inner.cfg.file_logging && level >= inner.cfg.file_level && inner.file.is_some();
        if !write_console && !write_file {
            return;
        }

        inner.check_and_rotate();

        let payload_full = args.to_string();
        let payload = format::truncate_payload(&payload_full);
        let file = if file.is_empty() { "?" } else { file };
        let func = if func.is_empty() { "?" } else { func };

        if write_console {
            // WARN and above belong on stderr.
            let to_stderr = level >= Level::Warn;
            let fd = if to_stderr { 2 } else { 1 };
            let colored =
                inner.cfg.colored_logging && (!inner.cfg.tty_detection || fd_is_tty(fd));
            let rendered = format::render(
                &ts,
                level,
                file,
                func,
                line,
                payload,
                &inner.cfg.banner_pattern,
                colored,
            );
            if to_stderr {
                let mut out = io::stderr().lock();
                _ = out.write_all(rendered.as_bytes());
                _ = out.flush();
            } else {
                let mut out = io::stdout().lock();
                _ = out.write_all(rendered.as_bytes());
                _ = out.flush();
            }
        }

        if write_file {
            let rendered = format::render(
                &ts,
                level,
                file,
                func,
                line,
                payload,
                &inner.cfg.banner_pattern,
                false,
            );
            inner.write_to_file(rendered.as_bytes());
        }
    }

    // --- runtime configuration -------------------------------------

    pub fn set_console_level(&self, level: Level) {
        self.with_live(|inner| inner.cfg.console_level = level);
    }

    pub fn set_file_level(&self, level: Level) {
        self.with_live(|inner| inner.cfg.file_level = level);
    }

    pub fn enable_console_logging(&self) {
        self.with_live(|inner| inner.cfg.console_logging = true);
    }

    pub fn disable_console_logging(&self) {
        self.with_live(|inner| inner.cfg.console_logging = false);
    }

    /// Enabling needs a configured path; it also (re)opens the file if
    /// it is not currently open, e.g. after a failed rotation reopen.
    pub fn enable_file_logging(&self) {
        self.with_live(|inner| {
            let Some(path) = inner.cfg.file_path.clone() else {
                eprintln!("[logx] cannot enable file logging without a valid file path");
                inner.cfg.file_logging = false;
                return;
            };
            if inner.file.is_none() {
                match open_append(&path) {
                    Ok(f) => {
                        inner.file = Some(f);
                        inner.current_date = rotate::today_stamp();
                    }
                    Err(e) => {
                        eprintln!(
                            "[logx] opening {path:?} failed ({e}), file logging stays disabled"
                        );
                        return;
                    }
                }
            }
            inner.cfg.file_logging = true;
        });
    }

    /// The file stays open; only the flag is cleared.
    pub fn disable_file_logging(&self) {
        self.with_live(|inner| inner.cfg.file_logging = false);
    }

    pub fn enable_colored_logging(&self) {
        self.with_live(|inner| inner.cfg.colored_logging = true);
    }

    pub fn disable_colored_logging(&self) {
        self.with_live(|inner| inner.cfg.colored_logging = false);
    }

    pub fn enable_tty_detection(&self) {
        self.with_live(|inner| inner.cfg.tty_detection = true);
    }

    pub fn disable_tty_detection(&self) {
        self.with_live(|inner| inner.cfg.tty_detection = false);
    }

    pub fn enable_print_config(&self) {
        self.with_live(|inner| inner.cfg.print_config = true);
    }

    pub fn disable_print_config(&self) {
        self.with_live(|inner| inner.cfg.print_config = false);
    }

    pub fn set_rotate_kind(&self, kind: RotateKind) {
        self.with_live(|inner| inner.cfg.rotate.kind = kind);
    }

    pub fn set_size_mb(&self, mb: u64) {
        self.with_live(|inner| {
            if mb == 0 {
                eprintln!("[logx] rotation size of 0 MB rejected");
                return;
            }
            inner.cfg.rotate.size_bytes = mb * 1024 * 1024;
        });
    }

    pub fn set_max_backups(&self, n: u32) {
        self.with_live(|inner| inner.cfg.rotate.max_backups = n);
    }

    pub fn set_rotation_interval_days(&self, days: u32) {
        self.with_live(|inner| {
            if days == 0 {
                eprintln!("[logx] rotation interval of 0 days rejected");
                return;
            }
            inner.cfg.rotate.interval_days = days;
        });
    }

    pub fn set_banner_pattern(&self, pattern: &str) {
        self.with_live(|inner| {
            if pattern.is_empty() {
                eprintln!("[logx] empty banner pattern rejected");
                return;
            }
            inner.cfg.banner_pattern = pattern.to_string();
        });
    }

    /// Force a rotation right now (admin trigger). A no-op when file
    /// logging is off or no path is configured.
    pub fn rotate_now(&self) -> io::Result<()> {
        let mut inner = self.lock();
        if inner.destroyed {
            return Ok(());
        }
        if inner.cfg.file_logging && inner.cfg.file_path.is_some() {
            inner.rotate_and_reopen()
        } else {
            Ok(())
        }
    }

    // --- stopwatch timers ------------------------------------------

    pub fn timer_start(&self, name: &str) {
        self.with_live(|inner| {
            let name = timers::clamp_name(name);
            if let Some(t) = inner.timers.iter_mut().find(|t| t.name == name) {
                if t.running {
                    eprintln!("[logx] Timer[{name}] is already running");
                    return;
                }
                // a paused timer: start counting again
                t.started = Instant::now();
                t.running = true;
                return;
            }
            if inner.timers.len() >= MAX_TIMERS {
                eprintln!("[logx] timer capacity reached, can't create Timer[{name}]");
                return;
            }
            inner.timers.push(Timer {
                name,
                started: Instant::now(),
                accumulated_ns: 0,
                running: true,
            });
        });
    }

    pub fn timer_pause(&self, name: &str) {
        self.with_live(|inner| {
            let name = timers::clamp_name(name);
            let Some(t) = inner.timers.iter_mut().find(|t| t.name == name) else {
                return;
            };
            if !t.running {
                return;
            }
            t.accumulated_ns = t.accumulated_ns.saturating_add(timers::elapsed_ns(t.started));
            t.running = false;
        });
    }

    pub fn timer_resume(&self, name: &str) {
        self.with_live(|inner| {
            let name = timers::clamp_name(name);
            let Some(t) = inner.timers.iter_mut().find(|t| t.name == name) else {
                return;
            };
            if t.running {
                return;
            }
            t.started = Instant::now();
            t.running = true;
        });
    }

    /// Stop the timer, report its total running time to the enabled
    /// sinks, and remove it. Stopping an unknown name is a no-op.
    pub fn timer_stop(&self, name: &str) {
        self.with_live(|inner| {
            let name = timers::clamp_name(name);
            let Some(idx) = inner.timers.iter().position(|t| t.name == name) else {
                return;
            };
            {
                let t = &mut inner.timers[idx];
                if t.running {
                    t.accumulated_ns =
                        t.accumulated_ns.saturating_add(timers::elapsed_ns(t.started));
                    t.running = false;
                }
            }
            // remove by compaction; the table is tiny
            let t = inner.timers.remove(idx);
            let line = format!(
                "Timer[{}] took {}\n",
                t.name,
                timers::format_duration(t.accumulated_ns)
            );
            if inner.cfg.console_logging {
                let mut out = io::stderr().lock();
                _ = out.write_all(line.as_bytes());
                _ = out.flush();
            }
            if inner.cfg.file_logging {
                inner.write_to_file(line.as_bytes());
            }
        });
    }

    /// Start a timer and get a guard that stops it when the scope is
    /// left, however it is left.
    pub fn timer_scope<'a>(&'a self, name: &str) -> TimerGuard<'a> {
        self.timer_start(name);
        TimerGuard::new(self, name.to_string())
    }
}

impl Inner {
    /// Must be called with the mutex held (i.e. via `&mut self`).
    fn check_and_rotate(&mut self) {
        if !self.cfg.file_logging || self.cfg.file_path.is_none() {
            return;
        }
        match self.cfg.rotate.kind {
            RotateKind::ByDate => {
                if rotate::date_due(&self.current_date) {
                    _ = self.rotate_and_reopen();
                    self.current_date = rotate::today_stamp();
                }
            }
            RotateKind::BySize => {
                let due = self
                    .file
                    .as_ref()
                    .map(|f| rotate::size_due(f, self.cfg.rotate.size_bytes))
                    .unwrap_or(false);
                if due {
                    _ = self.rotate_and_reopen();
                }
            }
            RotateKind::None => {}
        }
    }

    /// Rename the backups and reopen the live path. The exclusive lock
    /// is held on the old descriptor across the rename and the reopen;
    /// the old descriptor (and the lock with it) goes away only once
    /// the new one is in place. A failed reopen disables file logging.
    fn rotate_and_reopen(&mut self) -> io::Result<()> {
        let Some(path) = self.cfg.file_path.clone() else {
            return Ok(());
        };
        let mut old = self.file.take();
        let old_lock = old.as_mut().and_then(|f| lock_exclusive(f).ok());

        let rotated = rotate::rotate_files(&path, self.cfg.rotate.max_backups);
        if let Err(e) = &rotated {
            eprintln!("[logx] rotating {path:?} failed: {e}");
        }
        match open_append(&path) {
            Ok(f) => self.file = Some(f),
            Err(e) => {
                eprintln!(
                    "[logx] reopening {path:?} after rotation failed ({e}), disabling file logging"
                );
                self.cfg.file_logging = false;
            }
        }

        drop(old_lock);
        drop(old);
        rotated
    }

    /// One locked, flushed write. If the lock or the write fails the
    /// record is lost for the file sink; the logger stays usable.
    fn write_to_file(&mut self, bytes: &[u8]) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        if let Ok(mut locked) = lock_exclusive(file) {
            _ = locked.write_all(bytes);
            _ = locked.flush();
        }
    }
}

/// Log at an explicit level, capturing the call site.
#[macro_export]
macro_rules! logx_log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        ($logger).log($level, file!(), module_path!(), line!(), format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! logx_trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::logx_log!($logger, $crate::level::Level::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! logx_debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::logx_log!($logger, $crate::level::Level::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! logx_banner {
    ($logger:expr, $($arg:tt)+) => {
        $crate::logx_log!($logger, $crate::level::Level::Banner, $($arg)+)
    };
}

#[macro_export]
macro_rules! logx_info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::logx_log!($logger, $crate::level::Level::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! logx_warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::logx_log!($logger, $crate::level::Level::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! logx_error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::logx_log!($logger, $crate::level::Level::Error, $($arg)+)
    };
}

#[macro_export]
macro_rules! logx_fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::logx_log!($logger, $crate::level::Level::Fatal, $($arg)+)
    };
}
