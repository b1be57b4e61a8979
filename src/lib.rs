//! logx: level-filtered, colorized logging to terminal and rotating
//! files, named stopwatch timers, and the session machinery of the
//! `logxd` daemon which multiplexes many client processes onto
//! per-client loggers over a unix stream socket.
//!
//! The library keeps no process-wide state: every operation takes the
//! `Logger` handle explicitly, and a `Logger` is safe to share across
//! threads.
//!
//! ```no_run
//! use logx::{config::Config, logger::Logger, logx_info};
//!
//! let logger = Logger::create(Some(Config::default()));
//! logx_info!(&logger, "hello {}", "world");
//! let _t = logger.timer_scope("startup");
//! // ... the timer reports when `_t` goes out of scope
//! ```

pub mod clap_styles;
pub mod config;
pub mod dispatch;
pub mod format;
pub mod ipc;
pub mod level;
pub mod logger;
pub mod reaper;
pub mod rotate;
pub mod server;
pub mod session;
pub mod timers;

pub use config::Config;
pub use level::Level;
pub use logger::Logger;
