//! The logx logging daemon: listens on a unix stream socket and keeps
//! one logger per client process, created, driven and torn down by
//! the framed requests described in `logx::ipc`.

// Use from the standard library
use std::path::PathBuf;
use std::time::Duration;

// Use from external dependencies
use anyhow::Result;
use clap::Parser;

// Use from src/*.rs
use logx::clap_styles::clap_styles;
use logx::ipc::SOCKET_PATH;
use logx::server::{run, ServerOpts};
use logx_unix_util::daemon::daemonize;

#[derive(Debug, Parser)]
#[clap(
    name = "logxd",
    version,
    about = "Session daemon multiplexing client processes onto per-client loggers.",
    styles = clap_styles()
)]
struct Opts {
    /// Do not detach; stay in the foreground and keep stderr.
    #[clap(long)]
    foreground: bool,

    /// Listen on this socket path instead of the well-known one.
    #[clap(long, default_value = SOCKET_PATH)]
    socket_path: PathBuf,

    /// Seconds between sweeps for sessions of dead clients.
    #[clap(long, default_value_t = 5)]
    reap_interval_secs: u64,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    if !opts.foreground {
        // Must happen before the supervisor spawns any thread.
        daemonize()?;
    }

    run(&ServerOpts {
        socket_path: opts.socket_path,
        reap_interval: Duration::from_secs(opts.reap_interval_secs),
    })
}
