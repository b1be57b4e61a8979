//! The daemon supervisor: owns the listening socket, a worker thread
//! per accepted connection, the reaper, and signal-driven shutdown.
//! Each connection carries exactly one frame and gets exactly one
//! status line back.

use std::fs::Permissions;
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use nix::sys::signal::Signal;

use logx_unix_util::file_lock::acquire_instance_lock;
use logx_unix_util::signal::install_handler;

use crate::dispatch::dispatch;
use crate::ipc::{self, ErrorCode, Frame, Response};
use crate::reaper::{Reaper, DEFAULT_REAP_INTERVAL};
use crate::session::SessionRegistry;

#[derive(Debug, Clone)]
pub struct ServerOpts {
    pub socket_path: PathBuf,
    pub reap_interval: Duration,
}

impl Default for ServerOpts {
    fn default() -> Self {
        ServerOpts {
            socket_path: PathBuf::from(ipc::SOCKET_PATH),
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_sig: i32) {
    // Only an atomic store: async-signal-safe.
    SHUTDOWN.store(true, Ordering::SeqCst);
}

fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Serve one client: read the frame, dispatch it, answer with the
/// status line. Never panics the worker; protocol errors become ERR
/// replies and the connection is closed either way.
pub fn handle_client(mut stream: UnixStream, registry: &SessionRegistry) {
    let response = match Frame::read_from(&mut stream) {
        Ok(frame) => dispatch(registry, frame),
        Err(e) => {
            eprintln!("[logxd] rejecting request: {e}");
            Response::err(ErrorCode::from(&e), format!("{e}"))
        }
    };
    _ = stream.write_all(response.to_line().as_bytes());
    _ = stream.flush();
}

/// The accept loop. Runs until `should_stop` turns true (an EINTR from
/// a signal, or a probe connection, gets it re-checked). Public so
/// tests can drive a listener on a scratch socket path.
pub fn serve(
    listener: UnixListener,
    registry: Arc<SessionRegistry>,
    should_stop: impl Fn() -> bool,
) {
    loop {
        if should_stop() {
            break;
        }
        match listener.accept() {
            Ok((stream, _addr)) => {
                if should_stop() {
                    // still answer the connection that woke us
                    handle_client(stream, &registry);
                    break;
                }
                let registry = registry.clone();
                // Detached worker: it drains even if shutdown starts.
                std::thread::spawn(move || handle_client(stream, &registry));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("[logxd] accept failed: {e}");
                break;
            }
        }
    }
}

/// Bind the socket (replacing a stale file), make it reachable for
/// unprivileged clients, start the reaper, and accept until a
/// shutdown signal arrives.
pub fn run(opts: &ServerOpts) -> anyhow::Result<()> {
    // Refuse to run twice against the same socket.
    let mut lock_path = opts.socket_path.clone().into_os_string();
    lock_path.push(".lock");
    let _instance = acquire_instance_lock(PathBuf::from(lock_path))
        .map_err(|e| anyhow!("daemon already running? {e}"))?;

    match std::fs::remove_file(&opts.socket_path) {
        Ok(()) => (),
        Err(e) if e.kind() == io::ErrorKind::NotFound => (),
        Err(e) => return Err(e).context("removing stale socket"),
    }
    let listener = UnixListener::bind(&opts.socket_path)
        .with_context(|| anyhow!("binding {:?}", opts.socket_path))?;
    // Non-privileged clients must be able to connect.
    std::fs::set_permissions(&opts.socket_path, Permissions::from_mode(0o666))
        .context("chmod on socket")?;

    install_handler(
        &[Signal::SIGTERM, Signal::SIGINT, Signal::SIGQUIT],
        request_shutdown,
    )
    .map_err(|e| anyhow!("installing signal handlers: {e}"))?;

    let registry = Arc::new(SessionRegistry::new());
    let reaper = Reaper::spawn(registry.clone(), opts.reap_interval, shutdown_requested);

    eprintln!("[logxd] listening on {:?}", opts.socket_path);
    serve(listener, registry.clone(), shutdown_requested);

    eprintln!("[logxd] shutting down");
    reaper.join();
    registry.destroy_all();
    _ = std::fs::remove_file(&opts.socket_path);
    Ok(())
}
