//! Socket-level tests: a real listener on a scratch path, real client
//! connections, one frame per connection, one status line back.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use logx::ipc::{CfgKey, Frame, Payload, MAGIC, VERSION};
use logx::level::Level;
use logx::server::serve;
use logx::session::SessionRegistry;

struct TestServer {
    socket_path: std::path::PathBuf,
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
    registry: Arc<SessionRegistry>,
}

impl TestServer {
    fn start(dir: &Path) -> TestServer {
        let socket_path = dir.join("logxd-test.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let registry = registry.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                serve(listener, registry, move || stop.load(Ordering::SeqCst));
            })
        };
        TestServer {
            socket_path,
            stop,
            handle: Some(handle),
            registry,
        }
    }

    fn roundtrip_bytes(&self, bytes: &[u8]) -> String {
        let mut stream = UnixStream::connect(&self.socket_path).unwrap();
        stream.write_all(bytes).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        reply
    }

    fn roundtrip(&self, frame: &Frame) -> String {
        self.roundtrip_bytes(&frame.encode())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // one more connection gets the accept loop past its blocking
        // call so it notices the flag
        _ = UnixStream::connect(&self.socket_path);
        if let Some(handle) = self.handle.take() {
            _ = handle.join();
        }
    }
}

fn config_file(dir: &Path) -> std::path::PathBuf {
    let cfg_path = dir.join("logx_cfg.json");
    let log_path = dir.join("daemon-client.log");
    std::fs::write(
        &cfg_path,
        format!(
            r#"{{"console_logging": false, "print_config": false, "file_path": {:?}}}"#,
            log_path.to_str().unwrap()
        ),
    )
    .unwrap();
    cfg_path
}

#[test]
fn create_log_destroy_over_the_socket() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());
    let cfg = config_file(dir.path());
    let pid = 4242;

    let create = Frame {
        pid,
        payload: Payload::Create {
            config_path: cfg.to_str().unwrap().into(),
        },
    };
    assert_eq!(server.roundtrip(&create), "OK\n");
    assert_eq!(server.roundtrip(&create), format!("ERR|LOGGER_EXISTS|logger exists for pid {pid}\n"));

    let log = Frame {
        pid,
        payload: Payload::Log {
            level: Level::Info as u32,
            line: 7,
            file_name: "f.c".into(),
            message: "m".into(),
        },
    };
    assert_eq!(server.roundtrip(&log), "OK\n");
    let content = std::fs::read_to_string(dir.path().join("daemon-client.log")).unwrap();
    assert!(content.contains("[INF] (f.c:?:7): m\n"), "{content:?}");

    let cfg_frame = Frame {
        pid,
        payload: Payload::Cfg {
            key: CfgKey::FileLevel as u32,
            value: Level::Error as u32,
        },
    };
    assert_eq!(server.roundtrip(&cfg_frame), "OK\n");
    // INFO is now below the file threshold
    assert_eq!(server.roundtrip(&log), "OK\n");
    let content2 = std::fs::read_to_string(dir.path().join("daemon-client.log")).unwrap();
    assert_eq!(content, content2);

    assert_eq!(
        server.roundtrip(&Frame {
            pid,
            payload: Payload::RotateNow,
        }),
        "OK\n"
    );

    assert_eq!(
        server.roundtrip(&Frame {
            pid,
            payload: Payload::Destroy,
        }),
        "OK\n"
    );
    assert_eq!(server.registry.session_count(), 0);
    assert!(server
        .roundtrip(&log)
        .starts_with("ERR|LOGGER_NOT_FOUND|"));
}

#[test]
fn timers_over_the_socket() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());
    let cfg = config_file(dir.path());
    let pid = 77;

    assert_eq!(
        server.roundtrip(&Frame {
            pid,
            payload: Payload::Create {
                config_path: cfg.to_str().unwrap().into(),
            },
        }),
        "OK\n"
    );
    for action in [1u32, 3, 4, 2] {
        // start, pause, resume, stop
        assert_eq!(
            server.roundtrip(&Frame {
                pid,
                payload: Payload::Timer {
                    action,
                    name: "t".into(),
                },
            }),
            "OK\n"
        );
    }
    let content = std::fs::read_to_string(dir.path().join("daemon-client.log")).unwrap();
    assert!(content.contains("Timer[t] took 0h:0m:0s:"), "{content:?}");
}

#[test]
fn malformed_frames_get_protocol_errors() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());

    let good = Frame {
        pid: 1,
        payload: Payload::Destroy,
    }
    .encode();

    let mut bad_magic = good.clone();
    bad_magic[0] = b'X';
    assert!(server
        .roundtrip_bytes(&bad_magic)
        .starts_with("ERR|INVALID_MAGIC|"));

    let mut bad_version = good.clone();
    bad_version[4] = 9;
    assert!(server
        .roundtrip_bytes(&bad_version)
        .starts_with("ERR|INVALID_VERSION|"));

    let mut bad_cmd = good.clone();
    bad_cmd[6] = 0x7f;
    assert!(server
        .roundtrip_bytes(&bad_cmd)
        .starts_with("ERR|INVALID_CMD|"));

    // no server state was touched by any of these
    assert_eq!(server.registry.session_count(), 0);

    // sanity: the constants the frames above rely on
    assert_eq!(MAGIC.to_le_bytes(), *b"LOGX");
    assert_eq!(VERSION, 1);
}

#[test]
fn reaper_end_to_end_removes_dead_client_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path());
    let cfg = config_file(dir.path());

    let live_pid = std::process::id();
    let dead_pid = 3_999_998u32;
    for pid in [live_pid, dead_pid] {
        assert_eq!(
            server.roundtrip(&Frame {
                pid,
                payload: Payload::Create {
                    config_path: cfg.to_str().unwrap().into(),
                },
            }),
            "OK\n"
        );
    }
    assert_eq!(server.registry.session_count(), 2);

    let reaped = server.registry.cleanup_dead();
    assert_eq!(reaped, 1);
    assert_eq!(server.registry.session_count(), 1);
    assert!(server.registry.find(live_pid).is_some());
    assert!(server.registry.find(dead_pid).is_none());
}
