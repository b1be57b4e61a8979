//! The thin CLI client for the logxd daemon: one invocation builds one
//! frame, sends it, prints the daemon's status line and exits 0 iff
//! the answer was `OK`.

// Use from the standard library
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// Use from external dependencies
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use nix::unistd::getppid;

// Use from src/*.rs
use logx::clap_styles::clap_styles;
use logx::config::RotateKind;
use logx::ipc::{CfgKey, Frame, Payload, TimerAction, SOCKET_PATH};
use logx::level::Level;

#[derive(Debug, Parser)]
#[clap(
    name = "logx",
    version,
    about = "Talk to the logxd logging daemon.",
    styles = clap_styles()
)]
struct Cli {
    /// Socket the daemon listens on.
    #[clap(long, default_value = SOCKET_PATH)]
    socket: PathBuf,

    /// Client pid owning the session. Defaults to the parent process
    /// (the invoking shell), so consecutive invocations address the
    /// same session and the reaper collects it once the shell exits.
    #[clap(long)]
    pid: Option<u32>,

    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Create a logger session for this client, optionally from a
    /// configuration file (TOML or JSON).
    Create {
        /// Configuration file for the new logger; defaults otherwise.
        #[clap(long)]
        path: Option<PathBuf>,
    },
    /// Destroy this client's logger session.
    Destroy,
    /// Log a TRACE record.
    Trace { msg: String },
    /// Log a DEBUG record.
    Debug { msg: String },
    /// Log an INFO record.
    Info { msg: String },
    /// Log a WARN record.
    Warn { msg: String },
    /// Log an ERROR record.
    Error { msg: String },
    /// Log a FATAL record.
    Fatal { msg: String },
    /// Log a framed banner record.
    Banner { msg: String },
    /// Change one configuration key, e.g. `cfg console_level WARN`.
    Cfg { key: String, value: String },
    /// Rotate the log file right now.
    RotateNow,
    /// Control a named stopwatch timer.
    Timer {
        #[clap(subcommand)]
        action: TimerCmd,
    },
}

#[derive(Debug, Subcommand)]
enum TimerCmd {
    Start { name: String },
    Stop { name: String },
    Pause { name: String },
    Resume { name: String },
}

fn log_payload(level: Level, msg: String) -> Payload {
    Payload::Log {
        level: level as u32,
        line: 0,
        file_name: "shell".into(),
        message: msg,
    }
}

/// The value for `cfg <key> <value>`: level keys take level names (or
/// numbers), the rotation type its name, toggles true/false/1/0, the
/// rest plain numbers.
fn parse_cfg_value(key: CfgKey, value: &str) -> Result<u32> {
    match key {
        CfgKey::ConsoleLevel | CfgKey::FileLevel => {
            if let Ok(level) = value.parse::<Level>() {
                return Ok(level as u32);
            }
            value
                .parse::<u32>()
                .map_err(|_| anyhow!("not a level: {value:?}"))
        }
        CfgKey::RotateType => {
            if let Ok(kind) = value.parse::<RotateKind>() {
                return Ok(kind as u32);
            }
            value
                .parse::<u32>()
                .map_err(|_| anyhow!("not a rotation type: {value:?}"))
        }
        CfgKey::ConsoleLogging
        | CfgKey::FileLogging
        | CfgKey::ColoredLogging
        | CfgKey::TtyDetection
        | CfgKey::PrintConfig => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "on" => Ok(1),
            "0" | "false" | "off" => Ok(0),
            _ => Err(anyhow!("not a boolean: {value:?}")),
        },
        CfgKey::SizeMb | CfgKey::IntervalDays | CfgKey::MaxBackups => value
            .parse::<u32>()
            .map_err(|_| anyhow!("not a number: {value:?}")),
    }
}

fn build_payload(cmd: Cmd) -> Result<Payload> {
    Ok(match cmd {
        Cmd::Create { path } => Payload::Create {
            config_path: match path {
                Some(p) => p
                    .to_str()
                    .ok_or_else(|| anyhow!("config path is not valid UTF-8"))?
                    .to_string(),
                None => String::new(),
            },
        },
        Cmd::Destroy => Payload::Destroy,
        Cmd::Trace { msg } => log_payload(Level::Trace, msg),
        Cmd::Debug { msg } => log_payload(Level::Debug, msg),
        Cmd::Info { msg } => log_payload(Level::Info, msg),
        Cmd::Warn { msg } => log_payload(Level::Warn, msg),
        Cmd::Error { msg } => log_payload(Level::Error, msg),
        Cmd::Fatal { msg } => log_payload(Level::Fatal, msg),
        Cmd::Banner { msg } => log_payload(Level::Banner, msg),
        Cmd::Cfg { key, value } => {
            let cfg_key =
                CfgKey::from_name(&key).ok_or_else(|| anyhow!("unknown cfg key {key:?}"))?;
            Payload::Cfg {
                key: cfg_key as u32,
                value: parse_cfg_value(cfg_key, &value)?,
            }
        }
        Cmd::RotateNow => Payload::RotateNow,
        Cmd::Timer { action } => match action {
            TimerCmd::Start { name } => Payload::Timer {
                action: TimerAction::Start as u32,
                name,
            },
            TimerCmd::Stop { name } => Payload::Timer {
                action: TimerAction::Stop as u32,
                name,
            },
            TimerCmd::Pause { name } => Payload::Timer {
                action: TimerAction::Pause as u32,
                name,
            },
            TimerCmd::Resume { name } => Payload::Timer {
                action: TimerAction::Resume as u32,
                name,
            },
        },
    })
}

fn send(socket: &Path, frame: &Frame) -> Result<String> {
    let mut stream =
        UnixStream::connect(socket).with_context(|| anyhow!("connecting to {socket:?}"))?;
    stream
        .write_all(&frame.encode())
        .context("sending request")?;
    let mut reply = String::new();
    stream
        .read_to_string(&mut reply)
        .context("reading reply")?;
    Ok(reply)
}

fn run(cli: Cli) -> Result<bool> {
    let pid = cli
        .pid
        .unwrap_or_else(|| getppid().as_raw() as u32);
    let frame = Frame {
        pid,
        payload: build_payload(cli.cmd)?,
    };
    let reply = send(&cli.socket, &frame)?;
    print!("{reply}");
    Ok(reply.starts_with("OK"))
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("logx: {e:#}");
            ExitCode::FAILURE
        }
    }
}
