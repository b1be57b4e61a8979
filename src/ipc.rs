//! The daemon's wire protocol: little-endian binary frames on a local
//! stream socket, one frame per connection, answered by a single ASCII
//! status line (`OK` or `ERR|<code>|<message>`).

use std::io::{self, Read};

use crate::format::MAX_PAYLOAD_BYTES;
use crate::timers::TIMER_NAME_MAX;

/// Well-known socket path of the logging daemon.
pub const SOCKET_PATH: &str = "/run/logxd.sock";

/// "LOGX", little-endian.
pub const MAGIC: u32 = 0x5847_4F4C;
pub const VERSION: u16 = 1;

pub const HEADER_LEN: usize = 16;
pub const CONFIG_PATH_MAX: usize = 512;
pub const FILE_NAME_MAX: usize = 128;
pub const MESSAGE_MAX: usize = MAX_PAYLOAD_BYTES;

const LOG_PAYLOAD_LEN: usize = 4 + 4 + FILE_NAME_MAX + MESSAGE_MAX;
const CFG_PAYLOAD_LEN: usize = 4 + 4;
const TIMER_PAYLOAD_LEN: usize = 4 + TIMER_NAME_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdType {
    Create = 1,
    Destroy = 2,
    Log = 3,
    Cfg = 4,
    RotateNow = 5,
    Timer = 6,
}

impl CmdType {
    pub fn from_u16(v: u16) -> Option<CmdType> {
        match v {
            1 => Some(CmdType::Create),
            2 => Some(CmdType::Destroy),
            3 => Some(CmdType::Log),
            4 => Some(CmdType::Cfg),
            5 => Some(CmdType::RotateNow),
            6 => Some(CmdType::Timer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgKey {
    ConsoleLogging = 1,
    FileLogging = 2,
    ConsoleLevel = 3,
    FileLevel = 4,
    ColoredLogging = 5,
    TtyDetection = 6,
    PrintConfig = 7,
    RotateType = 8,
    SizeMb = 9,
    IntervalDays = 10,
    MaxBackups = 11,
}

impl CfgKey {
    pub fn from_u32(v: u32) -> Option<CfgKey> {
        match v {
            1 => Some(CfgKey::ConsoleLogging),
            2 => Some(CfgKey::FileLogging),
            3 => Some(CfgKey::ConsoleLevel),
            4 => Some(CfgKey::FileLevel),
            5 => Some(CfgKey::ColoredLogging),
            6 => Some(CfgKey::TtyDetection),
            7 => Some(CfgKey::PrintConfig),
            8 => Some(CfgKey::RotateType),
            9 => Some(CfgKey::SizeMb),
            10 => Some(CfgKey::IntervalDays),
            11 => Some(CfgKey::MaxBackups),
            _ => None,
        }
    }

    /// The spelling the CLI accepts for `cfg <key> <value>`.
    pub fn from_name(name: &str) -> Option<CfgKey> {
        match name {
            "console_logging" => Some(CfgKey::ConsoleLogging),
            "file_logging" => Some(CfgKey::FileLogging),
            "console_level" => Some(CfgKey::ConsoleLevel),
            "file_level" => Some(CfgKey::FileLevel),
            "colored_logging" => Some(CfgKey::ColoredLogging),
            "tty_detection" => Some(CfgKey::TtyDetection),
            "print_config" => Some(CfgKey::PrintConfig),
            "rotate_type" => Some(CfgKey::RotateType),
            "size_mb" => Some(CfgKey::SizeMb),
            "interval_days" => Some(CfgKey::IntervalDays),
            "max_backups" => Some(CfgKey::MaxBackups),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Start = 1,
    Stop = 2,
    Pause = 3,
    Resume = 4,
}

impl TimerAction {
    pub fn from_u32(v: u32) -> Option<TimerAction> {
        match v {
            1 => Some(TimerAction::Start),
            2 => Some(TimerAction::Stop),
            3 => Some(TimerAction::Pause),
            4 => Some(TimerAction::Resume),
            _ => None,
        }
    }
}

/// One request. Enum discriminants that arrive inside payloads (level,
/// cfg key, timer action) stay raw u32 here; the dispatcher validates
/// them and answers INVALID_LEVEL / INVALID_CONFIG / INVALID_CMD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pid: u32,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Config file path for the new logger; empty means defaults.
    Create { config_path: String },
    Destroy,
    Log {
        level: u32,
        line: u32,
        file_name: String,
        message: String,
    },
    Cfg { key: u32, value: u32 },
    RotateNow,
    Timer { action: u32, name: String },
}

impl Payload {
    pub fn cmd_type(&self) -> CmdType {
        match self {
            Payload::Create { .. } => CmdType::Create,
            Payload::Destroy => CmdType::Destroy,
            Payload::Log { .. } => CmdType::Log,
            Payload::Cfg { .. } => CmdType::Cfg,
            Payload::RotateNow => CmdType::RotateNow,
            Payload::Timer { .. } => CmdType::Timer,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error("reading frame: {0}")]
    Io(#[from] io::Error),
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported protocol version {0}")]
    BadVersion(u16),
    #[error("unknown command type {0}")]
    BadCmd(u16),
    #[error("payload length {len} impossible for command type {cmd:?}")]
    BadLength { cmd: CmdType, len: u32 },
}

/// Copy `s` into a NUL-padded field of `n` bytes. At most `n - 1`
/// bytes of content survive, cut at a char boundary, so the field is
/// always NUL-terminated.
fn put_fixed(buf: &mut Vec<u8>, s: &str, n: usize) {
    let mut end = s.len().min(n - 1);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    buf.extend_from_slice(&s.as_bytes()[..end]);
    buf.resize(buf.len() + (n - end), 0);
}

/// The content of a NUL-padded field: bytes up to the first NUL.
fn get_fixed(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn get_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes[..4].try_into().expect("slice of 4"))
}

impl Frame {
    fn payload_bytes(&self) -> Vec<u8> {
        match &self.payload {
            Payload::Create { config_path } => {
                let mut end = config_path.len().min(CONFIG_PATH_MAX);
                while !config_path.is_char_boundary(end) {
                    end -= 1;
                }
                config_path.as_bytes()[..end].to_vec()
            }
            Payload::Destroy | Payload::RotateNow => Vec::new(),
            Payload::Log {
                level,
                line,
                file_name,
                message,
            } => {
                let mut buf = Vec::with_capacity(LOG_PAYLOAD_LEN);
                buf.extend_from_slice(&level.to_le_bytes());
                buf.extend_from_slice(&line.to_le_bytes());
                put_fixed(&mut buf, file_name, FILE_NAME_MAX);
                put_fixed(&mut buf, message, MESSAGE_MAX);
                buf
            }
            Payload::Cfg { key, value } => {
                let mut buf = Vec::with_capacity(CFG_PAYLOAD_LEN);
                buf.extend_from_slice(&key.to_le_bytes());
                buf.extend_from_slice(&value.to_le_bytes());
                buf
            }
            Payload::Timer { action, name } => {
                let mut buf = Vec::with_capacity(TIMER_PAYLOAD_LEN);
                buf.extend_from_slice(&action.to_le_bytes());
                put_fixed(&mut buf, name, TIMER_NAME_MAX);
                buf
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload_bytes();
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.payload.cmd_type() as u16).to_le_bytes());
        buf.extend_from_slice(&self.pid.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);
        buf
    }

    /// Read exactly one frame: the fixed header, then exactly
    /// `payload_len` bytes, validated against the command type.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Frame, WireError> {
        let mut header = [0u8; HEADER_LEN];
        r.read_exact(&mut header)?;

        let magic = get_u32(&header[0..4]);
        if magic != MAGIC {
            return Err(WireError::BadMagic(magic));
        }
        let version = u16::from_le_bytes(header[4..6].try_into().expect("slice of 2"));
        if version != VERSION {
            return Err(WireError::BadVersion(version));
        }
        let cmd_raw = u16::from_le_bytes(header[6..8].try_into().expect("slice of 2"));
        let cmd = CmdType::from_u16(cmd_raw).ok_or(WireError::BadCmd(cmd_raw))?;
        let pid = get_u32(&header[8..12]);
        let payload_len = get_u32(&header[12..16]);

        let expected_ok = match cmd {
            CmdType::Create => payload_len as usize <= CONFIG_PATH_MAX,
            CmdType::Destroy | CmdType::RotateNow => payload_len == 0,
            CmdType::Log => payload_len as usize == LOG_PAYLOAD_LEN,
            CmdType::Cfg => payload_len as usize == CFG_PAYLOAD_LEN,
            CmdType::Timer => payload_len as usize == TIMER_PAYLOAD_LEN,
        };
        if !expected_ok {
            return Err(WireError::BadLength {
                cmd,
                len: payload_len,
            });
        }

        let mut payload = vec![0u8; payload_len as usize];
        r.read_exact(&mut payload)?;

        let payload = match cmd {
            CmdType::Create => Payload::Create {
                config_path: String::from_utf8_lossy(&payload).into_owned(),
            },
            CmdType::Destroy => Payload::Destroy,
            CmdType::RotateNow => Payload::RotateNow,
            CmdType::Log => Payload::Log {
                level: get_u32(&payload[0..4]),
                line: get_u32(&payload[4..8]),
                file_name: get_fixed(&payload[8..8 + FILE_NAME_MAX]),
                message: get_fixed(&payload[8 + FILE_NAME_MAX..]),
            },
            CmdType::Cfg => Payload::Cfg {
                key: get_u32(&payload[0..4]),
                value: get_u32(&payload[4..8]),
            },
            CmdType::Timer => Payload::Timer {
                action: get_u32(&payload[0..4]),
                name: get_fixed(&payload[4..]),
            },
        };

        Ok(Frame { pid, payload })
    }
}

// --- responses ------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidVersion,
    InvalidMagic,
    InvalidCmd,
    InvalidLevel,
    InvalidConfig,
    LoggerNotFound,
    LoggerExists,
    CreateFailed,
    DispatchFailed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidVersion => "INVALID_VERSION",
            ErrorCode::InvalidMagic => "INVALID_MAGIC",
            ErrorCode::InvalidCmd => "INVALID_CMD",
            ErrorCode::InvalidLevel => "INVALID_LEVEL",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::LoggerNotFound => "LOGGER_NOT_FOUND",
            ErrorCode::LoggerExists => "LOGGER_EXISTS",
            ErrorCode::CreateFailed => "CREATE_FAILED",
            ErrorCode::DispatchFailed => "DISPATCH_FAILED",
        }
    }
}

impl From<&WireError> for ErrorCode {
    fn from(e: &WireError) -> ErrorCode {
        match e {
            WireError::Io(_) => ErrorCode::DispatchFailed,
            WireError::BadMagic(_) => ErrorCode::InvalidMagic,
            WireError::BadVersion(_) => ErrorCode::InvalidVersion,
            WireError::BadCmd(_) | WireError::BadLength { .. } => ErrorCode::InvalidCmd,
        }
    }
}

/// What the daemon answers on each connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Err { code: ErrorCode, message: String },
}

impl Response {
    pub fn err(code: ErrorCode, message: impl Into<String>) -> Response {
        Response::Err {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok)
    }

    pub fn to_line(&self) -> String {
        match self {
            Response::Ok => "OK\n".into(),
            Response::Err { code, message } => {
                // The message must not break the one-line framing.
                let message = message.replace(['\n', '|'], " ");
                format!("ERR|{}|{}\n", code.as_str(), message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(frame: Frame) {
        let bytes = frame.encode();
        let decoded = Frame::read_from(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, frame);
        // and bitwise: re-encoding a decoded valid frame is identity
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn round_trip_every_command() {
        round_trip(Frame {
            pid: 42,
            payload: Payload::Create {
                config_path: "/etc/logx_cfg.toml".into(),
            },
        });
        round_trip(Frame {
            pid: 42,
            payload: Payload::Create {
                config_path: String::new(),
            },
        });
        round_trip(Frame {
            pid: 7,
            payload: Payload::Destroy,
        });
        round_trip(Frame {
            pid: 7,
            payload: Payload::RotateNow,
        });
        round_trip(Frame {
            pid: 1234,
            payload: Payload::Log {
                level: 3,
                line: 99,
                file_name: "main.rs".into(),
                message: "hello world".into(),
            },
        });
        round_trip(Frame {
            pid: 1234,
            payload: Payload::Cfg { key: 9, value: 50 },
        });
        round_trip(Frame {
            pid: 1,
            payload: Payload::Timer {
                action: 1,
                name: "t".into(),
            },
        });
    }

    #[test]
    fn header_layout_is_sixteen_bytes_little_endian() {
        let frame = Frame {
            pid: 0x0102_0304,
            payload: Payload::Destroy,
        };
        let bytes = frame.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[0..4], b"LOGX");
        assert_eq!(&bytes[4..6], &[1, 0]);
        assert_eq!(&bytes[6..8], &[2, 0]);
        assert_eq!(&bytes[8..12], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = Frame {
            pid: 1,
            payload: Payload::Destroy,
        }
        .encode();
        bytes[0] = b'X';
        match Frame::read_from(&mut bytes.as_slice()) {
            Err(WireError::BadMagic(_)) => (),
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn bad_version_rejected() {
        let mut bytes = Frame {
            pid: 1,
            payload: Payload::Destroy,
        }
        .encode();
        bytes[4] = 9;
        match Frame::read_from(&mut bytes.as_slice()) {
            Err(WireError::BadVersion(9)) => (),
            other => panic!("expected BadVersion, got {other:?}"),
        }
    }

    #[test]
    fn unknown_command_rejected() {
        let mut bytes = Frame {
            pid: 1,
            payload: Payload::Destroy,
        }
        .encode();
        bytes[6] = 0xee;
        assert!(matches!(
            Frame::read_from(&mut bytes.as_slice()),
            Err(WireError::BadCmd(0xee))
        ));
    }

    #[test]
    fn wrong_payload_length_rejected() {
        // a DESTROY claiming to carry bytes
        let mut bytes = Frame {
            pid: 1,
            payload: Payload::Destroy,
        }
        .encode();
        bytes[12] = 4;
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            Frame::read_from(&mut bytes.as_slice()),
            Err(WireError::BadLength { .. })
        ));
    }

    #[test]
    fn truncated_stream_is_an_io_error() {
        let bytes = Frame {
            pid: 1,
            payload: Payload::Cfg { key: 1, value: 1 },
        }
        .encode();
        // cut into the payload
        assert!(matches!(
            Frame::read_from(&mut bytes[..HEADER_LEN + 3].as_ref()),
            Err(WireError::Io(_))
        ));
    }

    #[test]
    fn over_long_strings_are_cut_nul_terminated() {
        let frame = Frame {
            pid: 1,
            payload: Payload::Timer {
                action: 1,
                name: "n".repeat(TIMER_NAME_MAX * 2),
            },
        };
        let decoded = Frame::read_from(&mut frame.encode().as_slice()).unwrap();
        match decoded.payload {
            Payload::Timer { name, .. } => assert_eq!(name.len(), TIMER_NAME_MAX - 1),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn response_lines() {
        assert_eq!(Response::Ok.to_line(), "OK\n");
        assert_eq!(
            Response::err(ErrorCode::LoggerNotFound, "no logger for pid 5").to_line(),
            "ERR|LOGGER_NOT_FOUND|no logger for pid 5\n"
        );
        // framing characters in messages are defused
        assert_eq!(
            Response::err(ErrorCode::DispatchFailed, "a|b\nc").to_line(),
            "ERR|DISPATCH_FAILED|a b c\n"
        );
    }
}
