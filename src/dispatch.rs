//! Routing of one decoded frame to the registry and the owning
//! client's logger.

use std::path::Path;

use crate::config::{Config, RotateKind};
use crate::ipc::{CfgKey, ErrorCode, Frame, Payload, Response, TimerAction};
use crate::level::Level;
use crate::session::{CreateError, SessionRegistry};

pub fn dispatch(registry: &SessionRegistry, frame: Frame) -> Response {
    let pid = frame.pid;
    match frame.payload {
        Payload::Create { config_path } => {
            let cfg = if config_path.is_empty() {
                None
            } else {
                match Config::load_file(Path::new(&config_path)) {
                    Ok(cfg) => Some(cfg),
                    Err(e) => {
                        return Response::err(ErrorCode::CreateFailed, format!("{e:#}"));
                    }
                }
            };
            match registry.create(pid, cfg) {
                Ok(()) => Response::Ok,
                Err(CreateError::Exists) => {
                    Response::err(ErrorCode::LoggerExists, format!("logger exists for pid {pid}"))
                }
            }
        }

        Payload::Destroy => {
            if registry.destroy(pid) {
                Response::Ok
            } else {
                Response::err(ErrorCode::LoggerNotFound, format!("no logger for pid {pid}"))
            }
        }

        Payload::Log {
            level,
            line,
            file_name,
            message,
        } => {
            let Some(logger) = registry.find(pid) else {
                return Response::err(ErrorCode::LoggerNotFound, format!("no logger for pid {pid}"));
            };
            let level = match Level::from_u32(level) {
                // OFF is a threshold, not a loggable level
                Some(Level::Off) | None => {
                    return Response::err(ErrorCode::InvalidLevel, format!("invalid level {level}"));
                }
                Some(level) => level,
            };
            logger.log(level, &file_name, "", line, format_args!("{message}"));
            Response::Ok
        }

        Payload::Cfg { key, value } => {
            let Some(logger) = registry.find(pid) else {
                return Response::err(ErrorCode::LoggerNotFound, format!("no logger for pid {pid}"));
            };
            let Some(key) = CfgKey::from_u32(key) else {
                return Response::err(ErrorCode::InvalidConfig, format!("unknown cfg key {key}"));
            };
            apply_cfg(&logger, key, value)
        }

        Payload::RotateNow => {
            let Some(logger) = registry.find(pid) else {
                return Response::err(ErrorCode::LoggerNotFound, format!("no logger for pid {pid}"));
            };
            match logger.rotate_now() {
                Ok(()) => Response::Ok,
                Err(e) => Response::err(ErrorCode::DispatchFailed, format!("rotation failed: {e}")),
            }
        }

        Payload::Timer { action, name } => {
            let Some(logger) = registry.find(pid) else {
                return Response::err(ErrorCode::LoggerNotFound, format!("no logger for pid {pid}"));
            };
            let Some(action) = TimerAction::from_u32(action) else {
                return Response::err(ErrorCode::InvalidCmd, format!("unknown timer action {action}"));
            };
            match action {
                TimerAction::Start => logger.timer_start(&name),
                TimerAction::Stop => logger.timer_stop(&name),
                TimerAction::Pause => logger.timer_pause(&name),
                TimerAction::Resume => logger.timer_resume(&name),
            }
            Response::Ok
        }
    }
}

fn apply_cfg(logger: &crate::logger::Logger, key: CfgKey, value: u32) -> Response {
    let as_level = |value: u32| match Level::from_u32(value) {
        Some(level) => Ok(level),
        None => Err(Response::err(
            ErrorCode::InvalidLevel,
            format!("invalid level {value}"),
        )),
    };
    let enabled = value != 0;
    match key {
        CfgKey::ConsoleLogging => {
            if enabled {
                logger.enable_console_logging();
            } else {
                logger.disable_console_logging();
            }
        }
        CfgKey::FileLogging => {
            if enabled {
                logger.enable_file_logging();
            } else {
                logger.disable_file_logging();
            }
        }
        CfgKey::ConsoleLevel => match as_level(value) {
            Ok(level) => logger.set_console_level(level),
            Err(resp) => return resp,
        },
        CfgKey::FileLevel => match as_level(value) {
            Ok(level) => logger.set_file_level(level),
            Err(resp) => return resp,
        },
        CfgKey::ColoredLogging => {
            if enabled {
                logger.enable_colored_logging();
            } else {
                logger.disable_colored_logging();
            }
        }
        CfgKey::TtyDetection => {
            if enabled {
                logger.enable_tty_detection();
            } else {
                logger.disable_tty_detection();
            }
        }
        CfgKey::PrintConfig => {
            if enabled {
                logger.enable_print_config();
            } else {
                logger.disable_print_config();
            }
        }
        CfgKey::RotateType => match RotateKind::from_u32(value) {
            Some(kind) => logger.set_rotate_kind(kind),
            None => {
                return Response::err(
                    ErrorCode::InvalidConfig,
                    format!("invalid rotate type {value}"),
                );
            }
        },
        CfgKey::SizeMb => logger.set_size_mb(value as u64),
        CfgKey::IntervalDays => logger.set_rotation_interval_days(value),
        CfgKey::MaxBackups => logger.set_max_backups(value),
    }
    Response::Ok
}
