//! Logger configuration: defaults, config files (TOML or JSON) and
//! `LOGX_*` environment overrides. A `Config` is copied into the
//! logger at creation; afterwards only the logger mutates its copy,
//! under its own lock.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;

use crate::level::Level;

pub const DEFAULT_NAME: &str = "logx";
pub const DEFAULT_FILE_PATH: &str = "./logx.log";
pub const DEFAULT_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ROTATE_MAX_BACKUPS: u32 = 3;
pub const DEFAULT_ROTATE_INTERVAL_DAYS: u32 = 1;
pub const DEFAULT_BANNER_PATTERN: &str = "=";

/// Config files searched for (in this order) when a logger is created
/// without an explicit configuration.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["./logx_cfg.toml", "./logx_cfg.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateKind {
    None,
    BySize,
    ByDate,
}

impl RotateKind {
    pub fn from_u32(v: u32) -> Option<RotateKind> {
        match v {
            0 => Some(RotateKind::None),
            1 => Some(RotateKind::BySize),
            2 => Some(RotateKind::ByDate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RotateKind::None => "NONE",
            RotateKind::BySize => "BY_SIZE",
            RotateKind::ByDate => "BY_DATE",
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("not a rotation type: {0:?} (expected NONE, BY_SIZE or BY_DATE)")]
pub struct ParseRotateKindError(pub String);

impl FromStr for RotateKind {
    type Err = ParseRotateKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(RotateKind::None),
            "BY_SIZE" => Ok(RotateKind::BySize),
            "BY_DATE" => Ok(RotateKind::ByDate),
            _ => Err(ParseRotateKindError(s.into())),
        }
    }
}

/// Rotation policy. The size threshold is kept in bytes only;
/// megabyte-denominated inputs (config files, env, wire, CLI) are
/// converted once, at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotateConfig {
    pub kind: RotateKind,
    pub size_bytes: u64,
    /// 0 means: no backups, the live file is truncated instead.
    pub max_backups: u32,
    pub interval_days: u32,
}

impl Default for RotateConfig {
    fn default() -> Self {
        RotateConfig {
            kind: RotateKind::BySize,
            size_bytes: DEFAULT_ROTATE_SIZE_BYTES,
            max_backups: DEFAULT_ROTATE_MAX_BACKUPS,
            interval_days: DEFAULT_ROTATE_INTERVAL_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Logical name, shown in the configuration dump.
    pub name: String,
    /// `None` disables file logging regardless of the flag below.
    pub file_path: Option<PathBuf>,
    pub console_level: Level,
    pub file_level: Level,
    pub console_logging: bool,
    pub file_logging: bool,
    pub colored_logging: bool,
    /// When set, colors are suppressed on sinks that are not a tty.
    pub tty_detection: bool,
    pub rotate: RotateConfig,
    pub banner_pattern: String,
    /// Dump the effective configuration to stderr on creation.
    pub print_config: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            name: DEFAULT_NAME.into(),
            file_path: Some(DEFAULT_FILE_PATH.into()),
            console_level: Level::Trace,
            file_level: Level::Trace,
            console_logging: true,
            file_logging: true,
            colored_logging: true,
            tty_detection: true,
            rotate: RotateConfig::default(),
            banner_pattern: DEFAULT_BANNER_PATTERN.into(),
            print_config: true,
        }
    }
}

/// What a config file may contain; every key optional, unknown keys
/// rejected by serde. Levels and the rotation type are spelled as
/// strings (`"INFO"`, `"BY_DATE"`).
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    name: Option<String>,
    file_path: Option<String>,
    console_level: Option<String>,
    file_level: Option<String>,
    console_logging: Option<bool>,
    file_logging: Option<bool>,
    colored_logging: Option<bool>,
    tty_detection: Option<bool>,
    rotate_type: Option<String>,
    rotate_size_mb: Option<u64>,
    rotate_max_backups: Option<u32>,
    rotate_interval_days: Option<u32>,
    banner_pattern: Option<String>,
    print_config: Option<bool>,
}

fn parse_or_default<T, E>(what: &str, value: Option<&str>, default: T) -> T
where
    T: FromStr<Err = E>,
    E: std::fmt::Display,
{
    match value {
        None => default,
        Some(s) => match s.parse() {
            Ok(v) => v,
            Err(e) => {
                eprintln!("[logx] invalid {what}: {e}; using default");
                default
            }
        },
    }
}

impl RawConfig {
    /// Lay the file's keys over the defaults. A key with an invalid
    /// value gets a stderr diagnostic and keeps the default.
    fn into_config(self) -> Config {
        let mut cfg = Config::default();
        if let Some(name) = self.name {
            cfg.name = name;
        }
        if let Some(path) = self.file_path {
            cfg.file_path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        cfg.console_level = parse_or_default(
            "console_level",
            self.console_level.as_deref(),
            cfg.console_level,
        );
        cfg.file_level = parse_or_default("file_level", self.file_level.as_deref(), cfg.file_level);
        if let Some(v) = self.console_logging {
            cfg.console_logging = v;
        }
        if let Some(v) = self.file_logging {
            cfg.file_logging = v;
        }
        if let Some(v) = self.colored_logging {
            cfg.colored_logging = v;
        }
        if let Some(v) = self.tty_detection {
            cfg.tty_detection = v;
        }
        cfg.rotate.kind =
            parse_or_default("rotate_type", self.rotate_type.as_deref(), cfg.rotate.kind);
        if let Some(mb) = self.rotate_size_mb {
            if mb > 0 {
                cfg.rotate.size_bytes = mb * 1024 * 1024;
            } else {
                eprintln!("[logx] invalid rotate_size_mb: 0; using default");
            }
        }
        if let Some(n) = self.rotate_max_backups {
            cfg.rotate.max_backups = n;
        }
        if let Some(days) = self.rotate_interval_days {
            if days > 0 {
                cfg.rotate.interval_days = days;
            } else {
                eprintln!("[logx] invalid rotate_interval_days: 0; using default");
            }
        }
        if let Some(pattern) = self.banner_pattern {
            if pattern.is_empty() {
                eprintln!("[logx] empty banner_pattern; using default");
            } else {
                cfg.banner_pattern = pattern;
            }
        }
        if let Some(v) = self.print_config {
            cfg.print_config = v;
        }
        cfg
    }
}

impl Config {
    /// Parse a configuration file, picking the format by extension
    /// (`.toml` or `.json`).
    pub fn load_file(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| anyhow!("reading config file {path:?}"))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let raw: RawConfig = match ext {
            "toml" => {
                toml::from_str(&text).with_context(|| anyhow!("parsing TOML config {path:?}"))?
            }
            "json" => serde_json::from_str(&text)
                .with_context(|| anyhow!("parsing JSON config {path:?}"))?,
            _ => bail!("config file {path:?} is neither .toml nor .json"),
        };
        Ok(raw.into_config())
    }

    /// What `Logger::create(None)` uses: the first default config file
    /// that exists, else built-in defaults, with `LOGX_*` environment
    /// overrides applied on top.
    pub fn load() -> Config {
        let mut cfg = None;
        for candidate in DEFAULT_CONFIG_FILES {
            let path = Path::new(candidate);
            if path.exists() {
                eprintln!("[logx] found logger configuration file: {candidate}");
                match Config::load_file(path) {
                    Ok(c) => cfg = Some(c),
                    Err(e) => eprintln!("[logx] {e:#}; using defaults"),
                }
                break;
            }
        }
        let mut cfg = cfg.unwrap_or_default();
        cfg.apply_env_overrides();
        cfg
    }

    /// Apply the `LOGX_*` environment variables on top of `self`.
    /// Booleans accept `1`/`0`/`true`/`false`.
    pub fn apply_env_overrides(&mut self) {
        fn env(name: &str) -> Option<String> {
            std::env::var(name).ok()
        }
        fn env_bool(name: &str) -> Option<bool> {
            let v = env(name)?;
            match v.to_ascii_lowercase().as_str() {
                "1" | "true" => Some(true),
                "0" | "false" => Some(false),
                _ => {
                    eprintln!("[logx] invalid boolean in {name}: {v:?}; ignored");
                    None
                }
            }
        }
        fn env_parse<T: FromStr>(name: &str) -> Option<T> {
            let v = env(name)?;
            match v.parse() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    eprintln!("[logx] invalid value in {name}: {v:?}; ignored");
                    None
                }
            }
        }

        if let Some(name) = env("LOGX_NAME") {
            self.name = name;
        }
        if let Some(path) = env("LOGX_FILE_PATH") {
            self.file_path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Some(v) = env_bool("LOGX_ENABLE_CONSOLE_LOGGING") {
            self.console_logging = v;
        }
        if let Some(level) = env_parse("LOGX_CONSOLE_LEVEL") {
            self.console_level = level;
        }
        if let Some(v) = env_bool("LOGX_ENABLE_FILE_LOGGING") {
            self.file_logging = v;
        }
        if let Some(level) = env_parse("LOGX_FILE_LEVEL") {
            self.file_level = level;
        }
        if let Some(v) = env_bool("LOGX_ENABLE_COLORED_LOGGING") {
            self.colored_logging = v;
        }
        if let Some(v) = env_bool("LOGX_USE_TTY_DETECTION") {
            self.tty_detection = v;
        }
        if let Some(v) = env_bool("LOGX_PRINT_CONFIG") {
            self.print_config = v;
        }
        if let Some(kind) = env_parse("LOGX_ROTATE_TYPE") {
            self.rotate.kind = kind;
        }
        if let Some(mb) = env_parse::<u64>("LOGX_ROTATE_SIZE_MB") {
            if mb > 0 {
                self.rotate.size_bytes = mb * 1024 * 1024;
            }
        }
        if let Some(n) = env_parse("LOGX_ROTATE_MAX_BACKUPS") {
            self.rotate.max_backups = n;
        }
        if let Some(days) = env_parse::<u32>("LOGX_ROTATE_INTERVAL_DAYS") {
            if days > 0 {
                self.rotate.interval_days = days;
            }
        }
        if let Some(pattern) = env("LOGX_BANNER_PATTERN") {
            if !pattern.is_empty() {
                self.banner_pattern = pattern;
            }
        }
    }

    fn enabled(v: bool) -> &'static str {
        if v {
            "Enabled"
        } else {
            "Disabled"
        }
    }

    /// Dump the effective configuration to stderr (the diagnostic side
    /// channel; the logger cannot log through itself).
    pub fn dump(&self) {
        let path = self
            .file_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".into());
        eprintln!("[logx] ==========================================");
        eprintln!("[logx] Logger configuration details");
        eprintln!("[logx] Name                     : {}", self.name);
        eprintln!("[logx] File Path                : {path}");
        eprintln!("[logx] Console Log Level        : {}", self.console_level);
        eprintln!("[logx] File Log Level           : {}", self.file_level);
        eprintln!(
            "[logx] Console Logging          : {}",
            Self::enabled(self.console_logging)
        );
        eprintln!(
            "[logx] File Logging             : {}",
            Self::enabled(self.file_logging)
        );
        eprintln!(
            "[logx] Colored Logs             : {}",
            Self::enabled(self.colored_logging)
        );
        eprintln!(
            "[logx] TTY Detection            : {}",
            Self::enabled(self.tty_detection)
        );
        eprintln!(
            "[logx] Log Rotate Type          : {}",
            self.rotate.kind.as_str()
        );
        eprintln!(
            "[logx] Max Log Size             : {} MB",
            self.rotate.size_bytes / (1024 * 1024)
        );
        eprintln!("[logx] Max Backups              : {}", self.rotate.max_backups);
        eprintln!(
            "[logx] Rotation Interval (Days) : {}",
            self.rotate.interval_days
        );
        eprintln!(
            "[logx] Print Config             : {}",
            Self::enabled(self.print_config)
        );
        eprintln!("[logx] ==========================================");
    }
}
