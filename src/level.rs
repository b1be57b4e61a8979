use std::fmt;
use std::str::FromStr;

/// Log levels, ordered by severity. `Banner` sits between `Debug` and
/// `Info` so that decorative frames survive a DEBUG-suppressing
/// threshold but are dropped along with the chatter below INFO-only
/// setups that raise the bar further. `Off` is a threshold value only,
/// never a record level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Banner = 2,
    Info = 3,
    Warn = 4,
    Error = 5,
    Fatal = 6,
    Off = 7,
}

impl Level {
    /// The three-letter tag that goes into the record header.
    pub fn tag(self) -> &'static str {
        match self {
            Level::Trace => "TRC",
            Level::Debug => "DBG",
            Level::Banner => "BNR",
            Level::Info => "INF",
            Level::Warn => "WRN",
            Level::Error => "ERR",
            Level::Fatal => "FTL",
            Level::Off => "OFF",
        }
    }

    /// Wire and config-file representation.
    pub fn from_u32(v: u32) -> Option<Level> {
        match v {
            0 => Some(Level::Trace),
            1 => Some(Level::Debug),
            2 => Some(Level::Banner),
            3 => Some(Level::Info),
            4 => Some(Level::Warn),
            5 => Some(Level::Error),
            6 => Some(Level::Fatal),
            7 => Some(Level::Off),
            _ => None,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Banner => "BANNER",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Off => "OFF",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
#[error("not a log level: {0:?} (expected TRACE, DEBUG, BANNER, INFO, WARN, ERROR, FATAL or OFF)")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "BANNER" => Ok(Level::Banner),
            "INFO" => Ok(Level::Info),
            "WARN" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            "FATAL" => Ok(Level::Fatal),
            "OFF" => Ok(Level::Off),
            _ => Err(ParseLevelError(s.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Banner);
        assert!(Level::Banner < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Fatal);
        assert!(Level::Fatal < Level::Off);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("warn".parse::<Level>().unwrap(), Level::Warn);
        assert_eq!("Banner".parse::<Level>().unwrap(), Level::Banner);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn wire_round_trip() {
        for v in 0..=7 {
            let level = Level::from_u32(v).unwrap();
            assert_eq!(level as u32, v);
        }
        assert!(Level::from_u32(8).is_none());
    }

    #[test]
    fn tags_are_three_letters() {
        for v in 0..=7 {
            assert_eq!(Level::from_u32(v).unwrap().tag().len(), 3);
        }
    }
}
