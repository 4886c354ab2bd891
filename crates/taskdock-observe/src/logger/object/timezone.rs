use std::{
    fmt,
    str::FromStr,
    sync::{OnceLock, RwLock},
};

use serde::{Deserialize, Serialize};
use time::UtcOffset;
use tracing::debug;

use crate::logger::error::LoggerError;

/// Cached local offset; detection only works while the process is single-threaded.
static LOCAL_OFFSET: RwLock<UtcOffset> = RwLock::new(UtcOffset::UTC);
static DETECTED: OnceLock<()> = OnceLock::new();

/// Timezone of log timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoggerTimeZone {
    #[default]
    Utc,
    Local,
}

impl FromStr for LoggerTimeZone {
    type Err = LoggerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utc" | "z" => Ok(Self::Utc),
            "local" => Ok(Self::Local),
            _ => Err(LoggerError::InvalidTimeZone(s.to_string())),
        }
    }
}

impl TryFrom<String> for LoggerTimeZone {
    type Error = LoggerError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LoggerTimeZone> for String {
    fn from(tz: LoggerTimeZone) -> Self {
        tz.to_string()
    }
}

impl fmt::Display for LoggerTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoggerTimeZone::Utc => "utc",
            LoggerTimeZone::Local => "local",
        })
    }
}

/// Detect and cache the local offset. Call from `main` before starting the tokio
/// runtime; falls back to UTC when detection is impossible.
pub fn init_local_offset() {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    store(offset);
    let _ = DETECTED.set(());
}

/// Re-detect the local offset. Returns whether the cached value changed.
#[cfg_attr(not(feature = "timezone-sync"), allow(dead_code))]
pub(crate) fn sync_local_offset() -> bool {
    let Ok(detected) = UtcOffset::current_local_offset() else {
        debug!("local offset re-detection unavailable, keeping cached value");
        return false;
    };
    let previous = cached();
    if previous == detected {
        return false;
    }
    store(detected);
    debug!(
        from = %format_offset(previous),
        to = %format_offset(detected),
        "local offset changed"
    );
    true
}

/// Offset to render timestamps with under `tz`.
pub(crate) fn offset_for(tz: LoggerTimeZone) -> UtcOffset {
    match tz {
        LoggerTimeZone::Utc => UtcOffset::UTC,
        LoggerTimeZone::Local => {
            DETECTED.get_or_init(|| {
                if let Ok(detected) = UtcOffset::current_local_offset() {
                    store(detected);
                }
            });
            cached()
        }
    }
}

fn cached() -> UtcOffset {
    LOCAL_OFFSET.read().map(|g| *g).unwrap_or(UtcOffset::UTC)
}

fn store(offset: UtcOffset) {
    if let Ok(mut g) = LOCAL_OFFSET.write() {
        *g = offset;
    }
}

/// `UTC±HH` or `UTC±HH:MM`.
pub(crate) fn format_offset(offset: UtcOffset) -> String {
    let (h, m, _) = offset.as_hms();
    let sign = if offset.is_negative() { '-' } else { '+' };
    if m == 0 {
        format!("UTC{sign}{:02}", h.abs())
    } else {
        format!("UTC{sign}{:02}:{:02}", h.abs(), m.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names() {
        assert_eq!("UTC".parse::<LoggerTimeZone>().unwrap(), LoggerTimeZone::Utc);
        assert_eq!("Local".parse::<LoggerTimeZone>().unwrap(), LoggerTimeZone::Local);
        assert!("pst".parse::<LoggerTimeZone>().is_err());
        assert!("".parse::<LoggerTimeZone>().is_err());
    }

    #[test]
    fn offsets_are_formatted() {
        assert_eq!(format_offset(UtcOffset::UTC), "UTC+00");
        assert_eq!(format_offset(UtcOffset::from_hms(5, 30, 0).unwrap()), "UTC+05:30");
        assert_eq!(format_offset(UtcOffset::from_hms(-3, 0, 0).unwrap()), "UTC-03");
        assert_eq!(format_offset(UtcOffset::from_hms(-9, -30, 0).unwrap()), "UTC-09:30");
    }

    #[test]
    fn utc_ignores_local_cache() {
        init_local_offset();
        assert_eq!(offset_for(LoggerTimeZone::Utc), UtcOffset::UTC);
        assert!(offset_for(LoggerTimeZone::Local).whole_hours().abs() <= 14);
    }
}
