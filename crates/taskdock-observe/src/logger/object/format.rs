use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::logger::error::LoggerError;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoggerFormat {
    /// Human readable lines, colored on terminals.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
    /// systemd-journald (Linux only).
    Journald,
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "journald" | "journal" if cfg!(target_os = "linux") => Ok(Self::Journald),
            "journald" | "journal" => Err(LoggerError::JournaldNotSupported),
            _ => Err(LoggerError::InvalidFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for LoggerFormat {
    type Error = LoggerError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LoggerFormat> for String {
    fn from(f: LoggerFormat) -> Self {
        f.to_string()
    }
}

impl fmt::Display for LoggerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoggerFormat::Text => "text",
            LoggerFormat::Json => "json",
            LoggerFormat::Journald => "journald",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("TEXT".parse::<LoggerFormat>().unwrap(), LoggerFormat::Text);
        assert_eq!(" Json ".parse::<LoggerFormat>().unwrap(), LoggerFormat::Json);
        assert_eq!("plain".parse::<LoggerFormat>().unwrap(), LoggerFormat::Text);
    }

    #[test]
    fn rejects_unknown() {
        for bad in ["", "xml", "logfmt", "text-json"] {
            assert!(bad.parse::<LoggerFormat>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn journald_on_linux() {
        let parsed: LoggerFormat = serde_json::from_str(r#""journal""#).unwrap();
        assert_eq!(parsed, LoggerFormat::Journald);
    }

    #[test]
    fn serializes_canonical_name() {
        assert_eq!(serde_json::to_string(&LoggerFormat::Json).unwrap(), r#""json""#);
        let back: LoggerFormat = serde_json::from_str(r#""Text""#).unwrap();
        assert_eq!(back, LoggerFormat::Text);
    }
}
