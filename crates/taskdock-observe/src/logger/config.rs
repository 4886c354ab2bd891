use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::{
    error::{LoggerError, LoggerResult},
    object::{LoggerFormat, LoggerLevel, LoggerTimeZone},
};

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` expression, e.g. `info` or `taskdock_exec=debug,info`.
    pub level: LoggerLevel,
    pub tz: LoggerTimeZone,
    /// Print event targets (module paths).
    pub with_targets: bool,
    /// Colored text output; only honored when stdout is a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::default(),
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Read `TASKDOCK_LOG_{FORMAT,LEVEL,TZ,TARGETS,COLOR}` from the process environment.
    pub fn from_env() -> LoggerResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Like [`LoggerConfig::from_env`] with a custom variable source; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> LoggerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup("TASKDOCK_LOG_FORMAT") {
            cfg.format = v.parse()?;
        }
        if let Some(v) = lookup("TASKDOCK_LOG_LEVEL") {
            cfg.level = v.parse()?;
        }
        if let Some(v) = lookup("TASKDOCK_LOG_TZ") {
            cfg.tz = v.parse()?;
        }
        if let Some(v) = lookup("TASKDOCK_LOG_TARGETS") {
            cfg.with_targets = parse_switch("TASKDOCK_LOG_TARGETS", &v)?;
        }
        if let Some(v) = lookup("TASKDOCK_LOG_COLOR") {
            cfg.use_color = parse_switch("TASKDOCK_LOG_COLOR", &v)?;
        }
        Ok(cfg)
    }

    /// Whether ANSI colors should actually be emitted right now.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}

fn parse_switch(key: &'static str, raw: &str) -> LoggerResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LoggerError::InvalidSetting {
            key,
            value: raw.to_string(),
        }),
    }
}
