mod config;
mod error;
mod log;
mod object;

#[cfg(feature = "timezone-sync")]
mod sync;

pub use config::LoggerConfig;
pub use error::{LoggerError, LoggerResult};
pub use object::{LogTimer, LoggerFormat, LoggerLevel, LoggerTimeZone, init_local_offset};

#[cfg(feature = "timezone-sync")]
pub use sync::{TZ_SYNC_INTERVAL, spawn_timezone_sync};

/// Install the global tracing subscriber described by `cfg`.
///
/// With [`LoggerTimeZone::Local`], call [`init_local_offset`] first, while the process
/// is still single-threaded; offset detection fails once other threads exist.
///
/// ```rust
/// use taskdock_observe::{LoggerConfig, init_logger};
///
/// init_logger(&LoggerConfig::default()).expect("logger");
/// tracing::info!("ready");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    match cfg.format {
        LoggerFormat::Text => log::install_text(cfg),
        LoggerFormat::Json => log::install_json(cfg),
        LoggerFormat::Journald => log::install_journald(cfg),
    }
}
