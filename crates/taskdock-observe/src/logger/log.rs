use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::logger::{
    config::LoggerConfig,
    error::{LoggerError, LoggerResult},
    object::LogTimer,
};

pub(crate) fn install_text(cfg: &LoggerConfig) -> LoggerResult<()> {
    let layer = fmt::layer()
        .with_ansi(cfg.should_use_color())
        .with_target(cfg.with_targets)
        .with_timer(LogTimer::new(cfg.tz));
    install(
        tracing_subscriber::registry()
            .with(cfg.level.to_env_filter())
            .with(layer),
    )
}

pub(crate) fn install_json(cfg: &LoggerConfig) -> LoggerResult<()> {
    let layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_current_span(true)
        .with_target(cfg.with_targets)
        .with_timer(LogTimer::new(cfg.tz));
    install(
        tracing_subscriber::registry()
            .with(cfg.level.to_env_filter())
            .with(layer),
    )
}

#[cfg(target_os = "linux")]
pub(crate) fn install_journald(cfg: &LoggerConfig) -> LoggerResult<()> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::JournaldInitFailed(e.to_string()))?
        .with_syslog_identifier("taskdock".to_string());
    install(
        tracing_subscriber::registry()
            .with(cfg.level.to_env_filter())
            .with(layer),
    )
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn install_journald(_cfg: &LoggerConfig) -> LoggerResult<()> {
    Err(LoggerError::JournaldNotSupported)
}

fn install<S>(subscriber: S) -> LoggerResult<()>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        let cfg = LoggerConfig {
            use_color: false,
            ..Default::default()
        };
        let first = install_text(&cfg);
        let second = install_json(&cfg);
        assert!(first.is_ok() || matches!(first, Err(LoggerError::AlreadyInitialized)));
        assert!(matches!(second, Err(LoggerError::AlreadyInitialized)));
    }
}
