use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, anyhow};

use taskdock_api::{DEFAULT_DISPATCH_TIMEOUT, DEFAULT_SOURCE_ROOT};
use taskdock_core::RouterConfig;
use taskdock_exec::PipelineConfig;
use taskdock_model::{ProbePolicy, RedisConfig};
use taskdock_observe::LoggerConfig;

const DEFAULT_BIND: ([u8; 4], u16) = ([0, 0, 0, 0], 8000);

/// Daemon settings, read from `TASKDOCK_*`, `REDIS_*` and `TASKDOCK_LOG_*`.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub bind: SocketAddr,
    pub logger: LoggerConfig,
    pub redis: RedisConfig,
    pub pipeline: PipelineConfig,
    pub router: RouterConfig,
    pub dispatch_timeout: Duration,
    pub source_root: PathBuf,
    pub metrics: bool,
}

impl AgentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind = parse("TASKDOCK_BIND", get("TASKDOCK_BIND"))?
            .unwrap_or_else(|| SocketAddr::from(DEFAULT_BIND));

        let mut pipeline = PipelineConfig::default();
        if let Some(root) = get("TASKDOCK_WORK_ROOT") {
            pipeline.work_root = PathBuf::from(root);
        }
        if let Some(binary) = get("TASKDOCK_RUNTIME") {
            pipeline.runtime_binary = binary;
        }
        if let Some(prefix) = get("TASKDOCK_IMAGE_PREFIX") {
            pipeline.image_prefix = prefix;
        }
        if let Some(ms) = parse("TASKDOCK_BUILD_TIMEOUT_MS", get("TASKDOCK_BUILD_TIMEOUT_MS"))?
        {
            pipeline.build_timeout_ms = ms;
        }
        if let Some(ms) = parse("TASKDOCK_LAUNCH_TIMEOUT_MS", get("TASKDOCK_LAUNCH_TIMEOUT_MS"))?
        {
            pipeline.launch_timeout_ms = ms;
        }
        if let Some(restart) = parse("TASKDOCK_RESTART", get("TASKDOCK_RESTART"))? {
            pipeline.restart = restart;
        }
        let attempts = parse::<u32>("TASKDOCK_PROBE_ATTEMPTS", get("TASKDOCK_PROBE_ATTEMPTS"))?;
        if let Some(attempts) = attempts {
            let interval =
                parse("TASKDOCK_PROBE_INTERVAL_MS", get("TASKDOCK_PROBE_INTERVAL_MS"))?
                    .unwrap_or(1_000);
            pipeline.probe = match attempts {
                0 | 1 => ProbePolicy::single(),
                n => ProbePolicy::bounded(n, interval),
            };
        }

        let mut router = RouterConfig::default();
        if let Some(ns) = lookup("TASKDOCK_NAMESPACE") {
            // Empty means "no namespace", so this one is not filtered.
            router.namespace = ns.trim().to_string();
        }
        if let Some(queue) = get("TASKDOCK_DEFAULT_QUEUE") {
            router.default_queue = queue;
        }

        let dispatch_timeout =
            parse("TASKDOCK_DISPATCH_TIMEOUT_MS", get("TASKDOCK_DISPATCH_TIMEOUT_MS"))?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DISPATCH_TIMEOUT);
        if dispatch_timeout.is_zero() {
            return Err(anyhow!("TASKDOCK_DISPATCH_TIMEOUT_MS must be positive"));
        }

        let metrics = match get("TASKDOCK_METRICS").as_deref() {
            None | Some("1" | "true" | "on" | "yes") => true,
            Some("0" | "false" | "off" | "no") => false,
            Some(other) => {
                return Err(anyhow!("TASKDOCK_METRICS: expected a switch, got '{other}'"));
            }
        };

        Ok(Self {
            bind,
            logger: LoggerConfig::from_lookup(&lookup).context("logger settings")?,
            redis: RedisConfig::from_lookup(&lookup).context("redis settings")?,
            pipeline,
            router,
            dispatch_timeout,
            source_root: get("TASKDOCK_SOURCE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_ROOT)),
            metrics,
        })
    }
}

fn parse<T>(key: &str, raw: Option<String>) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|v| v.parse::<T>().map_err(|e| anyhow!("{key}: invalid value '{v}': {e}")))
        .transpose()
}
