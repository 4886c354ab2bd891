use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    Env,
    error::{ModelError, ModelResult},
};

/// Connection settings for the shared Redis instance.
///
/// One server hosts three logical databases: the task registry, the broker queues
/// and the result backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub registry_db: u32,
    pub broker_db: u32,
    pub backend_db: u32,
    /// Host workers use to reach Redis when it differs from `host`
    /// (e.g. `host.docker.internal`).
    pub worker_host: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            registry_db: 0,
            broker_db: 0,
            backend_db: 1,
            worker_host: None,
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("registry_db", &self.registry_db)
            .field("broker_db", &self.broker_db)
            .field("backend_db", &self.backend_db)
            .field("worker_host", &self.worker_host)
            .finish()
    }
}

impl RedisConfig {
    /// Read settings from the process environment.
    ///
    /// Variables: `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`,
    /// `REDIS_BROKER_DB`, `REDIS_BACKEND_DB`, `REDIS_WORKER_HOST`.
    pub fn from_env() -> ModelResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RedisConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> ModelResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("REDIS_HOST") {
            cfg.host = host;
        }
        if let Some(port) = get("REDIS_PORT") {
            cfg.port = parse_num("REDIS_PORT", &port)?;
        }
        cfg.password = get("REDIS_PASSWORD");
        if let Some(db) = get("REDIS_DB") {
            cfg.registry_db = parse_num("REDIS_DB", &db)?;
        }
        if let Some(db) = get("REDIS_BROKER_DB") {
            cfg.broker_db = parse_num("REDIS_BROKER_DB", &db)?;
        }
        if let Some(db) = get("REDIS_BACKEND_DB") {
            cfg.backend_db = parse_num("REDIS_BACKEND_DB", &db)?;
        }
        cfg.worker_host = get("REDIS_WORKER_HOST");
        Ok(cfg)
    }

    /// `redis://[:password@]host:port/db` with the password percent-encoded.
    pub fn url(&self, db: u32) -> String {
        match &self.password {
            Some(pw) => format!(
                "redis://:{}@{}:{}/{}",
                urlencoding::encode(pw),
                self.host,
                self.port,
                db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, db),
        }
    }

    pub fn registry_url(&self) -> String {
        self.url(self.registry_db)
    }

    pub fn broker_url(&self) -> String {
        self.url(self.broker_db)
    }

    pub fn backend_url(&self) -> String {
        self.url(self.backend_db)
    }

    /// Environment a deployed worker needs to reach the broker and result backend.
    pub fn worker_env(&self) -> Env {
        Env::new()
            .with(
                "REDIS_HOST",
                self.worker_host.as_deref().unwrap_or(&self.host),
            )
            .with("REDIS_PORT", self.port.to_string())
            .with("REDIS_PASSWORD", self.password.clone().unwrap_or_default())
            .with("REDIS_BROKER_DB", self.broker_db.to_string())
            .with("REDIS_BACKEND_DB", self.backend_db.to_string())
            .with("C_FORCE_ROOT", "1")
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> ModelResult<T> {
    raw.parse::<T>()
        .map_err(|_| ModelError::InvalidConfig(format!("{key}: not a number: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = RedisConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.broker_url(), "redis://localhost:6379/0");
        assert_eq!(cfg.backend_url(), "redis://localhost:6379/1");
    }

    #[test]
    fn password_is_percent_encoded() {
        let cfg = RedisConfig::from_lookup(lookup(&[
            ("REDIS_HOST", "redis"),
            ("REDIS_PASSWORD", "p@ss/word"),
            ("REDIS_BACKEND_DB", "2"),
        ]))
        .unwrap();

        assert_eq!(cfg.backend_url(), "redis://:p%40ss%2Fword@redis:6379/2");
    }

    #[test]
    fn bad_port_is_reported() {
        let err = RedisConfig::from_lookup(lookup(&[("REDIS_PORT", "sixty")])).unwrap_err();
        assert!(err.to_string().contains("REDIS_PORT"), "got: {err}");
    }

    #[test]
    fn worker_env_prefers_worker_host() {
        let cfg = RedisConfig::from_lookup(lookup(&[
            ("REDIS_HOST", "127.0.0.1"),
            ("REDIS_WORKER_HOST", "host.docker.internal"),
        ]))
        .unwrap();
        let env = cfg.worker_env();

        assert_eq!(env.get("REDIS_HOST"), Some("host.docker.internal"));
        assert_eq!(env.get("REDIS_BROKER_DB"), Some("0"));
        assert_eq!(env.get("REDIS_BACKEND_DB"), Some("1"));
        assert_eq!(env.get("C_FORCE_ROOT"), Some("1"));
    }

    #[test]
    fn debug_hides_password() {
        let cfg = RedisConfig {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{cfg:?}").contains("hunter2"));
    }
}
