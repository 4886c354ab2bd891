mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use taskdock_api::{HttpApi, ServiceAdapter};
use taskdock_core::{DispatchRouter, MetricsHandle, TaskRegistry, noop_metrics};
use taskdock_exec::{CliRuntime, DeploymentPipeline};
use taskdock_observe::{TZ_SYNC_INTERVAL, init_local_offset, init_logger, spawn_timezone_sync};
use taskdock_prometheus::PrometheusMetrics;
use taskdock_redis::{CeleryBroker, RedisStore};

use crate::config::AgentConfig;

fn main() -> anyhow::Result<()> {
    // Offset detection is only sound while the process is single-threaded.
    init_local_offset();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?
        .block_on(run())
}

async fn run() -> anyhow::Result<()> {
    // 1) config + logger
    let cfg = AgentConfig::from_env()?;
    init_logger(&cfg.logger)?;
    info!(bind = %cfg.bind, runtime = %cfg.pipeline.runtime_binary, "logger initialized");

    let cancel = CancellationToken::new();
    let tz_sync = spawn_timezone_sync(TZ_SYNC_INTERVAL, cancel.clone());

    // 2) metrics
    let prometheus = match cfg.metrics {
        true => Some(Arc::new(PrometheusMetrics::new().context("registering metrics")?)),
        false => None,
    };
    let metrics: MetricsHandle = match &prometheus {
        Some(p) => p.clone() as MetricsHandle,
        None => noop_metrics(),
    };

    // 3) registry over redis
    let store = RedisStore::connect(&cfg.redis.registry_url())
        .await
        .context("connecting registry store")?;
    let registry = Arc::new(TaskRegistry::new(Arc::new(store)).with_metrics(metrics.clone()));

    // 4) dispatch router over the celery broker
    let broker = CeleryBroker::connect(&cfg.redis.broker_url(), &cfg.redis.backend_url())
        .await
        .context("connecting broker")?;
    let router = Arc::new(
        DispatchRouter::new(registry.clone(), Arc::new(broker))
            .with_config(cfg.router.clone())
            .with_metrics(metrics.clone()),
    );

    // 5) deployment pipeline over the container CLI
    let runtime = Arc::new(CliRuntime::new(cfg.pipeline.runtime_binary.clone()));
    let pipeline = Arc::new(
        DeploymentPipeline::new(runtime, cfg.pipeline.clone())
            .with_worker_env(cfg.redis.worker_env())
            .with_metrics(metrics),
    );

    // 6) http
    let adapter = Arc::new(
        ServiceAdapter::new(registry, router, pipeline)
            .with_dispatch_timeout(cfg.dispatch_timeout)
            .with_source_root(cfg.source_root.clone()),
    );
    let mut api = HttpApi::new(adapter);
    if let Some(p) = prometheus {
        api = api.with_metrics(p);
    }

    let listener = tokio::net::TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("binding {}", cfg.bind))?;
    info!(addr = %cfg.bind, "serving tools");

    let shutdown = cancel.clone();
    axum::serve(listener, api.router())
        .with_graceful_shutdown(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("shutdown requested"),
                Err(e) => {
                    warn!(error = %e, "cannot listen for ctrl-c, serving until killed");
                    std::future::pending::<()>().await;
                }
            }
            shutdown.cancel();
        })
        .await
        .context("http server")?;

    cancel.cancel();
    if let Err(e) = tz_sync.await {
        warn!(error = %e, "timezone sync task ended abnormally");
    }
    info!("stopped");
    Ok(())
}
