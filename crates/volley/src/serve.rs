// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `volley serve` command implementation.
//!
//! Builds every service object once — counter store, quota engine, rate
//! limiter, lock manager, pacing planner, cache, provider, queue — and
//! passes them by `Arc` into the worker loops, the housekeeping
//! scheduler, and the status gateway. No module-level state anywhere.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use volley_cache::CacheLayer;
use volley_config::VolleyConfig;
use volley_core::{
    CampaignStore, JobQueue, KvStore, MessageProvider, MessageStore, StatsStore, VolleyError,
};
use volley_dispatch::{CampaignRunner, Housekeeper, JobRunner, SendPipeline};
use volley_gateway::GatewayState;
use volley_guard::{DailyQuota, LockManager, SendRateLimiter};
use volley_kv::MemoryKv;
use volley_pace::{ErrorTable, PacingPlanner};
use volley_provider::HttpProvider;
use volley_storage::{Database, SqliteJobQueue, SqliteStore};

/// How long an idle worker waits before polling the queue again.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runs the `volley serve` command.
pub async fn run_serve(config: VolleyConfig) -> Result<(), VolleyError> {
    init_tracing(&config.engine.log_level);
    info!(name = %config.engine.name, "starting volley serve");

    // Persistent storage (messages, campaigns, stats, job queue).
    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    let store = Arc::new(SqliteStore::new(db.clone()));
    let queue = Arc::new(SqliteJobQueue::new(db));

    // Shared counter store and the guards built on it.
    let kv = Arc::new(MemoryKv::new());
    let quota = Arc::new(DailyQuota::new(
        kv.clone() as Arc<dyn KvStore>,
        store.clone() as Arc<dyn StatsStore>,
        config.dispatch.daily_limit,
        Duration::from_secs(config.dispatch.counter_window_hours * 3600),
    ));
    // Counter crash recovery: re-seed today's counters from the durable
    // mirror before any send is admitted.
    quota.restore_from_durable().await?;

    let limiter = Arc::new(SendRateLimiter::per_minute(
        kv.clone() as Arc<dyn KvStore>,
        config.dispatch.rate_per_minute,
    ));
    let locks = Arc::new(LockManager::new(kv.clone() as Arc<dyn KvStore>));
    let planner = Arc::new(PacingPlanner::new(config.pacing.clone()));
    let errors = Arc::new(ErrorTable::new(Duration::from_secs(
        config.pacing.emergency_pause_mins * 60,
    )));
    let cache = Arc::new(CacheLayer::new(
        kv.clone() as Arc<dyn KvStore>,
        Duration::from_secs(config.cache.default_ttl_secs),
        config.cache.min_sample,
        config.cache.hit_rate_warn,
    ));

    // Message provider.
    let provider = Arc::new(HttpProvider::new(&config.provider)?);
    info!(endpoint = %config.provider.endpoint, "message provider configured");

    // Prometheus metrics recorder; the gateway renders the handle.
    let prometheus_render = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("prometheus metrics recorder installed");
            Some(Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>)
        }
        Err(e) => {
            warn!(error = %e, "prometheus recorder unavailable, continuing without metrics");
            None
        }
    };

    // Dispatch pipeline and campaign runner.
    let pipeline = Arc::new(SendPipeline::new(
        provider as Arc<dyn MessageProvider>,
        store.clone() as Arc<dyn MessageStore>,
        queue.clone() as Arc<dyn JobQueue>,
        quota.clone(),
        limiter,
        locks.clone(),
        planner,
        errors,
        config.dispatch.clone(),
    ));
    let campaign_runner = Arc::new(CampaignRunner::new(
        store.clone() as Arc<dyn CampaignStore>,
        store.clone() as Arc<dyn MessageStore>,
        locks.clone(),
        quota.clone(),
        pipeline.clone(),
        Duration::from_secs(config.dispatch.campaign_lock_ttl_secs),
    ));

    let cancel = CancellationToken::new();
    let mut tasks = tokio::task::JoinSet::new();

    // Housekeeping scheduler.
    let housekeeper = Housekeeper::new(
        &config.housekeeping,
        queue.clone() as Arc<dyn JobQueue>,
        kv.clone(),
    )?;
    {
        let cancel = cancel.clone();
        tasks.spawn(async move { housekeeper.run(cancel).await });
    }

    // Status gateway.
    if config.gateway.enabled {
        let state = Arc::new(GatewayState {
            quota: quota.clone(),
            cache: cache.clone(),
            prometheus_render,
        });
        let host = config.gateway.host.clone();
        let port = config.gateway.port;
        let cancel = cancel.clone();
        tasks.spawn(async move {
            if let Err(e) = volley_gateway::serve(state, &host, port, cancel).await {
                error!(error = %e, "status gateway exited");
            }
        });
    }

    // Worker loops. Each worker processes one job at a time; the small
    // per-worker concurrency is the primary backpressure mechanism
    // alongside the rate limiter.
    for index in 0..config.dispatch.workers {
        let runner_id = format!(
            "{}-worker-{index}-{}",
            config.engine.name,
            uuid::Uuid::new_v4()
        );
        let runner = JobRunner::new(
            runner_id.clone(),
            pipeline.clone(),
            campaign_runner.clone(),
            quota.clone(),
            locks.clone(),
            store.clone() as Arc<dyn MessageStore>,
            store.clone() as Arc<dyn CampaignStore>,
            queue.clone() as Arc<dyn JobQueue>,
        );
        let queue = queue.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move { worker_loop(runner_id, queue, runner, cancel).await });
    }
    info!(workers = config.dispatch.workers, "dispatch workers started");

    // Graceful shutdown on ctrl-c: workers finish their in-flight job.
    tokio::signal::ctrl_c().await.map_err(|e| {
        VolleyError::Internal(format!("signal handler: {e}"))
    })?;
    info!("shutdown signal received");
    cancel.cancel();
    while tasks.join_next().await.is_some() {}
    info!("volley serve stopped");
    Ok(())
}

/// One worker: claim, run, ack/fail, repeat.
async fn worker_loop(
    worker_id: String,
    queue: Arc<SqliteJobQueue>,
    runner: JobRunner,
    cancel: CancellationToken,
) {
    info!(worker_id = %worker_id, "worker started");
    loop {
        if cancel.is_cancelled() {
            info!(worker_id = %worker_id, "worker stopping");
            return;
        }

        let claimed = match queue.dequeue_job().await {
            Ok(claimed) => claimed,
            Err(e) => {
                error!(worker_id = %worker_id, error = %e, "queue dequeue failed");
                tokio::time::sleep(WORKER_POLL_INTERVAL).await;
                continue;
            }
        };

        let Some(claimed) = claimed else {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(WORKER_POLL_INTERVAL) => {}
            }
            continue;
        };

        match runner.run(&claimed.job).await {
            Ok(()) => {
                if let Err(e) = queue.ack_job(claimed.queue_id).await {
                    error!(worker_id = %worker_id, queue_id = claimed.queue_id, error = %e, "ack failed");
                }
            }
            Err(e) => {
                warn!(
                    worker_id = %worker_id,
                    queue_id = claimed.queue_id,
                    job = ?claimed.job,
                    error = %e,
                    "job failed, returning to queue"
                );
                if let Err(e) = queue.fail_job(claimed.queue_id).await {
                    error!(worker_id = %worker_id, queue_id = claimed.queue_id, error = %e, "fail-mark failed");
                }
            }
        }
    }
}

/// Initialize the tracing subscriber once, honoring `RUST_LOG` when set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
