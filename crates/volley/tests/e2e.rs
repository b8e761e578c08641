// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete dispatch stack: real SQLite queue
//! and store, in-process counter store, mock provider, and the same
//! job-runner cycle the serve workers execute.

use std::sync::Arc;
use std::time::Duration;

use volley_config::model::{DispatchConfig, PacingConfig};
use volley_core::{
    CampaignRecord, CampaignStatus, CampaignStore, ContactRecord, Job, JobQueue, KvStore,
    MessageKind, MessageProvider, MessageRecord, MessageStatus, MessageStore, StatsStore,
};
use volley_dispatch::{CampaignRunner, JobRunner, SendPipeline};
use volley_guard::{DailyQuota, LockManager, SendRateLimiter};
use volley_kv::MemoryKv;
use volley_pace::{ErrorTable, PacingPlanner};
use volley_storage::{Database, SqliteJobQueue, SqliteStore};
use volley_test_utils::MockProvider;

struct Stack {
    store: Arc<SqliteStore>,
    queue: Arc<SqliteJobQueue>,
    quota: Arc<DailyQuota>,
    provider: Arc<MockProvider>,
    runner: JobRunner,
    _dir: tempfile::TempDir,
}

async fn stack() -> Stack {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("e2e.db").to_str().unwrap())
        .await
        .unwrap();
    let store = Arc::new(SqliteStore::new(db.clone()));
    let queue = Arc::new(SqliteJobQueue::new(db));
    let kv = Arc::new(MemoryKv::new());
    let provider = Arc::new(MockProvider::new());

    let dispatch = DispatchConfig::default();
    let pacing = PacingConfig::default();
    let quota = Arc::new(DailyQuota::new(
        kv.clone() as Arc<dyn KvStore>,
        store.clone() as Arc<dyn StatsStore>,
        dispatch.daily_limit,
        Duration::from_secs(dispatch.counter_window_hours * 3600),
    ));
    let limiter = Arc::new(SendRateLimiter::per_minute(
        kv.clone() as Arc<dyn KvStore>,
        dispatch.rate_per_minute,
    ));
    let locks = Arc::new(LockManager::new(kv.clone() as Arc<dyn KvStore>));
    let pipeline = Arc::new(SendPipeline::new(
        provider.clone() as Arc<dyn MessageProvider>,
        store.clone() as Arc<dyn MessageStore>,
        queue.clone() as Arc<dyn JobQueue>,
        quota.clone(),
        limiter,
        locks.clone(),
        Arc::new(PacingPlanner::new(pacing.clone())),
        Arc::new(ErrorTable::new(Duration::from_secs(
            pacing.emergency_pause_mins * 60,
        ))),
        dispatch.clone(),
    ));
    let campaign_runner = Arc::new(CampaignRunner::new(
        store.clone() as Arc<dyn CampaignStore>,
        store.clone() as Arc<dyn MessageStore>,
        locks.clone(),
        quota.clone(),
        pipeline.clone(),
        Duration::from_secs(dispatch.campaign_lock_ttl_secs),
    ));
    let runner = JobRunner::new(
        "e2e-worker-0".to_string(),
        pipeline,
        campaign_runner,
        quota.clone(),
        locks,
        store.clone() as Arc<dyn MessageStore>,
        store.clone() as Arc<dyn CampaignStore>,
        queue.clone() as Arc<dyn JobQueue>,
    );

    Stack {
        store,
        queue,
        quota,
        provider,
        runner,
        _dir: dir,
    }
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

async fn seed(store: &SqliteStore, messages: usize) {
    store
        .insert_contact(&ContactRecord {
            id: "ct-1".into(),
            destination: "+15550001111".into(),
            display_name: Some("Ada".into()),
        })
        .await
        .unwrap();
    store
        .insert_campaign(&CampaignRecord {
            id: "c-1".into(),
            name: "launch".into(),
            status: CampaignStatus::Running,
            primary_template: "Hi {name}".into(),
            followup_template: None,
            followup_window_hours: 24,
            created_at: now(),
            updated_at: now(),
        })
        .await
        .unwrap();
    for i in 0..messages {
        store
            .insert_message(&MessageRecord {
                id: format!("m-{i:03}"),
                campaign_id: "c-1".into(),
                contact_id: "ct-1".into(),
                kind: MessageKind::Primary,
                content: "Hi Ada".into(),
                status: MessageStatus::Pending,
                retry_count: 0,
                error: None,
                provider_message_id: None,
                created_at: now(),
                sent_at: None,
                delivered_at: None,
                read_at: None,
            })
            .await
            .unwrap();
    }
}

/// Run the worker cycle until the queue has nothing ready.
async fn drain(stack: &Stack) -> usize {
    let mut processed = 0;
    while let Some(claimed) = stack.queue.dequeue_job().await.unwrap() {
        match stack.runner.run(&claimed.job).await {
            Ok(()) => stack.queue.ack_job(claimed.queue_id).await.unwrap(),
            Err(_) => stack.queue.fail_job(claimed.queue_id).await.unwrap(),
        }
        processed += 1;
    }
    processed
}

#[tokio::test(start_paused = true)]
async fn campaign_job_flows_through_the_real_queue() {
    let stack = stack().await;
    seed(&stack.store, 3).await;

    stack
        .queue
        .enqueue(&Job::SendCampaign {
            campaign_id: "c-1".into(),
        })
        .await
        .unwrap();

    let processed = drain(&stack).await;
    assert_eq!(processed, 1);

    assert_eq!(stack.provider.call_count().await, 3);
    assert!(stack.store.list_pending("c-1").await.unwrap().is_empty());
    assert_eq!(stack.quota.snapshot().await.primary_count, 3);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_lands_back_on_the_queue_with_a_delay() {
    let stack = stack().await;
    seed(&stack.store, 1).await;
    stack.provider.push_failure(500, "internal server error").await;

    stack
        .queue
        .enqueue(&Job::SendMessage {
            message_id: "m-000".into(),
        })
        .await
        .unwrap();

    // The send job completes (the retry is a scheduled outcome, not a
    // job error), leaving one delayed retry row invisible until due.
    let processed = drain(&stack).await;
    assert_eq!(processed, 1);

    let message = stack.store.get_message("m-000").await.unwrap().unwrap();
    assert_eq!(message.status, MessageStatus::Pending);
    assert_eq!(message.retry_count, 1);
    assert!(
        stack.queue.dequeue_job().await.unwrap().is_none(),
        "the retry must stay invisible for its backoff delay"
    );
}

#[tokio::test(start_paused = true)]
async fn stats_sync_job_mirrors_counters_durably() {
    let stack = stack().await;
    seed(&stack.store, 2).await;

    stack
        .queue
        .enqueue(&Job::SendCampaign {
            campaign_id: "c-1".into(),
        })
        .await
        .unwrap();
    drain(&stack).await;

    stack.queue.enqueue(&Job::SyncQuotaStats).await.unwrap();
    drain(&stack).await;

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let persisted = StatsStore::get(stack.store.as_ref(), &today)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(persisted.primary_count, 2);
}

#[tokio::test(start_paused = true)]
async fn recovery_job_requeues_and_next_drain_sends() {
    let stack = stack().await;
    seed(&stack.store, 2).await;

    // No lock, running, pending: the shape a crashed worker leaves.
    stack
        .queue
        .enqueue(&Job::RecoverInterruptedCampaigns)
        .await
        .unwrap();

    // First drain runs recovery, which enqueues the campaign job; the
    // same drain then picks that job up and sends everything.
    drain(&stack).await;

    assert_eq!(stack.provider.call_count().await, 2);
    assert!(stack.store.list_pending("c-1").await.unwrap().is_empty());
}
