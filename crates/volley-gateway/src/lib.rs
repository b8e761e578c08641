// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only status gateway.
//!
//! A thin axum surface over the dispatch safety state: quota snapshot
//! with alert level, cache effectiveness, liveness, and Prometheus text.
//! Deployment-internal and strictly read-only — the CRUD/auth HTTP
//! surface of the wider system lives elsewhere.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use volley_cache::CacheLayer;
use volley_core::VolleyError;
use volley_guard::DailyQuota;

/// Shared state behind the status endpoints.
pub struct GatewayState {
    pub quota: Arc<DailyQuota>,
    pub cache: Arc<CacheLayer>,
    /// Prometheus text renderer, injected by the binary when metrics are
    /// enabled.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Build the gateway router.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status/quota", get(quota_status))
        .route("/status/cache", get(cache_status))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the token is cancelled.
pub async fn serve(
    state: Arc<GatewayState>,
    host: &str,
    port: u16,
    cancel: CancellationToken,
) -> Result<(), VolleyError> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| VolleyError::Internal(format!("gateway bind {addr}: {e}")))?;
    info!(%addr, "status gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| VolleyError::Internal(format!("gateway server: {e}")))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn quota_status(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(state.quota.status().await)
}

#[derive(Debug, Serialize)]
struct CacheStatus {
    hits: u64,
    misses: u64,
    hit_rate: f64,
    low_hit_rate: bool,
}

async fn cache_status(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let metrics = state.cache.metrics();
    Json(CacheStatus {
        hits: metrics.hits,
        misses: metrics.misses,
        hit_rate: metrics.hit_rate(),
        low_hit_rate: state.cache.hit_rate_low(),
    })
}

async fn metrics(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    match &state.prometheus_render {
        Some(render) => (StatusCode::OK, render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics not enabled").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;
    use volley_core::{CounterKind, KvStore};
    use volley_kv::keys::quota_counter_key;
    use volley_kv::MemoryKv;
    use volley_storage::{Database, SqliteStore};

    async fn state_with_counters(primary: i64) -> (Arc<GatewayState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("gw.db").to_str().unwrap())
            .await
            .unwrap();
        let store = Arc::new(SqliteStore::new(db));
        let kv = Arc::new(MemoryKv::new());
        kv.set(
            &quota_counter_key(&DailyQuota::today(), CounterKind::Primary),
            &primary.to_string(),
            None,
        )
        .await
        .unwrap();

        let quota = Arc::new(DailyQuota::new(
            kv.clone(),
            store,
            1000,
            Duration::from_secs(48 * 3600),
        ));
        let cache = Arc::new(CacheLayer::new(kv, Duration::from_secs(300), 100, 0.5));
        (
            Arc::new(GatewayState {
                quota,
                cache,
                prometheus_render: Some(Arc::new(|| "volley_up 1\n".to_string())),
            }),
            dir,
        )
    }

    async fn get_json(router: Router, uri: &str) -> serde_json::Value {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_answers_ok() {
        let (state, _dir) = state_with_counters(0).await;
        let response = router(state)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn quota_status_reports_alert_level() {
        let (state, _dir) = state_with_counters(920).await;
        let body = get_json(router(state), "/status/quota").await;
        assert_eq!(body["daily_limit"], 1000);
        assert_eq!(body["alert_level"], "danger");
        assert_eq!(body["counters"]["primary_count"], 920);
    }

    #[tokio::test]
    async fn cache_status_reports_counters() {
        let (state, _dir) = state_with_counters(0).await;
        let _: Option<u32> = state.cache.get("ns", "missing").await;

        let body = get_json(router(state), "/status/cache").await;
        assert_eq!(body["misses"], 1);
        assert_eq!(body["hits"], 0);
        assert_eq!(body["low_hit_rate"], false);
    }

    #[tokio::test]
    async fn metrics_renders_injected_text() {
        let (state, _dir) = state_with_counters(0).await;
        let response = router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("volley_up 1"));
    }

    #[tokio::test]
    async fn metrics_404s_when_not_enabled() {
        let (state, _dir) = state_with_counters(0).await;
        let state = Arc::new(GatewayState {
            quota: state.quota.clone(),
            cache: state.cache.clone(),
            prometheus_render: None,
        });
        let response = router(state)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
