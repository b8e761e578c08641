// SPDX-FileCopyrightText: 2026 Volley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Volley dispatch engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Volley configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to the
/// reference deployment's values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VolleyConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Dispatch safety limits: quota, rate ceiling, retries, workers.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Anti-ban pacing bands and pauses.
    #[serde(default)]
    pub pacing: PacingConfig,

    /// Read-through cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// SQLite persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Message provider endpoint settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Read-only status gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Housekeeping schedules.
    #[serde(default)]
    pub housekeeping: HousekeepingConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Instance name, used as the lock-holder prefix for this process.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_engine_name() -> String {
    "volley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Dispatch safety configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Rolling daily send quota across all campaigns.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: i64,

    /// Hard per-minute send ceiling enforced by the rate limiter.
    #[serde(default = "default_rate_per_minute")]
    pub rate_per_minute: i64,

    /// Maximum send attempts per message before permanent failure.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential retry backoff, in seconds.
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,

    /// Worker loops pulled up by `volley serve`.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Campaign lock ttl, in seconds. The crash-safety net for runs
    /// interrupted mid-batch.
    #[serde(default = "default_campaign_lock_ttl_secs")]
    pub campaign_lock_ttl_secs: u64,

    /// Idempotency lock ttl, in seconds.
    #[serde(default = "default_idempotency_ttl_secs")]
    pub idempotency_ttl_secs: u64,

    /// Counter key expiry window, in hours. Wider than a day so a missed
    /// reset never silently zeroes live counters.
    #[serde(default = "default_counter_window_hours")]
    pub counter_window_hours: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            rate_per_minute: default_rate_per_minute(),
            max_attempts: default_max_attempts(),
            retry_base_secs: default_retry_base_secs(),
            workers: default_workers(),
            campaign_lock_ttl_secs: default_campaign_lock_ttl_secs(),
            idempotency_ttl_secs: default_idempotency_ttl_secs(),
            counter_window_hours: default_counter_window_hours(),
        }
    }
}

fn default_daily_limit() -> i64 {
    1000
}

fn default_rate_per_minute() -> i64 {
    25
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_secs() -> u64 {
    60
}

fn default_workers() -> usize {
    2
}

fn default_campaign_lock_ttl_secs() -> u64 {
    600
}

fn default_idempotency_ttl_secs() -> u64 {
    120
}

fn default_counter_window_hours() -> u64 {
    48
}

/// One warm-up phase band: from `from` cumulative sends onward, pick a
/// pre-send delay uniformly in `[min_secs, max_secs]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseBand {
    pub from: u64,
    pub min_secs: u64,
    pub max_secs: u64,
}

/// One strategic pause: when the cumulative count hits `at`, pause for a
/// random `[min_mins, max_mins]` minutes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StrategicPause {
    pub at: u64,
    pub min_mins: u64,
    pub max_mins: u64,
}

/// One content-length band: content up to `max_len` chars adds
/// `delay_secs` seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContentBand {
    pub max_len: usize,
    pub delay_secs: u64,
}

/// Anti-ban pacing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PacingConfig {
    /// Volume-indexed warm-up phases, ordered by `from`, first at 0.
    #[serde(default = "default_warm_up")]
    pub warm_up: Vec<PhaseBand>,

    /// Escalating long pauses at fixed cumulative counts.
    #[serde(default = "default_strategic_pauses")]
    pub strategic_pauses: Vec<StrategicPause>,

    /// Probability of an extra short hesitation pause per send.
    #[serde(default = "default_micro_pause_probability")]
    pub micro_pause_probability: f64,

    #[serde(default = "default_micro_pause_min_secs")]
    pub micro_pause_min_secs: u64,

    #[serde(default = "default_micro_pause_max_secs")]
    pub micro_pause_max_secs: u64,

    /// Content-length delay bands, ordered by `max_len`.
    #[serde(default = "default_content_bands")]
    pub content_bands: Vec<ContentBand>,

    /// Cap on the content-length term, in seconds.
    #[serde(default = "default_content_delay_cap_secs")]
    pub content_delay_cap_secs: u64,

    /// Emergency pause after a ban-risk provider error, in minutes.
    #[serde(default = "default_emergency_pause_mins")]
    pub emergency_pause_mins: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            warm_up: default_warm_up(),
            strategic_pauses: default_strategic_pauses(),
            micro_pause_probability: default_micro_pause_probability(),
            micro_pause_min_secs: default_micro_pause_min_secs(),
            micro_pause_max_secs: default_micro_pause_max_secs(),
            content_bands: default_content_bands(),
            content_delay_cap_secs: default_content_delay_cap_secs(),
            emergency_pause_mins: default_emergency_pause_mins(),
        }
    }
}

fn default_warm_up() -> Vec<PhaseBand> {
    // Cautious start, loosening as the day's volume builds trust, then
    // slowing again once volume gets conspicuous.
    vec![
        PhaseBand { from: 0, min_secs: 45, max_secs: 90 },
        PhaseBand { from: 30, min_secs: 30, max_secs: 60 },
        PhaseBand { from: 80, min_secs: 20, max_secs: 40 },
        PhaseBand { from: 200, min_secs: 30, max_secs: 60 },
        PhaseBand { from: 500, min_secs: 60, max_secs: 120 },
    ]
}

fn default_strategic_pauses() -> Vec<StrategicPause> {
    vec![
        StrategicPause { at: 20, min_mins: 2, max_mins: 5 },
        StrategicPause { at: 40, min_mins: 5, max_mins: 10 },
        StrategicPause { at: 60, min_mins: 8, max_mins: 15 },
        StrategicPause { at: 100, min_mins: 15, max_mins: 30 },
    ]
}

fn default_micro_pause_probability() -> f64 {
    0.10
}

fn default_micro_pause_min_secs() -> u64 {
    5
}

fn default_micro_pause_max_secs() -> u64 {
    15
}

fn default_content_bands() -> Vec<ContentBand> {
    vec![
        ContentBand { max_len: 160, delay_secs: 0 },
        ContentBand { max_len: 500, delay_secs: 1 },
        ContentBand { max_len: 1500, delay_secs: 2 },
        ContentBand { max_len: usize::MAX, delay_secs: 5 },
    ]
}

fn default_content_delay_cap_secs() -> u64 {
    5
}

fn default_emergency_pause_mins() -> u64 {
    30
}

/// Read-through cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Default entry ttl, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Minimum lookups before the hit-rate warning can trigger.
    #[serde(default = "default_cache_min_sample")]
    pub min_sample: u64,

    /// Hit rate below which a warning is surfaced.
    #[serde(default = "default_cache_hit_rate_warn")]
    pub hit_rate_warn: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_cache_ttl_secs(),
            min_sample: default_cache_min_sample(),
            hit_rate_warn: default_cache_hit_rate_warn(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_min_sample() -> u64 {
    100
}

fn default_cache_hit_rate_warn() -> f64 {
    0.5
}

/// SQLite persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("volley").join("volley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("volley.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Message provider endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider messages endpoint.
    #[serde(default = "default_provider_endpoint")]
    pub endpoint: String,

    /// Bearer token. `None` requires the environment variable override.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout, in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_provider_endpoint(),
            api_key: None,
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_provider_endpoint() -> String {
    "http://127.0.0.1:8800/v1/messages".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    30
}

/// Read-only status gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8870
}

/// Housekeeping schedule configuration. Cron expressions are standard
/// five-field, evaluated in UTC.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HousekeepingConfig {
    /// Scheduler tick interval, in seconds.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Daily counter reset, start of the logical day.
    #[serde(default = "default_daily_reset_cron")]
    pub daily_reset_cron: String,

    /// Hourly durable stats sync.
    #[serde(default = "default_stats_sync_cron")]
    pub stats_sync_cron: String,

    /// Expired-key sweep of the shared store.
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,

    /// Interrupted-campaign recovery.
    #[serde(default = "default_recovery_cron")]
    pub recovery_cron: String,

    /// Follow-up window evaluation.
    #[serde(default = "default_followup_cron")]
    pub followup_cron: String,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            daily_reset_cron: default_daily_reset_cron(),
            stats_sync_cron: default_stats_sync_cron(),
            sweep_cron: default_sweep_cron(),
            recovery_cron: default_recovery_cron(),
            followup_cron: default_followup_cron(),
        }
    }
}

fn default_tick_secs() -> u64 {
    30
}

fn default_daily_reset_cron() -> String {
    "0 0 * * *".to_string()
}

fn default_stats_sync_cron() -> String {
    "0 * * * *".to_string()
}

fn default_sweep_cron() -> String {
    "*/15 * * * *".to_string()
}

fn default_recovery_cron() -> String {
    "*/10 * * * *".to_string()
}

fn default_followup_cron() -> String {
    "*/5 * * * *".to_string()
}
