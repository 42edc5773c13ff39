//! Service configuration loaded from environment variables.

use std::time::Duration;

/// Runtime configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL` — Postgres connection string; unset runs the
///   in-memory store
/// - `METRICS_PORT` — Prometheus exporter port (default: `9090`)
/// - `OUTBOX_PUBLISH_INTERVAL_MS` — relay polling interval (default: `5000`)
/// - `OUTBOX_CLEANUP_INTERVAL_MS` — retention sweep interval (default: `3600000`)
/// - `OUTBOX_RETENTION_DAYS` — published entry retention (default: `7`)
/// - `SAGA_STALLED_THRESHOLD_MINUTES` — stalled saga age (default: `30`)
/// - `SAGA_SWEEP_INTERVAL_MS` — stalled saga check interval (default: `60000`)
/// - `IDEMPOTENCY_TTL_HOURS` — idempotency record lifetime (default: `24`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub metrics_port: u16,
    pub outbox_publish_interval_ms: u64,
    pub outbox_cleanup_interval_ms: u64,
    pub outbox_retention_days: i64,
    pub saga_stalled_threshold_minutes: i64,
    pub saga_sweep_interval_ms: u64,
    pub idempotency_ttl_hours: i64,
    pub log_level: String,
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            metrics_port: env_parsed("METRICS_PORT", 9090),
            outbox_publish_interval_ms: env_parsed("OUTBOX_PUBLISH_INTERVAL_MS", 5_000),
            outbox_cleanup_interval_ms: env_parsed("OUTBOX_CLEANUP_INTERVAL_MS", 3_600_000),
            outbox_retention_days: env_parsed("OUTBOX_RETENTION_DAYS", 7),
            saga_stalled_threshold_minutes: env_parsed("SAGA_STALLED_THRESHOLD_MINUTES", 30),
            saga_sweep_interval_ms: env_parsed("SAGA_SWEEP_INTERVAL_MS", 60_000),
            idempotency_ttl_hours: env_parsed("IDEMPOTENCY_TTL_HOURS", 24),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.outbox_publish_interval_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.outbox_cleanup_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.saga_sweep_interval_ms)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.outbox_retention_days)
    }

    pub fn stalled_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.saga_stalled_threshold_minutes)
    }

    pub fn idempotency_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.idempotency_ttl_hours)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            metrics_port: 9090,
            outbox_publish_interval_ms: 5_000,
            outbox_cleanup_interval_ms: 3_600_000,
            outbox_retention_days: 7,
            saga_stalled_threshold_minutes: 30,
            saga_sweep_interval_ms: 60_000,
            idempotency_ttl_hours: 24,
            log_level: "info".to_string(),
        }
    }
}
