use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{models::activity_log::ActivityLog, repositories::activity_log};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityLogServiceTrait: Send + Sync {
    async fn record(&self, log: ActivityLog) -> Result<(), sqlx::Error>;
    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct ActivityLogService {
    pool: PgPool,
}

impl ActivityLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLogServiceTrait for ActivityLogService {
    async fn record(&self, log: ActivityLog) -> Result<(), sqlx::Error> {
        activity_log::insert_activity_log(&self.pool, &log).await
    }

    async fn delete_logs_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        activity_log::delete_activity_logs_before(&self.pool, cutoff).await
    }
}

pub fn retention_cutoff(now: DateTime<Utc>, retention_days: u64) -> DateTime<Utc> {
    let days = i64::try_from(retention_days).unwrap_or(i64::MAX / 86_400);
    now - Duration::days(days.max(1))
}

/// Deletes every log older than the retention horizon.
pub async fn sweep_expired(
    service: &dyn ActivityLogServiceTrait,
    retention_days: u64,
) -> Result<u64, sqlx::Error> {
    let cutoff = retention_cutoff(Utc::now(), retention_days);
    let deleted = service.delete_logs_before(cutoff).await?;
    tracing::info!(deleted, cutoff = %cutoff, "Activity log retention sweep finished");
    Ok(deleted)
}

/// Runs [`sweep_expired`] on a fixed interval for the lifetime of the process.
pub fn spawn_retention_sweep(
    service: Arc<dyn ActivityLogServiceTrait>,
    retention_days: u64,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep_expired(service.as_ref(), retention_days).await {
                tracing::warn!(error = ?err, "Activity log retention sweep failed");
            }
        }
    })
}
