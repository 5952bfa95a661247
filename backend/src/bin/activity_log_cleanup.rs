use clubhouse_backend::{
    config::Config,
    db::connection::create_pool,
    services::activity_log::{sweep_expired, ActivityLogService},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "activity_log_cleanup=info,clubhouse_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let pool = create_pool(&config.database_url).await?;

    let service = ActivityLogService::new(pool.clone());
    let deleted = sweep_expired(&service, config.activity_log_retention_days).await?;
    if deleted > 0 {
        tracing::info!("Deleted {} expired activity log entries", deleted);
    }

    sqlx::query("VACUUM (ANALYZE) activity_logs")
        .execute(&pool)
        .await?;

    Ok(())
}
