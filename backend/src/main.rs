use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clubhouse_backend::{
    config::Config,
    db::connection::{create_pool, DbPool},
    routes::build_router,
    services::activity_log::spawn_retention_sweep,
    state::AppState,
};

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<unparseable>".into(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubhouse_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_database_url(&config.database_url),
        port = config.port,
        jwt_secret = %mask_secret(&config.jwt_secret),
        jwt_refresh_secret = %mask_secret(&config.jwt_refresh_secret),
        jwt_expiration_minutes = config.jwt_expiration_minutes,
        refresh_token_expiration_days = config.refresh_token_expiration_days,
        time_zone = %config.time_zone,
        cors_allow_origins = ?config.cors_allow_origins,
        trusted_proxies = ?config.trusted_proxies,
        frontend_url = %config.frontend_url,
        smtp_host = %config.smtp_host,
        smtp_password = %mask_secret(&config.smtp_password),
        smtp_skip_send = config.smtp_skip_send,
        media_cloud_name = %config.media_cloud_name,
        media_api_secret = %mask_secret(&config.media_api_secret),
        activity_log_retention_days = config.activity_log_retention_days,
        "Loaded configuration from environment/.env"
    );
    if !config.media_enabled() {
        tracing::warn!("Media host credentials missing; image uploads will fail");
    }

    // Initialize database
    let pool: DbPool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let port = config.port;
    let retention_days = config.activity_log_retention_days;
    let state = AppState::from_config(pool, config)?;
    spawn_retention_sweep(
        Arc::clone(&state.activity_log),
        retention_days,
        RETENTION_SWEEP_INTERVAL,
    );

    let app = build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
