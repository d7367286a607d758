mod api;
mod middleware;

use std::sync::Arc;
use std::time::Duration;

use leaddesk_db::{LeadStore, PgLeadStore};
use leaddesk_intake::IntakePipeline;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::RateLimitState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = leaddesk_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting leaddesk-server");

    let pool_config = leaddesk_db::PoolConfig::from_app_config(&config);
    let pool = leaddesk_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = leaddesk_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations complete");

    let store: Arc<dyn LeadStore> = Arc::new(PgLeadStore::new(pool));
    let pipeline = IntakePipeline::from_config(&config, store)?;
    let rate_limit = RateLimitState::new(config.rate_limit_per_minute, Duration::from_secs(60));
    let app = build_app(AppState { pipeline }, rate_limit);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
