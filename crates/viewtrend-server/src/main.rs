mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use viewtrend_youtube::YoutubeSource;

use crate::{
    api::{build_app, AppState},
    middleware::{AuthState, RateLimitState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(viewtrend_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = viewtrend_db::PoolConfig::from_app_config(&config);
    let pool = viewtrend_db::connect_pool(&config.database_url, pool_config).await?;
    viewtrend_db::run_migrations(&pool).await?;

    let scopes = Arc::new(viewtrend_core::load_scopes(&config.scopes_path)?);
    tracing::info!(
        path = %config.scopes_path.display(),
        scopes = scopes.scopes.len(),
        "loaded scope configuration"
    );

    let source = match YoutubeSource::from_app_config(&config) {
        Ok(source) => Some(source),
        Err(e) => {
            tracing::warn!(
                error = %e,
                "YouTube source unavailable; ingestion and live queries disabled"
            );
            None
        }
    };

    let state = AppState::new(pool, Arc::clone(&config), scopes, source);
    let _scheduler = scheduler::build_scheduler(&state).await?;

    let auth = AuthState::from_config(&config)?;
    let rate_limit = RateLimitState::from_config(&config);
    if !rate_limit.is_enabled() {
        tracing::warn!("VIEWTREND_RATE_LIMIT_PER_MINUTE is 0; rate limiting disabled");
    }
    let app = build_app(state, auth, rate_limit);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "viewtrend-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
