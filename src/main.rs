// src/main.rs
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum_server::Handle;
use pollbox::{
    config::{Config, IdentityConfig, StoreConfig},
    db, routes,
    session::{IdentityProvider, StaticIdentity, SupabaseIdentity},
    store::{Backend, MemoryBackend, PgBackend},
    AppState,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // Load environment variables from .env file

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pollbox=debug"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("loading configuration")?;

    let backend: Arc<dyn Backend> = match &config.store {
        StoreConfig::Postgres {
            database_url,
            max_connections,
            run_migrations,
            switch_role,
        } => {
            info!("Connecting to the database...");
            let pool = db::create_pool(database_url, *max_connections)
                .await
                .context("connecting to the database")?;
            if *run_migrations {
                db::run_migrations(&pool)
                    .await
                    .context("applying migrations")?;
            }
            Arc::new(PgBackend::new(pool).switch_role(*switch_role))
        }
        StoreConfig::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryBackend::default())
        }
    };

    let identity: Arc<dyn IdentityProvider> = match &config.identity {
        IdentityConfig::Supabase { url, anon_key } => {
            info!("Resolving sessions through {url}");
            Arc::new(SupabaseIdentity::new(url, anon_key.clone()))
        }
        IdentityConfig::Static(tokens) => {
            warn!("Resolving sessions from AUTH_STATIC_TOKENS ({} tokens)", tokens.len());
            Arc::new(StaticIdentity::new(tokens.clone()))
        }
    };

    let state = AppState::new(backend, identity, config.site_url.clone());
    let app = routes::create_routes(state, config.cors_allow_origin.clone());

    let address = config.socket_addr();
    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!("Server running on {address}");
    axum_server::bind(address)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("serving HTTP")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
