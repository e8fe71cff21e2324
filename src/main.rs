use anyhow::{Context, Result};
use clap::Parser;
use quizgate::connection::GistSeedPool;
use quizgate::{Actor, AppConfig, Role, SeedPool, SessionResolver, StaticSeedPool, Tables};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = AppConfig::parse();

    let tables = Tables::new(&config);

    let sessions = Arc::new(SessionResolver::new());
    match &config.bootstrap_token {
        Some(token) => {
            sessions
                .insert(token.clone(), Actor::new(0, Role::SuperUser))
                .await;
            info!("bootstrap super user session registered");
        }
        None => warn!("no BOOTSTRAP_TOKEN configured, every request will be unauthenticated"),
    }

    let seeds: Arc<dyn SeedPool> = match GistSeedPool::from_config(&config)
        .context("failed to build the seed client")?
    {
        Some(pool) => {
            info!(url = %pool.url(), "seeding from gist");
            Arc::new(pool)
        }
        None => {
            warn!("no SEED_GIST_HASH configured, seed routes have no pools");
            Arc::new(StaticSeedPool::new())
        }
    };

    let app = quizgate::api_router(&tables, sessions, seeds)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    info!(address = %address, "quiz API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("quizgate=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install ctrl+c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install sigterm handler");
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
}
