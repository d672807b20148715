use academic_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router, ensure_bootstrap_teacher,
    memory::InMemoryRepository,
    password,
    repository::{PostgresRepository, RepositoryState},
};
use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the directory store and the HTTP server, in that
/// order. Any startup failure is reported and ends the process with a non-zero status.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load().context("invalid configuration")?;

    // 2. Logging: RUST_LOG wins, otherwise crate-level debug.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "academic_portal=debug,tower_http=info,axum=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Directory store: Postgres when configured, in-memory otherwise (local only).
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(db_url)
                .await
                .context("failed to connect to Postgres, check DATABASE_URL")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("failed to run database migrations")?;
            Arc::new(PostgresRepository::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory directory (data is lost on exit)");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 4. First teacher account, if requested.
    if let Some(bootstrap) = &config.bootstrap_teacher {
        if ensure_bootstrap_teacher(repo.as_ref(), bootstrap)
            .await
            .context("failed to create the bootstrap teacher")?
        {
            tracing::info!(email = %bootstrap.email, "bootstrap teacher created");
        }
    }

    // Built before the first login so failed attempts all cost the same.
    if password::dummy_hash().is_none() {
        anyhow::bail!("failed to prepare the login timing hash");
    }

    // 5. Router and server
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API documentation available at http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
