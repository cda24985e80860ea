use kidlearn_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{MemoryRepository, RepositoryState, SqliteRepository},
    seed,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, opens the store, seeds demo
/// data when asked to, and serves HTTP until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise crate-level debug
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kidlearn_api=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.uses_default_secret() {
        tracing::warn!("JWT_SECRET is not set; tokens are signed with the built-in local secret");
    }

    // 3. Storage
    let repo: RepositoryState = if config.uses_memory_store() {
        tracing::info!("Using in-memory store; data is lost on exit");
        Arc::new(MemoryRepository::new())
    } else {
        let sqlite = SqliteRepository::connect(&config.db_url, 5)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to open database"))?;
        tracing::info!("Database ready, migrations applied");
        Arc::new(sqlite)
    };

    if config.seed_demo_data {
        seed::seed_if_empty(repo.as_ref()).await?;
    }

    // 4. Router and server
    let app = create_router(AppState::new(repo, &config));

    let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!("Listening on {}", local_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", local_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
