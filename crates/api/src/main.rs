use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::app::build_router;
use api::clients::HttpClient;
use api::services::{spawn_reminder_service, spawn_scheduler};
use api::{AppConfig, AppState, Collaborators};
use infra::{MemoryStore, PgStore, TournamentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn TournamentStore> = match &config.database_url {
        Some(url) => {
            let pool = infra::db::connect(url, config.database_max_connections).await?;
            tracing::info!(
                "Connected to Postgres with max {} connections",
                config.database_max_connections
            );

            // Run database migrations automatically on startup (can be disabled with SKIP_MIGRATIONS=true)
            let skip_migrations = std::env::var("SKIP_MIGRATIONS")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false);

            if skip_migrations {
                tracing::info!("Skipping database migrations (SKIP_MIGRATIONS=true)");
            } else {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("../../migrations").run(&pool).await?;
                tracing::info!("Database migrations completed successfully");
            }

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-process store");
            Arc::new(MemoryStore::new())
        }
    };

    if config.admin_api_key.is_none() && config.server_api_key.is_none() {
        tracing::warn!("No API keys configured; every /api/games request will be rejected");
    }

    let http = HttpClient::new(config.http_timeout);
    let collaborators = Collaborators::from_env(&config, &http);
    let port = config.port;
    let state = AppState::new(config, store, collaborators);

    // Start the scheduler that opens brackets and closes rounds
    let _scheduler_handle = spawn_scheduler(state.clone());
    tracing::info!("Tournament scheduler started");

    // Start the background reminder service for tournaments about to start
    let _reminder_handle = spawn_reminder_service(state.clone());
    tracing::info!("Registration reminder service started");

    let app = build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
