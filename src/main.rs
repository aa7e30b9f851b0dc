use std::net::SocketAddr;
use std::sync::Arc;

use mokhtar_reminders::config::Config;
use mokhtar_reminders::db::Database;
use mokhtar_reminders::db_storage::ShopStorage;
use mokhtar_reminders::handlers::AppState;
use mokhtar_reminders::reminders::ReminderRunner;
use mokhtar_reminders::{obs, router};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database (with migrations), the
/// reminder job and its providers, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obs::init_tracing();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");
    db.run_migrations().await?;

    let reminders = ReminderRunner::from_config(&config, db.pool.clone())?;
    tracing::info!("Reminder job initialized");

    let app_state = Arc::new(AppState {
        storage: ShopStorage::new(db.pool.clone()),
        config: config.clone(),
        reminders,
    });

    let app = router::build_router(app_state)?;

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Peer addresses feed the per-IP rate limiter when no proxy headers are present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
