use petshop::config::Config;
use petshop::handlers::{router, AppState};
use petshop::health;
use petshop::observability::{init_tracing, metrics::Metrics};
use petshop::store::{MemoryStore, PgStore, StoreSessionFactory};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 1. Load Config
    let config = Config::from_env()?;

    // 2. Initialize tracing
    init_tracing(config.log_format);
    info!(
        service_id = %config.service_id,
        http_bind = %config.http_bind,
        "{} {} starting up",
        config.project_name,
        config.project_version
    );

    // 3. Open the store
    let mut pg_store = None;
    let store: Arc<dyn StoreSessionFactory> = if config.uses_memory_store() {
        warn!("DATABASE_URL is memory://, records live only as long as this process");
        Arc::new(MemoryStore::new())
    } else {
        let pg = match PgStore::connect(
            &config.database_url,
            config.db_max_connections,
            config.db_acquire_timeout(),
        )
        .await
        {
            Ok(pg) => pg,
            Err(e) => {
                error!(error = %e, "failed to connect to database");
                return Err(e.into());
            }
        };
        pg.ensure_schema().await?;
        info!(max_connections = config.db_max_connections, "database ready");
        pg_store = Some(pg.clone());
        Arc::new(pg)
    };

    // 4. Build the app
    let metrics = Arc::new(Metrics::new());
    let state = AppState::new(store, metrics, config.service_id.clone())
        .with_project(config.project_name.clone(), config.project_version.clone());
    let app = router(state.clone());
    state.mark_ready();

    // 5. Serve until Ctrl-C
    let shutdown_state = state.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received, draining");
        shutdown_state.start_draining();
    };

    info!(bind = %config.http_bind, "HTTP server listening");
    if let Err(e) = health::start_server(&config.http_bind, app, shutdown).await {
        error!(error = %e, "HTTP server crashed");
        return Err(e);
    }

    if let Some(pg) = pg_store {
        pg.close().await;
    }
    info!("PetShop shutdown");
    Ok(())
}
