//! Demo server: loads model declarations from `REST_CONFIG_PATH`, serves them from PostgreSQL
//! when `DATABASE_URL` is set and from memory otherwise.

use axum::Router;
use resource_rest::{
    common_routes, load_from_path, resolve, resource_routes, AppState, DataStore, MemoryStore, PgStore, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("resource_rest=info".parse()?))
        .init();

    let settings = Settings::from_env();
    let config = load_from_path(&settings.config_path).await?;
    let model = resolve(&config)?;

    let store: Arc<dyn DataStore> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            tracing::info!("using postgres store");
            Arc::new(PgStore::new(pool, model.entities.clone()))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(model, store).with_body_limit(settings.body_limit);
    let app = Router::new().merge(common_routes()).merge(resource_routes(state));

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
