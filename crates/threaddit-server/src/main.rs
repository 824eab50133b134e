mod config;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use threaddit_api::media::MediaStore;
use threaddit_api::{AppStateInner, router};

use crate::config::{Config, MEDIA_ROUTE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "threaddit=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and media storage
    let db = threaddit_db::Database::open(&config.db_path)?;
    let media = MediaStore::new(config.media_dir.clone(), MEDIA_ROUTE).await?;

    let state = AppStateInner::new(db, config.jwt_secret.clone(), media);

    let app = Router::new()
        .merge(router(state))
        .nest_service(MEDIA_ROUTE, ServeDir::new(&config.media_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Threaddit subpost service listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
