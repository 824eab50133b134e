use std::sync::Arc;

use tracing::error;

use threaddit_db::Database;

use crate::error::ApiError;
use crate::media::MediaStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub media: MediaStore,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>, media: MediaStore) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret: jwt_secret.into(),
            media,
        })
    }
}

/// Run blocking DB work off the async runtime.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}
