use std::sync::Arc;

use tracing::error;

use warbler_db::Database;

use crate::error::AppError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub secret_key: String,
    pub session_ttl: chrono::Duration,
}

impl AppStateInner {
    pub fn new(db: Database, secret_key: impl Into<String>, session_ttl: chrono::Duration) -> AppState {
        Arc::new(Self {
            db,
            secret_key: secret_key.into(),
            session_ttl,
        })
    }
}

/// Run a blocking DB call off the async runtime.
pub async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&Database) -> warbler_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::internal(e)
        })?
        .map_err(AppError::from)
}
