use std::sync::Arc;

use crate::error::AppError;
use crate::services::file_service::DirectoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DirectoryStore>,
}

impl AppState {
    pub fn new(store: DirectoryStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Runs a store operation on the blocking pool so filesystem calls only
    /// stall the request that issued them.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&DirectoryStore) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| AppError::General(format!("store task failed: {e}")))?
    }
}
