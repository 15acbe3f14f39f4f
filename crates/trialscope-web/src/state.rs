//! Shared application state for the web server.

use std::sync::Arc;

use trialscope_common::ApiError;
use trialscope_db::{Database, TrialRepository};
use trialscope_ingestion::JsonRecordStore;

/// Shared state injected into every Axum handler.
pub struct AppState {
    /// Absent when no database is configured or the connection failed.
    pub db: Option<Arc<Database>>,
    /// Fallback read path.
    pub store: JsonRecordStore,
}

impl AppState {
    pub fn new(db: Option<Arc<Database>>, store: JsonRecordStore) -> Self {
        Self { db, store }
    }

    /// State serving only from the JSON store.
    pub fn json_only(store: JsonRecordStore) -> Self {
        Self::new(None, store)
    }

    pub fn trials(&self) -> Option<TrialRepository> {
        self.db.clone().map(TrialRepository::new)
    }

    pub fn db_type(&self) -> &'static str {
        if self.db.is_some() { "postgresql" } else { "json_files" }
    }

    /// Run a JSON store read on the blocking pool.
    pub async fn read_store<T, F>(&self, read: F) -> Result<T, ApiError>
    where
        F: FnOnce(&JsonRecordStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || read(&store))
            .await
            .map_err(|e| ApiError::Internal(format!("record store read failed: {}", e)))
    }
}

pub type SharedState = Arc<AppState>;
