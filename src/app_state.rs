use sqlx::PgPool;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{replicate::ReplicateClient, storage::StorageClient};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub storage: Arc<StorageClient>,
    pub replicate: Arc<ReplicateClient>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        storage: StorageClient,
        replicate: ReplicateClient,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            storage: Arc::new(storage),
            replicate: Arc::new(replicate),
            config: Arc::new(config),
        }
    }
}
