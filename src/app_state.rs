use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{config::AppConfig, ingest::Indexer, rag::RagEngine, vector_store::VectorStoreClient};

/// Dependencias construidas una vez en `main` y compartidas por los handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: VectorStoreClient,
    pub indexer: Arc<Indexer>,
    pub rag: RagEngine,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
    pub progress: f32, // Valor entre 0.0 y 1.0
}
