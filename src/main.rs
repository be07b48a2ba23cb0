// Módulos de la aplicación
mod api;
mod app_state;
mod chunker;
mod config;
mod context;
mod drive;
mod embedding;
mod error;
mod ingest;
mod llm;
mod models;
mod neo4j_client;
mod rag;
mod vector_store;

#[cfg(test)]
mod test_support;

use crate::app_state::{AppState, Status};
use anyhow::{Context, Result};
use axum::Router;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración (fatal si falta algo)
    let cfg = config::AppConfig::from_env()?;

    // 3. Conectar a Neo4j y asegurar esquema + índice vectorial
    let graph = neo4j_client::connect_from_config(&cfg)
        .await
        .context("Error conectando a Neo4j")?;
    neo4j_client::ensure_schema(&graph, cfg.embedding_dimension)
        .await
        .context("Error asegurando el esquema de Neo4j")?;

    // 4. Construir los servicios una sola vez
    let llm_manager = Arc::new(
        llm::LlmManager::from_config(&cfg).context("Error inicializando LLM Manager")?,
    );
    let embeddings = embedding::EmbeddingGateway::new(llm_manager.clone(), cfg.embedding_dimension);
    let store = vector_store::VectorStoreClient::new(
        Arc::new(vector_store::Neo4jVectorStore::new(Arc::new(graph))),
        embeddings,
        cfg.match_threshold,
    );
    let source = Arc::new(
        drive::LocalDriveSource::new(&cfg.drive_root).context("Error abriendo el Drive")?,
    );
    let indexer = ingest::Indexer::new(
        source,
        store.clone(),
        chunker::Chunker::from_config(&cfg.chunking),
    );
    let rag = rag::RagEngine::new(store.clone(), llm_manager, &cfg.assistant_organization);

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        store,
        indexer: Arc::new(indexer),
        rag,
        status: Arc::new(Mutex::new(Status {
            is_busy: false,
            message: "Servidor listo.".to_string(),
            progress: 0.0,
        })),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 6. Configurar el router de la API
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 7. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
