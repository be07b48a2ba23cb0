use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::spawn;
use tracing::{error, info};

use crate::{
    app_state::{AppState, Status},
    rag::QueryResponse,
};

// --- Payloads de la API ---

#[derive(Deserialize)]
pub struct IndexPayload {
    folder_id: String,
}

#[derive(Deserialize)]
pub struct RagQueryPayload {
    question: String,
    top_k: Option<usize>,
}

/// Límite de documentos recuperados por pregunta.
const MAX_TOP_K: usize = 50;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(code: StatusCode, message: impl Into<String>) -> ApiError {
    (code, Json(json!({ "error": message.into() })))
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/index", post(index_handler))
        .route("/api/rag-query", post(rag_query_handler))
        .route("/api/status", get(status_handler))
        .route("/api/clear-index", post(clear_index_handler))
        .route("/api/health", get(health_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

/// Marca el estado como ocupado. Devuelve `false` si ya lo estaba.
fn try_acquire(state: &AppState, message: &str) -> bool {
    let mut status = state.status.lock().unwrap_or_else(|e| e.into_inner());
    if status.is_busy {
        return false;
    }
    status.is_busy = true;
    status.message = message.to_string();
    status.progress = 0.0;
    true
}

fn release(state: &AppState, message: String) {
    let mut status = state.status.lock().unwrap_or_else(|e| e.into_inner());
    status.is_busy = false;
    status.progress = 0.0;
    status.message = message;
}

// --- Handlers ---

#[axum::debug_handler]
async fn index_handler(
    State(state): State<AppState>,
    Json(payload): Json<IndexPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if !try_acquire(&state, "Iniciando indexación...") {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Ya hay una operación en curso.",
        ));
    }

    let folder_id = payload.folder_id.trim().to_string();
    spawn(async move {
        let result = state
            .indexer
            .index_folder(&folder_id, state.status.clone())
            .await;

        match result {
            Ok(summary) => {
                release(&state, format!("¡Indexación completada! {}", summary));
            }
            Err(err) => {
                error!("Error de indexación: {}", err);
                release(&state, format!("Error en la indexación: {}", err));
            }
        }
    });

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn rag_query_handler(
    State(state): State<AppState>,
    Json(payload): Json<RagQueryPayload>,
) -> Result<Json<QueryResponse>, ApiError> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "La pregunta está vacía."));
    }

    let top_k = payload.top_k.unwrap_or(state.config.top_k).min(MAX_TOP_K);
    Ok(Json(state.rag.query(question, top_k).await))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status.lock().unwrap_or_else(|e| e.into_inner()).clone())
}

#[axum::debug_handler]
async fn clear_index_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !try_acquire(&state, "Vaciando el índice...") {
        return Err(api_error(
            StatusCode::CONFLICT,
            "Ya hay una operación en curso.",
        ));
    }

    let result = state.store.clear_all().await;
    match result {
        Ok(deleted) => {
            release(&state, format!("Índice vaciado: {deleted} registros eliminados."));
            Ok(Json(json!({ "deleted": deleted })))
        }
        Err(e) => {
            error!("Error vaciando el índice: {}", e);
            release(&state, format!("Error vaciando el índice: {}", e));
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error vaciando el índice: {}", e),
            ))
        }
    }
}

#[axum::debug_handler]
async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match state.store.health_check().await {
        Ok(()) => Ok(Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!("Error en el health check del vector store: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take()
    {
        let _ = sender.send(());
    }
    StatusCode::OK
}
