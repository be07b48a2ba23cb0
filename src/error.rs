//! Taxonomía de errores del pipeline y estados explícitos por elemento.
//!
//! Sólo `Configuration` es fatal. El resto se recupera localmente y se
//! agrega en los informes de indexación o en el resultado de la consulta.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No se pudo obtener el texto de un documento.
    #[error("no se pudo extraer texto de '{file}': {reason}")]
    Extraction { file: String, reason: String },

    /// El servicio de embeddings falló y se sustituyó por un vector nulo.
    #[error("embedding degradado: {0}")]
    EmbeddingDegraded(String),

    /// Un registro concreto no se pudo persistir en el vector store.
    #[error("no se pudo persistir el registro {record_id}: {reason}")]
    Persistence { record_id: String, reason: String },

    /// La búsqueda vectorial falló.
    #[error("fallo en la recuperación: {0}")]
    Retrieval(String),

    /// El servicio de completions falló.
    #[error("fallo en la generación: {0}")]
    Generation(String),

    /// Faltan credenciales o identificadores al arrancar.
    #[error("configuración inválida: {0}")]
    Configuration(String),
}

impl PipelineError {
    /// Nombre estable del tipo de fallo, usado en informes y en la API.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Extraction { .. } => FailureKind::Extraction,
            Self::EmbeddingDegraded(_) => FailureKind::EmbeddingDegraded,
            Self::Persistence { .. } => FailureKind::Persistence,
            Self::Retrieval(_) => FailureKind::Retrieval,
            Self::Generation(_) => FailureKind::Generation,
            Self::Configuration(_) => FailureKind::Configuration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Extraction,
    EmbeddingDegraded,
    Persistence,
    Retrieval,
    Generation,
    Configuration,
}

/// Fallo recuperado durante un lote, listo para mostrarse al operador.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub kind: FailureKind,
    pub item: String,
    pub message: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            item: item.into(),
            message: err.to_string(),
        }
    }
}
