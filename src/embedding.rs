//! Pasarela de embeddings: nunca falla. Si el servicio externo da error
//! devuelve un vector nulo de la dimensión configurada y lo marca como
//! degradado, para que un chunk defectuoso no aborte el lote.

use std::sync::Arc;

use tracing::warn;

use crate::{error::PipelineError, llm::EmbeddingService};

#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingStatus {
    Ok,
    Degraded(String),
}

#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f64>,
    pub status: EmbeddingStatus,
}

impl Embedding {
    /// El error de la taxonomía correspondiente, si el embedding está degradado.
    pub fn degradation(&self) -> Option<PipelineError> {
        match &self.status {
            EmbeddingStatus::Ok => None,
            EmbeddingStatus::Degraded(reason) => {
                Some(PipelineError::EmbeddingDegraded(reason.clone()))
            }
        }
    }
}

#[derive(Clone)]
pub struct EmbeddingGateway {
    service: Arc<dyn EmbeddingService>,
    dimension: usize,
}

impl EmbeddingGateway {
    pub fn new(service: Arc<dyn EmbeddingService>, dimension: usize) -> Self {
        Self { service, dimension }
    }

    pub async fn embed(&self, text: &str) -> Embedding {
        match self.service.create_embedding(text).await {
            Ok(vector) if vector.len() == self.dimension => Embedding {
                vector,
                status: EmbeddingStatus::Ok,
            },
            Ok(vector) => self.degraded(format!(
                "dimensión inesperada: {} (se esperaba {})",
                vector.len(),
                self.dimension
            )),
            Err(e) => self.degraded(e.to_string()),
        }
    }

    fn degraded(&self, reason: String) -> Embedding {
        warn!("Embedding degradado a vector nulo: {reason}");
        Embedding {
            vector: vec![0.0; self.dimension],
            status: EmbeddingStatus::Degraded(reason),
        }
    }
}
