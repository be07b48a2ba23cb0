//! Modelos de dominio: ficheros del Drive, chunks, registros del vector store
//! y fuentes que se muestran al usuario.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadatos de un fichero listado en el Drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub modified_at: String,
    pub url: String,
}

/// Trozo contiguo del texto extraído de un documento.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub source_file_id: String,
    pub source_file_name: String,
    pub source_url: String,
    pub sequence_index: usize,
    pub media_type: String,
    pub source_modified_at: String,
}

impl DocumentChunk {
    /// Identificador determinista del registro: reindexar el mismo chunk
    /// sobrescribe en lugar de duplicar.
    pub fn record_id(&self) -> String {
        record_id(&self.source_file_id, self.sequence_index)
    }
}

pub fn record_id(source_file_id: &str, sequence_index: usize) -> String {
    let key = format!("{source_file_id}_{sequence_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Chunk con su embedding, tal y como se persiste.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub record_id: String,
    pub chunk: DocumentChunk,
    pub embedding: Vec<f64>,
}

impl EmbeddedChunk {
    pub fn new(chunk: DocumentChunk, embedding: Vec<f64>) -> Self {
        Self {
            record_id: chunk.record_id(),
            chunk,
            embedding,
        }
    }
}

/// Chunk recuperado junto con su similitud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub score: f64,
}

/// Proyección de un resultado para mostrar al usuario, sin duplicados por fichero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub media_type: String,
}
