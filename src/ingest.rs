//! Indexación de una carpeta del Drive: listado → extracción → troceado →
//! embeddings → upsert, fichero a fichero y chunk a chunk, sin paralelismo.
//!
//! Ningún fallo por elemento aborta la ejecución: se cuenta y se informa en
//! el `IndexingSummary`.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    app_state::Status,
    chunker::Chunker,
    drive::DocumentSource,
    error::{ItemFailure, PipelineError},
    models::{EmbeddedChunk, FileDescriptor},
    vector_store::VectorStoreClient,
};

/// Resumen de los resultados de una operación de indexación.
#[derive(Debug, Default, Clone, Serialize)]
pub struct IndexingSummary {
    pub files_found: u32,
    pub files_indexed: u32,
    pub files_skipped: u32,
    pub chunks_stored: usize,
    pub chunks_degraded: usize,
    pub chunks_failed: usize,
    pub failures: Vec<ItemFailure>,
}

/// Implementa cómo se mostrará el resumen como texto.
impl std::fmt::Display for IndexingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} ficheros encontrados, {} indexados, {} omitidos. {} chunks guardados ({} con embedding degradado), {} fallidos.",
            self.files_found,
            self.files_indexed,
            self.files_skipped,
            self.chunks_stored,
            self.chunks_degraded,
            self.chunks_failed
        )
    }
}

/// Resultado de indexar un único fichero.
#[derive(Debug, Default)]
struct FileReport {
    stored: usize,
    degraded: usize,
    failed: usize,
    failures: Vec<ItemFailure>,
}

pub struct Indexer {
    source: Arc<dyn DocumentSource>,
    store: VectorStoreClient,
    chunker: Chunker,
}

impl Indexer {
    pub fn new(source: Arc<dyn DocumentSource>, store: VectorStoreClient, chunker: Chunker) -> Self {
        Self {
            source,
            store,
            chunker,
        }
    }

    /// Indexa todos los ficheros bajo `folder_id`. Sólo falla si no se puede
    /// listar la carpeta.
    pub async fn index_folder(
        &self,
        folder_id: &str,
        status_arc: Arc<Mutex<Status>>,
    ) -> Result<IndexingSummary> {
        set_status(&status_arc, "Escaneando la carpeta del Drive...".to_string(), 0.0);
        let files = self.source.list_files_recursive(folder_id).await?;
        info!("Encontrados {} ficheros en '{folder_id}'.", files.len());

        let mut summary = IndexingSummary {
            files_found: files.len() as u32,
            ..Default::default()
        };
        let total_files = files.len().max(1) as f32;

        for (index, file) in files.iter().enumerate() {
            set_status(
                &status_arc,
                format!("[{}/{}] Procesando: {}...", index + 1, files.len(), file.name),
                index as f32 / total_files,
            );

            match self.index_file(file).await {
                Ok(report) => {
                    summary.files_indexed += 1;
                    summary.chunks_stored += report.stored;
                    summary.chunks_degraded += report.degraded;
                    summary.chunks_failed += report.failed;
                    summary.failures.extend(report.failures);
                }
                Err(err) => {
                    warn!("Omitido {}: {err}", file.name);
                    summary.files_skipped += 1;
                    summary.failures.push(ItemFailure::new(file.name.clone(), &err));
                }
            }
        }

        set_status(&status_arc, summary.to_string(), 1.0);
        info!("{summary}");
        Ok(summary)
    }

    async fn index_file(&self, file: &FileDescriptor) -> Result<FileReport, PipelineError> {
        let text = self
            .source
            .extract_text(file)
            .await
            .map_err(|e| PipelineError::Extraction {
                file: file.name.clone(),
                reason: e.to_string(),
            })?;

        let chunks = self.chunker.chunk(&text, file);
        if chunks.is_empty() {
            return Err(PipelineError::Extraction {
                file: file.name.clone(),
                reason: "el documento no contiene texto".to_string(),
            });
        }

        // Cada chunk se guarda nada más tener su embedding.
        let mut report = FileReport::default();
        for chunk in chunks {
            let embedding = self.store.embeddings().embed(&chunk.content).await;
            if let Some(err) = embedding.degradation() {
                report.degraded += 1;
                report.failures.push(ItemFailure::new(
                    format!("{}#{}", file.name, chunk.sequence_index),
                    &err,
                ));
            }

            let record = EmbeddedChunk::new(chunk, embedding.vector);
            let upserts = self.store.upsert(std::slice::from_ref(&record)).await;
            report.stored += upserts.stored();
            report.failed += upserts.failed();
            report.failures.extend(upserts.failures());
        }

        info!(
            "Indexado {} con {} chunks ({} degradados, {} fallidos).",
            file.name,
            report.stored,
            report.degraded,
            report.failed
        );
        Ok(report)
    }
}

fn set_status(status_arc: &Mutex<Status>, message: String, progress: f32) {
    let mut status = status_arc.lock().unwrap_or_else(|e| e.into_inner());
    status.message = message;
    status.progress = progress;
}
