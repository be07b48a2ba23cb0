//! Vector store de los chunks indexados.
//!
//! API pública:
//!   - `VectorStore`: backend con upsert por id, búsqueda por similitud y borrado total.
//!   - `Neo4jVectorStore`: implementación sobre nodos `:Chunk` de Neo4j.
//!   - `VectorStoreClient`: une la pasarela de embeddings con el backend y
//!     aplica la política de degradar en lugar de fallar.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use neo4rs::{query, Graph, Row};
use tracing::{info, warn};

use crate::{
    embedding::EmbeddingGateway,
    error::{ItemFailure, PipelineError},
    models::{DocumentChunk, EmbeddedChunk, SearchResult},
    neo4j_client::CHUNK_VECTOR_INDEX,
};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserta o reemplaza el registro con `record.record_id`, refrescando
    /// su `created_at`.
    async fn upsert_record(&self, record: &EmbeddedChunk) -> Result<()>;

    /// Los `k` registros más parecidos con `score >= threshold`, en orden
    /// descendente de similitud.
    async fn similarity_search(
        &self,
        embedding: &[f64],
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>>;

    /// Borra todos los registros. Devuelve cuántos había.
    async fn delete_all(&self) -> Result<u64>;

    async fn health_check(&self) -> Result<()>;
}

// ---------------------------------------------------------------------
// NEO4J
// ---------------------------------------------------------------------

#[derive(Clone)]
pub struct Neo4jVectorStore {
    graph: Arc<Graph>,
}

impl Neo4jVectorStore {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl VectorStore for Neo4jVectorStore {
    async fn upsert_record(&self, record: &EmbeddedChunk) -> Result<()> {
        let chunk = &record.chunk;
        self.graph
            .run(
                query(
                    "MERGE (c:Chunk {id: $id})
                     SET c.content = $content, c.embedding = $embedding,
                         c.file_id = $file_id, c.file_name = $file_name, c.file_url = $file_url,
                         c.chunk_id = $chunk_id, c.mime_type = $mime_type,
                         c.modified_time = $modified_time, c.created_at = $created_at",
                )
                .param("id", record.record_id.clone())
                .param("content", chunk.content.clone())
                .param("embedding", record.embedding.clone())
                .param("file_id", chunk.source_file_id.clone())
                .param("file_name", chunk.source_file_name.clone())
                .param("file_url", chunk.source_url.clone())
                .param("chunk_id", chunk.sequence_index as i64)
                .param("mime_type", chunk.media_type.clone())
                .param("modified_time", chunk.source_modified_at.clone())
                .param("created_at", Utc::now().to_rfc3339()),
            )
            .await?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        embedding: &[f64],
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>> {
        let mut cursor = self
            .graph
            .execute(
                query(
                    "CALL db.index.vector.queryNodes($index_name, $k, $embedding)
                     YIELD node, score
                     WHERE score >= $threshold
                     RETURN node.content AS content, node.file_id AS file_id,
                            node.file_name AS file_name, node.file_url AS file_url,
                            node.chunk_id AS chunk_id, node.mime_type AS mime_type,
                            node.modified_time AS modified_time, score
                     ORDER BY score DESC",
                )
                .param("index_name", CHUNK_VECTOR_INDEX)
                .param("k", i64::try_from(k).unwrap_or(i64::MAX))
                .param("embedding", embedding.to_vec())
                .param("threshold", threshold),
            )
            .await?;

        let mut output = Vec::new();
        while let Some(row) = cursor.next().await? {
            output.push(search_result_from_row(&row)?);
        }
        output.truncate(k);

        Ok(output)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut cursor = self
            .graph
            .execute(query(
                "MATCH (c:Chunk) DETACH DELETE c RETURN count(c) AS deleted",
            ))
            .await?;

        let deleted = match cursor.next().await? {
            Some(row) => row.get::<i64>("deleted").unwrap_or(0),
            None => 0,
        };
        Ok(deleted.max(0) as u64)
    }

    async fn health_check(&self) -> Result<()> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }
}

fn search_result_from_row(row: &Row) -> Result<SearchResult> {
    let field = |name: &str| -> Result<String> {
        row.get::<String>(name)
            .ok_or_else(|| anyhow!("Falta campo '{name}' en resultado de Neo4j"))
    };

    let score: f64 = row
        .get("score")
        .ok_or_else(|| anyhow!("Falta campo 'score' en resultado de Neo4j"))?;
    let chunk_id: i64 = row
        .get("chunk_id")
        .ok_or_else(|| anyhow!("Falta campo 'chunk_id' en resultado de Neo4j"))?;

    Ok(SearchResult {
        chunk: DocumentChunk {
            content: field("content")?,
            source_file_id: field("file_id")?,
            source_file_name: field("file_name")?,
            // Campos opcionales: registros antiguos pueden no tenerlos.
            source_url: row.get("file_url").unwrap_or_default(),
            sequence_index: chunk_id.max(0) as usize,
            media_type: row.get("mime_type").unwrap_or_default(),
            source_modified_at: row.get("modified_time").unwrap_or_default(),
        },
        score,
    })
}

// ---------------------------------------------------------------------
// CLIENTE
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertStatus {
    Stored,
    Failed(String),
}

/// Resultado de un upsert, registro a registro y en el orden de entrada.
#[derive(Debug, Default, Clone)]
pub struct UpsertReport {
    pub statuses: Vec<(String, UpsertStatus)>,
}

impl UpsertReport {
    pub fn stored(&self) -> usize {
        self.statuses
            .iter()
            .filter(|(_, status)| *status == UpsertStatus::Stored)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.statuses.len() - self.stored()
    }

    pub fn failures(&self) -> Vec<ItemFailure> {
        self.statuses
            .iter()
            .filter_map(|(record_id, status)| match status {
                UpsertStatus::Stored => None,
                UpsertStatus::Failed(reason) => Some(ItemFailure::new(
                    record_id.clone(),
                    &PipelineError::Persistence {
                        record_id: record_id.clone(),
                        reason: reason.clone(),
                    },
                )),
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct VectorStoreClient {
    store: Arc<dyn VectorStore>,
    embeddings: EmbeddingGateway,
    match_threshold: f64,
}

impl VectorStoreClient {
    pub fn new(store: Arc<dyn VectorStore>, embeddings: EmbeddingGateway, match_threshold: f64) -> Self {
        Self {
            store,
            embeddings,
            match_threshold,
        }
    }

    pub fn embeddings(&self) -> &EmbeddingGateway {
        &self.embeddings
    }

    /// Upsert secuencial. Un registro que falla no aborta el resto.
    pub async fn upsert(&self, records: &[EmbeddedChunk]) -> UpsertReport {
        let mut report = UpsertReport::default();

        for record in records {
            let status = match self.store.upsert_record(record).await {
                Ok(()) => UpsertStatus::Stored,
                Err(e) => {
                    warn!(
                        "No se pudo persistir el chunk {} de '{}': {e}",
                        record.chunk.sequence_index, record.chunk.source_file_name
                    );
                    UpsertStatus::Failed(e.to_string())
                }
            };
            report.statuses.push((record.record_id.clone(), status));
        }

        report
    }

    /// Búsqueda con el fallo diferenciado de la ausencia de resultados.
    pub async fn search(
        &self,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embeddings.embed(query_text).await;
        if let Some(err) = embedding.degradation() {
            // Un vector nulo no se parece a nada: no tiene sentido buscar.
            return Err(PipelineError::Retrieval(err.to_string()));
        }

        let mut results = self
            .store
            .similarity_search(&embedding.vector, k, self.match_threshold)
            .await
            .map_err(|e| PipelineError::Retrieval(e.to_string()))?;

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);
        Ok(results)
    }

    /// Borrado total e irreversible del índice.
    pub async fn clear_all(&self) -> Result<u64> {
        let deleted = self.store.delete_all().await?;
        info!("Vector store vaciado: {deleted} registros eliminados.");
        Ok(deleted)
    }

    pub async fn health_check(&self) -> Result<()> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chunker::Chunker,
        models::FileDescriptor,
        test_support::{sample_file, BagOfWordsEmbedder, FailingEmbedder, InMemoryVectorStore},
    };

    const DIM: usize = 256;

    fn client_with(store: Arc<InMemoryVectorStore>) -> VectorStoreClient {
        let gateway = EmbeddingGateway::new(Arc::new(BagOfWordsEmbedder::new(DIM)), DIM);
        VectorStoreClient::new(store, gateway, 0.1)
    }

    async fn embed_all(client: &VectorStoreClient, file: &FileDescriptor, text: &str) -> Vec<EmbeddedChunk> {
        let mut records = Vec::new();
        for chunk in Chunker::new(40, 10).chunk(text, file) {
            let embedding = client.embeddings().embed(&chunk.content).await;
            records.push(EmbeddedChunk::new(chunk, embedding.vector));
        }
        records
    }

    #[tokio::test]
    async fn reindexing_same_document_overwrites_records() {
        let store = Arc::new(InMemoryVectorStore::default());
        let client = client_with(store.clone());
        let file = sample_file("historia/fundacion.txt", "fundacion.txt");
        let text = "Wake Forest was founded in 1834. It is located in Winston-Salem.";

        let records = embed_all(&client, &file, text).await;
        let first = client.upsert(&records).await;
        let ids_first = store.ids();
        let first_stamp = store.created_at(&records[0].record_id).unwrap();

        let records = embed_all(&client, &file, text).await;
        let second = client.upsert(&records).await;

        assert_eq!(first.stored(), records.len());
        assert_eq!(second.stored(), records.len());
        assert_eq!(store.ids(), ids_first);
        assert_eq!(store.len(), records.len());
        assert!(store.created_at(&records[0].record_id).unwrap() >= first_stamp);
        assert_eq!(store.upsert_calls(), 2 * records.len());
    }

    #[tokio::test]
    async fn failing_record_does_not_abort_batch() {
        let store = Arc::new(InMemoryVectorStore::default());
        let client = client_with(store.clone());
        let file = sample_file("a.txt", "a.txt");
        let records = embed_all(&client, &file, &"Frase de prueba. ".repeat(10)).await;
        assert!(records.len() >= 3);

        store.fail_on(&records[1].record_id);
        let report = client.upsert(&records).await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.stored(), records.len() - 1);
        assert_eq!(report.statuses[1].0, records[1].record_id);
        assert!(matches!(report.statuses[1].1, UpsertStatus::Failed(_)));
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, crate::error::FailureKind::Persistence);
        assert_eq!(store.len(), records.len() - 1);
    }

    #[tokio::test]
    async fn search_orders_by_score_and_truncates() {
        let store = Arc::new(InMemoryVectorStore::default());
        let client = client_with(store.clone());

        for (i, text) in [
            "Wake Forest was founded in 1834.",
            "The library opens at nine.",
            "Forest trails around the campus.",
        ]
        .iter()
        .enumerate()
        {
            let file = sample_file(&format!("f{i}"), &format!("f{i}.txt"));
            let records = embed_all(&client, &file, text).await;
            client.upsert(&records).await;
        }

        let results = client
            .search("When was Wake Forest founded?", 2)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert!(results.len() <= 2);
        assert_eq!(results[0].chunk.source_file_name, "f0.txt");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn backend_failure_is_a_retrieval_error() {
        let store = Arc::new(InMemoryVectorStore::default());
        store.fail_searches();
        let client = client_with(store);

        assert!(matches!(
            client.search("lo que sea", 5).await,
            Err(PipelineError::Retrieval(_))
        ));
    }

    #[tokio::test]
    async fn degraded_query_embedding_is_a_retrieval_failure() {
        let store = Arc::new(InMemoryVectorStore::default());
        let gateway = EmbeddingGateway::new(Arc::new(FailingEmbedder), DIM);
        let client = VectorStoreClient::new(store.clone(), gateway, 0.1);

        assert!(matches!(
            client.search("pregunta", 5).await,
            Err(PipelineError::Retrieval(_))
        ));
        assert_eq!(store.search_calls(), 0);
    }

    #[tokio::test]
    async fn clear_all_wipes_every_record() {
        let store = Arc::new(InMemoryVectorStore::default());
        let client = client_with(store.clone());
        let file = sample_file("a.txt", "a.txt");
        let records = embed_all(&client, &file, "Texto uno. Texto dos. Texto tres.").await;
        client.upsert(&records).await;

        let deleted = client.clear_all().await.unwrap();
        assert_eq!(deleted as usize, records.len());
        assert_eq!(store.len(), 0);
        assert!(client.search("Texto", 5).await.unwrap().is_empty());
    }
}
