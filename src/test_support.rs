//! Dobles de prueba para los servicios externos.

use std::{
    collections::{hash_map::DefaultHasher, BTreeSet, HashMap, HashSet},
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    drive::DocumentSource,
    llm::{CompletionService, EmbeddingService},
    models::{EmbeddedChunk, FileDescriptor, SearchResult},
    vector_store::VectorStore,
};

pub fn sample_file(id: &str, name: &str) -> FileDescriptor {
    FileDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        media_type: "text/plain".to_string(),
        size: 0,
        modified_at: "2025-03-01T10:00:00+00:00".to_string(),
        url: format!("https://drive.example/{id}"),
    }
}

/// Bolsa de palabras: cada palabra suma 1 en la posición de su hash.
pub struct BagOfWordsEmbedder {
    dimension: usize,
    fail_marker: Option<String>,
}

impl BagOfWordsEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail_marker: None,
        }
    }

    /// Falla para cualquier texto que contenga `marker`.
    pub fn failing_on(dimension: usize, marker: &str) -> Self {
        Self {
            dimension,
            fail_marker: Some(marker.to_string()),
        }
    }
}

#[async_trait]
impl EmbeddingService for BagOfWordsEmbedder {
    async fn create_embedding(&self, text: &str) -> Result<Vec<f64>> {
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker.as_str()) {
                bail!("cuota agotada");
            }
        }

        let mut vector = vec![0.0; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % self.dimension as u64) as usize] += 1.0;
        }
        Ok(vector)
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingService for FailingEmbedder {
    async fn create_embedding(&self, _text: &str) -> Result<Vec<f64>> {
        Err(anyhow!("servicio de embeddings no disponible"))
    }
}

/// Completer que devuelve una respuesta fija y guarda los prompts recibidos.
pub struct ScriptedCompleter {
    reply: Result<String, String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedCompleter {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompleter {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

struct StoredRecord {
    record: EmbeddedChunk,
    created_at: DateTime<Utc>,
}

/// Vector store en memoria con similitud coseno.
#[derive(Default)]
pub struct InMemoryVectorStore {
    records: Mutex<HashMap<String, StoredRecord>>,
    failing_ids: Mutex<HashSet<String>>,
    fail_searches: Mutex<bool>,
    upsert_calls: AtomicUsize,
    search_calls: AtomicUsize,
    last_search_k: Mutex<Option<usize>>,
}

impl InMemoryVectorStore {
    pub fn fail_on(&self, record_id: &str) {
        self.failing_ids.lock().unwrap().insert(record_id.to_string());
    }

    pub fn fail_searches(&self) {
        *self.fail_searches.lock().unwrap() = true;
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.records.lock().unwrap().keys().cloned().collect()
    }

    pub fn record(&self, record_id: &str) -> Option<EmbeddedChunk> {
        self.records
            .lock()
            .unwrap()
            .get(record_id)
            .map(|r| r.record.clone())
    }

    pub fn created_at(&self, record_id: &str) -> Option<DateTime<Utc>> {
        self.records
            .lock()
            .unwrap()
            .get(record_id)
            .map(|r| r.created_at)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn last_search_k(&self) -> Option<usize> {
        *self.last_search_k.lock().unwrap()
    }
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_record(&self, record: &EmbeddedChunk) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_ids.lock().unwrap().contains(&record.record_id) {
            bail!("conexión rechazada");
        }
        self.records.lock().unwrap().insert(
            record.record_id.clone(),
            StoredRecord {
                record: record.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn similarity_search(
        &self,
        embedding: &[f64],
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_search_k.lock().unwrap() = Some(k);
        if *self.fail_searches.lock().unwrap() {
            bail!("timeout en la RPC de búsqueda");
        }

        let mut results: Vec<SearchResult> = self
            .records
            .lock()
            .unwrap()
            .values()
            .map(|r| SearchResult {
                chunk: r.record.chunk.clone(),
                score: cosine(embedding, &r.record.embedding),
            })
            .filter(|r| r.score >= threshold)
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(k);
        Ok(results)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut records = self.records.lock().unwrap();
        let deleted = records.len() as u64;
        records.clear();
        Ok(deleted)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Drive en memoria. Un texto `None` simula un fallo de extracción.
#[derive(Default)]
pub struct InMemorySource {
    files: Vec<(FileDescriptor, Option<String>)>,
}

impl InMemorySource {
    pub fn with_file(mut self, file: FileDescriptor, text: Option<&str>) -> Self {
        self.files.push((file, text.map(str::to_string)));
        self
    }
}

#[async_trait]
impl DocumentSource for InMemorySource {
    async fn list_files_recursive(&self, folder_id: &str) -> Result<Vec<FileDescriptor>> {
        Ok(self
            .files
            .iter()
            .filter(|(f, _)| folder_id.is_empty() || f.id.starts_with(folder_id))
            .map(|(f, _)| f.clone())
            .collect())
    }

    async fn extract_text(&self, file: &FileDescriptor) -> Result<String> {
        self.files
            .iter()
            .find(|(f, _)| f.id == file.id)
            .and_then(|(_, text)| text.clone())
            .ok_or_else(|| anyhow!("no se pudo descargar {}", file.name))
    }
}
