//! Carga y gestión de configuración de la aplicación (Neo4j + LLM + Drive).

use std::{env, path::PathBuf, str::FromStr};

use crate::error::PipelineError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self, PipelineError> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            other => Err(PipelineError::Configuration(format!(
                "Proveedor LLM no soportado: {other}"
            ))),
        }
    }

    fn default_chat_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAI => "gpt-4o-mini",
        }
    }
}

/// Parámetros de troceado de documentos.
#[derive(Clone, Debug)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    pub llm_embedding_model: String,
    pub llm_chat_model: String,
    pub llm_max_tokens: u64,
    pub embedding_dimension: usize,

    pub drive_root: PathBuf,
    pub chunking: ChunkingConfig,
    pub match_threshold: f64,
    pub top_k: usize,
    pub assistant_organization: String,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self, PipelineError> {
        let cfg = Self::from_lookup(|key| env::var(key).ok())?;
        if !cfg.drive_root.is_dir() {
            return Err(PipelineError::Configuration(format!(
                "DRIVE_ROOT no es un directorio: {}",
                cfg.drive_root.display()
            )));
        }
        Ok(cfg)
    }

    /// Construye la configuración a partir de una función de búsqueda de
    /// claves. No toca el sistema de archivos.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PipelineError::Configuration(format!("Falta {key} en el entorno")))
        };

        let neo4j_uri = required("NEO4J_URI")?;
        let neo4j_user = required("NEO4J_USER")?;
        let neo4j_password = required("NEO4J_PASSWORD")?;
        let drive_root = PathBuf::from(required("DRIVE_ROOT")?);

        // Los embeddings siempre van contra OpenAI.
        required("OPENAI_API_KEY")?;

        let llm_provider =
            LlmProvider::from_str(&lookup("LLM_PROVIDER").unwrap_or_else(|| "anthropic".to_string()))?;
        if llm_provider == LlmProvider::Anthropic {
            required("ANTHROPIC_API_KEY")?;
        }

        let server_addr = lookup("SERVER_ADDR").unwrap_or_else(|| "127.0.0.1:3322".to_string());
        let llm_embedding_model = lookup("LLM_EMBEDDING_MODEL")
            .unwrap_or_else(|| "text-embedding-3-small".to_string());
        let llm_chat_model = lookup("LLM_CHAT_MODEL")
            .unwrap_or_else(|| llm_provider.default_chat_model().to_string());
        let assistant_organization = lookup("ASSISTANT_ORGANIZATION")
            .unwrap_or_else(|| "Wake Forest University".to_string());

        let chunking = ChunkingConfig {
            chunk_size: parse_or(&lookup, "CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_or(&lookup, "CHUNK_OVERLAP", 200)?,
        };
        if chunking.chunk_size == 0 || chunking.chunk_overlap >= chunking.chunk_size {
            return Err(PipelineError::Configuration(format!(
                "CHUNK_OVERLAP ({}) debe ser menor que CHUNK_SIZE ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }

        Ok(Self {
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            server_addr,
            llm_provider,
            llm_embedding_model,
            llm_chat_model,
            llm_max_tokens: parse_or(&lookup, "LLM_MAX_TOKENS", 4096)?,
            embedding_dimension: parse_or(&lookup, "EMBEDDING_DIMENSION", 1536)?,
            drive_root,
            chunking,
            match_threshold: parse_or(&lookup, "MATCH_THRESHOLD", 0.5)?,
            top_k: parse_or(&lookup, "TOP_K", 5)?,
            assistant_organization,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, PipelineError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            PipelineError::Configuration(format!("Valor inválido para {key}: '{raw}'"))
        }),
    }
}
