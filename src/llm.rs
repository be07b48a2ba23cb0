//! Abstracción sobre Rig para embeddings (OpenAI) y completions
//! (Anthropic u OpenAI).
//!
//! El pipeline sólo ve los traits `EmbeddingService` y `CompletionService`,
//! así que en los tests se sustituyen por dobles en memoria.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rig::client::{CompletionClient, EmbeddingsClient};
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel;
use rig::providers::{anthropic, openai};
use tracing::debug;

use crate::config::{AppConfig, LlmProvider};

/// Servicio externo que convierte un texto en un vector de dimensión fija.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn create_embedding(&self, text: &str) -> Result<Vec<f64>>;
}

/// Servicio externo de completions de un solo turno.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[derive(Clone)]
enum ChatClient {
    Anthropic(anthropic::Client),
    OpenAI(openai::Client),
}

/// Gestor de LLMs y embeddings. Los clientes se crean una sola vez y se
/// reutilizan durante toda la vida del proceso.
#[derive(Clone)]
pub struct LlmManager {
    pub embedding_model: String,
    pub chat_model: String,
    pub max_tokens: u64,
    embeddings_client: openai::Client,
    chat_client: ChatClient,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración. Las claves de API
    /// se leen del entorno (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`), que
    /// `AppConfig` ya ha validado.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let embeddings_client = openai::Client::from_env();
        let chat_client = match cfg.llm_provider {
            LlmProvider::Anthropic => ChatClient::Anthropic(anthropic::Client::from_env()),
            LlmProvider::OpenAI => ChatClient::OpenAI(embeddings_client.clone()),
        };

        Ok(Self {
            embedding_model: cfg.llm_embedding_model.clone(),
            chat_model: cfg.llm_chat_model.clone(),
            max_tokens: cfg.llm_max_tokens,
            embeddings_client,
            chat_client,
        })
    }
}

// ---------------------------------------------------------------------
// EMBEDDINGS
// ---------------------------------------------------------------------

#[async_trait]
impl EmbeddingService for LlmManager {
    async fn create_embedding(&self, text: &str) -> Result<Vec<f64>> {
        let model = self.embeddings_client.embedding_model(&self.embedding_model);
        let embeddings = model.embed_texts(vec![text.to_string()]).await?;

        embeddings
            .into_iter()
            .next()
            .map(|e| e.vec)
            .ok_or_else(|| anyhow!("El servicio de embeddings no devolvió ningún vector"))
    }
}

// ---------------------------------------------------------------------
// CHAT / COMPLETION
// ---------------------------------------------------------------------

#[async_trait]
impl CompletionService for LlmManager {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        debug!(model = %self.chat_model, "Llamando al servicio de completions");

        let answer = match &self.chat_client {
            ChatClient::Anthropic(client) => {
                let agent = client
                    .agent(&self.chat_model)
                    .preamble(system_prompt)
                    .max_tokens(self.max_tokens)
                    .build();
                agent.prompt(user_prompt).await?
            }
            ChatClient::OpenAI(client) => {
                let agent = client
                    .agent(&self.chat_model)
                    .preamble(system_prompt)
                    .max_tokens(self.max_tokens)
                    .build();
                agent.prompt(user_prompt).await?
            }
        };

        Ok(answer)
    }
}
