//! Consulta RAG.
//!
//! Flujo:
//!   1. Búsqueda vectorial de los `top_k` chunks más parecidos a la pregunta.
//!      Sin resultados se responde con un mensaje fijo, sin llamar al LLM.
//!   2. Ensamblado del contexto y de las fuentes.
//!   3. Una única llamada al LLM con el prompt de sistema y el de usuario.
//!      Si falla se devuelve un mensaje de error fijo y ninguna fuente.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    context,
    error::PipelineError,
    llm::CompletionService,
    models::Source,
    vector_store::VectorStoreClient,
};

pub const NO_DOCUMENTS_MESSAGE: &str = "I couldn't find any relevant documents to answer your question. \
Please try rephrasing your question or check if documents have been indexed.";

pub const GENERATION_ERROR_MESSAGE: &str =
    "I encountered an error generating a response. Please try again.";

/// Cómo terminó una consulta. El usuario ve el mismo mensaje para
/// `NoMatch` y `RetrievalFailed`; el operador puede distinguirlos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    Answered,
    NoMatch,
    RetrievalFailed,
    GenerationFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub outcome: QueryOutcome,
}

impl QueryResponse {
    fn no_documents(outcome: QueryOutcome) -> Self {
        Self {
            answer: NO_DOCUMENTS_MESSAGE.to_string(),
            sources: Vec::new(),
            outcome,
        }
    }
}

pub fn system_prompt(organization: &str) -> String {
    format!(
        "You are an intelligent document assistant for {organization}. \n\
Your role is to help users find information from their documents accurately and helpfully.

Guidelines:
- Answer questions based ONLY on the provided document context
- If the answer isn't in the documents, clearly state that
- Cite specific documents when providing information
- Be concise but thorough
- Use a professional, academic tone appropriate for a university setting
- If the documents contain conflicting information, acknowledge this
- Always prioritize accuracy over speculation"
    )
}

pub fn user_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following documents, please answer the question.

Documents:
{context}

Question: {question}

Please provide a clear, accurate answer based on the documents above. If the documents don't contain \n\
enough information to answer the question, please say so."
    )
}

#[derive(Clone)]
pub struct RagEngine {
    store: VectorStoreClient,
    completer: Arc<dyn CompletionService>,
    system_prompt: String,
}

impl RagEngine {
    pub fn new(
        store: VectorStoreClient,
        completer: Arc<dyn CompletionService>,
        organization: &str,
    ) -> Self {
        Self {
            store,
            completer,
            system_prompt: system_prompt(organization),
        }
    }

    pub async fn query(&self, question: &str, top_k: usize) -> QueryResponse {
        let results = match self.store.search(question, top_k).await {
            Ok(results) => results,
            Err(e) => {
                error!("Error recuperando documentos: {e}");
                return QueryResponse::no_documents(QueryOutcome::RetrievalFailed);
            }
        };

        if results.is_empty() {
            info!("Sin documentos relevantes para la pregunta.");
            return QueryResponse::no_documents(QueryOutcome::NoMatch);
        }

        let (context, sources) = context::assemble(&results);
        let prompt = user_prompt(&context, question);

        match self.completer.complete(&self.system_prompt, &prompt).await {
            Ok(answer) => {
                info!(
                    "Respuesta generada con {} chunks de {} ficheros.",
                    results.len(),
                    sources.len()
                );
                QueryResponse {
                    answer,
                    sources,
                    outcome: QueryOutcome::Answered,
                }
            }
            Err(e) => {
                let err = PipelineError::Generation(e.to_string());
                warn!("{err}");
                QueryResponse {
                    answer: GENERATION_ERROR_MESSAGE.to_string(),
                    sources: Vec::new(),
                    outcome: QueryOutcome::GenerationFailed,
                }
            }
        }
    }
}
