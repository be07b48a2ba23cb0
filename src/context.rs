//! Ensamblado del contexto para el prompt y de la lista de fuentes.

use std::collections::HashSet;

use crate::models::{SearchResult, Source};

pub const SNIPPET_CHARS: usize = 200;

/// Convierte los resultados ordenados en un bloque de contexto con etiquetas
/// `[Document i: <fichero>]` y en las fuentes sin repetir fichero (gana la
/// primera aparición).
pub fn assemble(results: &[SearchResult]) -> (String, Vec<Source>) {
    let context = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "[Document {}: {}]\n{}\n",
                i + 1,
                result.chunk.source_file_name,
                result.chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut seen = HashSet::new();
    let sources = results
        .iter()
        .filter(|result| seen.insert(result.chunk.source_file_id.as_str()))
        .map(|result| Source {
            title: result.chunk.source_file_name.clone(),
            url: result.chunk.source_url.clone(),
            snippet: snippet(&result.chunk.content),
            media_type: if result.chunk.media_type.is_empty() {
                "unknown".to_string()
            } else {
                result.chunk.media_type.clone()
            },
        })
        .collect();

    (context, sources)
}

/// Los primeros 200 caracteres, con "..." si se ha cortado.
pub fn snippet(content: &str) -> String {
    match content.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
