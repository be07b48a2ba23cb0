//! Troceado de documentos en ventanas solapadas que prefieren cortar en fin
//! de frase o de línea.
//!
//! Las posiciones se cuentan en caracteres, no en bytes, para no partir
//! nunca un carácter UTF-8.

use std::ops::Range;

use crate::{
    config::ChunkingConfig,
    models::{DocumentChunk, FileDescriptor},
};

#[derive(Debug, Clone)]
pub struct Chunker {
    window: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` debe ser menor que `window`; `AppConfig` ya lo valida.
    pub fn new(window: usize, overlap: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            overlap: overlap.min(window - 1),
        }
    }

    pub fn from_config(cfg: &ChunkingConfig) -> Self {
        Self::new(cfg.chunk_size, cfg.chunk_overlap)
    }

    /// Trocea `text` y adjunta los metadatos del fichero a cada chunk.
    ///
    /// Los chunks que quedan vacíos tras el `trim` no se emiten, y los
    /// índices de los restantes son `0, 1, 2, …` sin huecos.
    pub fn chunk(&self, text: &str, file: &FileDescriptor) -> Vec<DocumentChunk> {
        let chars: Vec<char> = text.trim().chars().collect();

        self.spans_of(&chars)
            .into_iter()
            .filter_map(|span| {
                let content: String = chars[span].iter().collect();
                let content = content.trim();
                (!content.is_empty()).then(|| content.to_string())
            })
            .enumerate()
            .map(|(sequence_index, content)| DocumentChunk {
                content,
                source_file_id: file.id.clone(),
                source_file_name: file.name.clone(),
                source_url: file.url.clone(),
                sequence_index,
                media_type: file.media_type.clone(),
                source_modified_at: file.modified_at.clone(),
            })
            .collect()
    }

    /// Rangos (en caracteres, sobre el texto ya recortado) de cada ventana.
    #[cfg(test)]
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        let chars: Vec<char> = text.trim().chars().collect();
        self.spans_of(&chars)
    }

    fn spans_of(&self, chars: &[char]) -> Vec<Range<usize>> {
        let len = chars.len();
        let mut spans = Vec::new();
        let mut start = 0;

        while start < len {
            let mut end = start + self.window;

            if end < len {
                // Último '.' o salto de línea de la ventana, sólo si pasa de la mitad.
                let break_point = chars[start..end]
                    .iter()
                    .rposition(|c| *c == '.' || *c == '\n');
                if let Some(bp) = break_point {
                    if bp * 2 > self.window {
                        end = start + bp + 1;
                    }
                }
            } else {
                end = len;
            }

            spans.push(start..end);

            start = if end < len {
                end.saturating_sub(self.overlap).max(start + 1)
            } else {
                end
            };
        }

        spans
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}
