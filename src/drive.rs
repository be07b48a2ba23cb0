//! Origen de documentos: listado recursivo de una carpeta del Drive y
//! extracción de su texto.
//!
//! `LocalDriveSource` trabaja sobre una copia sincronizada del Drive en disco
//! (`DRIVE_ROOT`). Los ids de carpeta y de fichero son rutas relativas a esa
//! raíz.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mime_guess::MimeGuess;
use tracing::{info, warn};
use url::Url;
use walkdir::WalkDir;

use crate::models::FileDescriptor;

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Todos los ficheros (no carpetas) bajo `folder_id`, a cualquier profundidad.
    async fn list_files_recursive(&self, folder_id: &str) -> Result<Vec<FileDescriptor>>;

    /// Texto del fichero. Un tipo no soportado devuelve texto vacío, no error.
    async fn extract_text(&self, file: &FileDescriptor) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct LocalDriveSource {
    root: PathBuf,
}

impl LocalDriveSource {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let root = root
            .canonicalize()
            .with_context(|| format!("No se pudo abrir la raíz del Drive {}", root.display()))?;
        Ok(Self { root })
    }

    /// Resuelve un id relativo sin permitir salir de la raíz.
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id.trim_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(anyhow!("Id fuera de la raíz del Drive: '{id}'"));
        }

        let path = self
            .root
            .join(relative)
            .canonicalize()
            .with_context(|| format!("No existe '{id}' en el Drive"))?;
        if !path.starts_with(&self.root) {
            return Err(anyhow!("Id fuera de la raíz del Drive: '{id}'"));
        }
        Ok(path)
    }

    fn describe(&self, path: &Path) -> Result<FileDescriptor> {
        let metadata = fs::metadata(path)?;
        let id = path
            .strip_prefix(&self.root)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| id.clone());
        let modified: DateTime<Utc> = metadata
            .modified()
            .ok()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(Utc::now);
        let media_type = MimeGuess::from_path(path)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let url = Url::from_file_path(path)
            .map(|u| u.to_string())
            .unwrap_or_default();

        Ok(FileDescriptor {
            id,
            name,
            media_type,
            size: metadata.len(),
            modified_at: modified.to_rfc3339(),
            url,
        })
    }
}

#[async_trait]
impl DocumentSource for LocalDriveSource {
    async fn list_files_recursive(&self, folder_id: &str) -> Result<Vec<FileDescriptor>> {
        let folder = self.resolve(folder_id)?;
        if !folder.is_dir() {
            return Err(anyhow!("'{folder_id}' no es una carpeta del Drive"));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&folder)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error recorriendo la carpeta {}: {e}", folder.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match self.describe(entry.path()) {
                Ok(descriptor) => files.push(descriptor),
                Err(e) => warn!("Saltando {}: {e}", entry.path().display()),
            }
        }

        Ok(files)
    }

    async fn extract_text(&self, file: &FileDescriptor) -> Result<String> {
        let path = self.resolve(&file.id)?;
        let media_type = file.media_type.clone();
        let name = file.name.clone();

        // pdf-extract es costoso y bloqueante.
        tokio::task::spawn_blocking(move || extract_from_path(&path, &media_type, &name)).await?
    }
}

fn extract_from_path(path: &Path, media_type: &str, name: &str) -> Result<String> {
    if media_type == "application/pdf" {
        return pdf_extract::extract_text(path)
            .map_err(|e| anyhow!("No se pudo extraer texto del PDF {name}: {e}"));
    }

    if media_type.starts_with("text/") {
        let bytes = fs::read(path)?;
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }

    // Word, Excel e imágenes quedan sin texto; el indexador los omite.
    info!("Saltando fichero con tipo no soportado ('{media_type}'): {name}");
    Ok(String::new())
}
