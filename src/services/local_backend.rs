//! Filesystem backend: `<root>/<id>.json`, with `/` in identifiers mapped to
//! subdirectories. Used as the development fallback, or as the only backend
//! when no blob container is configured.

use crate::models::metadata::MetadataDocument;
use crate::services::storage_service::{
    DOCUMENT_SUFFIX, StorageBackend, StoreError, StoreResult, parse_document,
};
use async_trait::async_trait;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

pub struct LocalFileBackend {
    root: PathBuf,
}

impl LocalFileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Identifiers are validated by `MetadataStore` before they get here.
    fn document_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}{}", id, DOCUMENT_SUFFIX))
    }

    /// Remove empty directories between `start` and the backend root.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.root) && current != self.root {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl StorageBackend for LocalFileBackend {
    fn backend_tag(&self) -> &'static str {
        "localfs"
    }

    async fn read(&self, id: &str) -> StoreResult<MetadataDocument> {
        let path = self.document_path(id);
        let bytes = fs::read(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::Io(err)
            }
        })?;
        parse_document(id, &bytes)
    }

    /// Write to a temp file, fsync, then rename over the target.
    async fn write(&self, id: &str, document: &MetadataDocument) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(document)?;
        let path = self.document_path(id);
        let parent = path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "document path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(&body).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }

        debug!("wrote {} ({} bytes)", path.display(), body.len());
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.document_path(id);
        match fs::remove_file(&path).await {
            Ok(_) => debug!("removed {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("{} already missing", path.display());
                return Ok(());
            }
            Err(err) => return Err(StoreError::Io(err)),
        }
        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::Io(err)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if let Some(id) = relative.strip_suffix(DOCUMENT_SUFFIX) {
                    ids.push(id.to_string());
                }
            }
        }

        Ok(ids)
    }
}
