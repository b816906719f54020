//! Metadata store: one JSON document per page identifier.
//!
//! `MetadataStore` wraps a primary [`StorageBackend`] and an optional
//! fallback chosen at startup. Writes and deletes fall back only on
//! transport failures, and a failing fallback never hides the primary error.
//! The store does not own the render cache; callers that mutate must
//! invalidate afterwards.

use crate::models::metadata::MetadataDocument;
use async_trait::async_trait;
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

/// Suffix appended to an identifier to form the blob or file name.
pub const DOCUMENT_SUFFIX: &str = ".json";

const MAX_IDENTIFIER_LEN: usize = 512;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no metadata stored for `{0}`")]
    NotFound(String),
    #[error("stored metadata for `{id}` is invalid: {reason}")]
    InvalidDocument { id: String, reason: String },
    #[error("page identifier `{id}` is invalid: {reason}")]
    InvalidIdentifier { id: String, reason: String },
    #[error("storage transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Missing and unusable documents are handled the same way by callers.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::InvalidDocument { .. }
        )
    }

    fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::Io(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Transport(format!("request timed out: {}", err))
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable home for metadata documents.
///
/// Implementations address documents by `<id>.json`. `delete` of a missing
/// document succeeds. `list` returns identifiers with the suffix stripped,
/// in any order.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn read(&self, id: &str) -> StoreResult<MetadataDocument>;

    async fn write(&self, id: &str, document: &MetadataDocument) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn list(&self) -> StoreResult<Vec<String>>;
}

/// Parse a stored body and enforce the required fields.
///
/// The identifier always comes from the key, not from the body.
pub fn parse_document(id: &str, body: &[u8]) -> StoreResult<MetadataDocument> {
    let mut document: MetadataDocument =
        serde_json::from_slice(body).map_err(|err| StoreError::InvalidDocument {
            id: id.to_string(),
            reason: err.to_string(),
        })?;
    document
        .check_required()
        .map_err(|field| StoreError::InvalidDocument {
            id: id.to_string(),
            reason: format!("missing {}", field),
        })?;
    document.page_identifier = id.to_string();
    Ok(document)
}

/// Validate a page identifier before it is used to build a URL or path.
///
/// Allows ASCII letters, digits, `-`, `_`, `.` and `/` separators. Rejects
/// empty segments and `..` so identifiers cannot escape the container.
pub fn ensure_identifier_safe(id: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidIdentifier {
        id: id.to_string(),
        reason: reason.to_string(),
    };

    if id.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if id.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("too long"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(invalid(
            "allowed characters are letters, digits, '-', '_', '.' and '/'",
        ));
    }
    if id.split('/').any(|segment| segment.is_empty()) {
        return Err(invalid("must not contain empty path segments"));
    }
    if id.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(invalid("must not contain relative path segments"));
    }
    Ok(())
}

/// Primary backend plus optional fallback, selected at construction.
#[derive(Clone)]
pub struct MetadataStore {
    primary: Arc<dyn StorageBackend>,
    fallback: Option<Arc<dyn StorageBackend>>,
}

impl MetadataStore {
    pub fn new(primary: Arc<dyn StorageBackend>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    /// Use `fallback` when the primary backend cannot be reached.
    pub fn with_fallback(mut self, fallback: Arc<dyn StorageBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn backend_tags(&self) -> Vec<&'static str> {
        let mut tags = vec![self.primary.backend_tag()];
        if let Some(fallback) = &self.fallback {
            tags.push(fallback.backend_tag());
        }
        tags
    }

    /// Read a document. Documents missing `title` or `description` count as not found.
    pub async fn read(&self, id: &str) -> StoreResult<MetadataDocument> {
        ensure_identifier_safe(id)?;
        let primary_err = match self.primary.read(id).await {
            Ok(document) => return Ok(document),
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_err);
        };
        if !(primary_err.is_not_found() || primary_err.is_transport()) {
            return Err(primary_err);
        }

        match fallback.read(id).await {
            Ok(document) => {
                debug!(
                    "read `{}` from fallback {} after primary error: {}",
                    id,
                    fallback.backend_tag(),
                    primary_err
                );
                Ok(document)
            }
            Err(_) => Err(primary_err),
        }
    }

    /// Overwrite the document unconditionally (last writer wins).
    pub async fn write(&self, id: &str, document: &MetadataDocument) -> StoreResult<()> {
        ensure_identifier_safe(id)?;
        let primary_err = match self.primary.write(id, document).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        match &self.fallback {
            Some(fallback) if primary_err.is_transport() => {
                warn!(
                    "write of `{}` to {} failed ({}); trying {}",
                    id,
                    self.primary.backend_tag(),
                    primary_err,
                    fallback.backend_tag()
                );
                match fallback.write(id, document).await {
                    Ok(()) => Ok(()),
                    Err(fallback_err) => {
                        warn!("fallback write of `{}` also failed: {}", id, fallback_err);
                        Err(primary_err)
                    }
                }
            }
            _ => Err(primary_err),
        }
    }

    /// Delete the document. Deleting a missing document is not an error.
    ///
    /// A primary failure is always returned, even when the fallback copy was removed.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        ensure_identifier_safe(id)?;
        let primary_result = match self.primary.delete(id).await {
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        };

        let Some(fallback) = &self.fallback else {
            return primary_result;
        };

        // The fallback may hold a copy written while the primary was down.
        let fallback_result = match fallback.delete(id).await {
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        };

        match (primary_result, fallback_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(err)) => {
                debug!("fallback delete of `{}` failed: {}", id, err);
                Ok(())
            }
            (Err(err), _) => {
                warn!(
                    "delete of `{}` from {} failed: {}",
                    id,
                    self.primary.backend_tag(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Identifiers of every stored document, sorted and de-duplicated.
    ///
    /// The returned iterator is consumed once; call `list` again to re-enumerate.
    /// Fallback entries are merged only when the primary listing succeeded.
    pub async fn list(&self) -> StoreResult<std::vec::IntoIter<String>> {
        let mut ids = self.primary.list().await?;

        if let Some(fallback) = &self.fallback {
            match fallback.list().await {
                Ok(extra) => ids.extend(extra),
                Err(err) => debug!("listing fallback {} failed: {}", fallback.backend_tag(), err),
            }
        }

        ids.sort();
        ids.dedup();
        Ok(ids.into_iter())
    }
}
