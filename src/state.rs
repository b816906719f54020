//! Shared state handed to every handler.

use crate::services::{admin_service::AdminService, metadata_service::MetadataService};
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppState {
    pub metadata: MetadataService,
    pub admin: AdminService,
    /// Storage backends in use, primary first.
    pub backend_tags: Vec<&'static str>,
    /// Local fallback directory probed by `/readyz`, if configured.
    pub fallback_dir: Option<PathBuf>,
}
