//! Admin CRUD handlers. All routes here sit behind the bearer-token layer.

use crate::{
    errors::AppError,
    models::metadata::MetadataDocument,
    services::admin_service::{AdminView, SaveOutcome, Selection},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};

/// Header naming the operator performing a save.
pub const UPDATED_BY_HEADER: &str = "x-updated-by";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub page_identifiers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub selected: Option<String>,
}

/// `GET /admin/metadata`
pub async fn list_metadata(State(state): State<AppState>) -> Result<Json<ListResponse>, AppError> {
    let page_identifiers = state.admin.list().await?;
    Ok(Json(ListResponse { page_identifiers }))
}

/// `GET /admin/metadata/{*id}`: stored document, or the default with `persisted: false`.
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Selection>, AppError> {
    Ok(Json(state.admin.select(&id).await?))
}

/// `PUT /admin/metadata/{*id}`: full overwrite.
pub async fn put_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<MetadataDocument>, JsonRejection>,
) -> Result<Json<SaveOutcome>, AppError> {
    let Json(document) = payload?;
    let editor = headers
        .get(UPDATED_BY_HEADER)
        .and_then(|v| v.to_str().ok());
    Ok(Json(state.admin.save(&id, document, editor).await?))
}

/// `DELETE /admin/metadata/{*id}`: 204 whether or not the document existed.
pub async fn delete_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.admin.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /admin/view?selected=<id>`: list and selection re-fetched together.
pub async fn refresh_view(
    State(state): State<AppState>,
    Query(q): Query<ViewQuery>,
) -> Result<Json<AdminView>, AppError> {
    let selected = q.selected.as_deref().filter(|s| !s.is_empty());
    Ok(Json(state.admin.refresh(selected).await?))
}

/// `POST /admin/cache/clear`
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.admin.clear_cache();
    StatusCode::NO_CONTENT
}
