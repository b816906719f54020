//! Public, credential-free metadata lookups used by the page renderer.

use crate::{
    models::metadata::{MetadataDocument, PageMeta},
    services::metadata_service::MetadataSource,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    pub document: MetadataDocument,
    pub source: MetadataSource,
    pub page_meta: PageMeta,
}

/// `GET /meta/{*id}`: resolved document plus render-ready tags. Always 200.
pub async fn get_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<MetadataResponse> {
    let resolved = state.metadata.resolve(&id).await;
    let page_meta = resolved.page_meta();
    Json(MetadataResponse {
        document: resolved.document,
        source: resolved.source,
        page_meta,
    })
}

/// `GET /head/{*id}`: `<head>` fragment for server-side rendering.
pub async fn get_head_tags(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let html = state.metadata.resolve(&id).await.page_meta().to_head_html();
    let mut response = html.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}
