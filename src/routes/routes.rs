//! Defines routes for metadata lookups and the admin API.
//!
//! ## Structure
//! - **Public endpoints**
//!   - `GET /healthz`, `GET /readyz`
//!   - `GET /meta/{*id}`: resolved metadata as JSON
//!   - `GET /head/{*id}`: resolved metadata as `<head>` tags
//!
//! - **Admin endpoints** (bearer token required)
//!   - `GET    /admin/metadata`: list stored identifiers
//!   - `GET    /admin/metadata/{*id}`: open a document for editing
//!   - `PUT    /admin/metadata/{*id}`: save a full document
//!   - `DELETE /admin/metadata/{*id}`: delete a document
//!   - `GET    /admin/view`: list plus optional `?selected=` document
//!   - `POST   /admin/cache/clear`: drop the render cache
//!
//! The wildcard `*id` allows nested identifiers like `study-in-canada/careers`.

use crate::{
    auth_middleware::{AdminAuth, require_admin_token},
    handlers::{
        admin_handlers::{
            clear_cache, delete_metadata, get_metadata as admin_get_metadata, list_metadata,
            put_metadata, refresh_view,
        },
        health_handlers::{healthz, readyz},
        metadata_handlers::{get_head_tags, get_metadata},
    },
    state::AppState,
};
use axum::{
    Router, middleware,
    routing::{get, post},
};

/// Build the router. Admin routes are wrapped in the bearer-token check.
pub fn routes(auth: AdminAuth) -> Router<AppState> {
    let admin = Router::new()
        .route("/metadata", get(list_metadata))
        .route(
            "/metadata/{*id}",
            get(admin_get_metadata)
                .put(put_metadata)
                .delete(delete_metadata),
        )
        .route("/view", get(refresh_view))
        .route("/cache/clear", post(clear_cache))
        .route_layer(middleware::from_fn_with_state(auth, require_admin_token));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/meta/{*id}", get(get_metadata))
        .route("/head/{*id}", get(get_head_tags))
        .nest("/admin", admin)
}
