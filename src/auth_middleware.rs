//! Bearer-token check for the admin API.
//!
//! A single static token guards every `/admin` route. Missing, malformed and
//! mismatched credentials all yield 401 before any handler runs.

use crate::errors::AppError;
use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct AdminAuth {
    /// `None` disables the admin API entirely.
    token: Option<Arc<str>>,
}

impl AdminAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }

    fn verify(&self, presented: &str) -> bool {
        match &self.token {
            Some(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Reject requests without `Authorization: Bearer <admin token>`.
pub async fn require_admin_token(
    State(auth): State<AdminAuth>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("expected a bearer token"))?
        .trim();

    if !auth.verify(token) {
        debug!("rejected admin request to {}", request.uri().path());
        return Err(AppError::unauthorized("invalid admin token"));
    }

    Ok(next.run(request).await)
}
