//! Bearer token authentication resolving to an owner identity.
//!
//! Development: tokens look like `fd_dev_<owner_id>` and the suffix is the
//! owner. Production: replace with JWT + OAuth2 (jsonwebtoken crate).

use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::ApiError;

const DEV_TOKEN_PREFIX: &str = "fd_dev_";

/// The authenticated owner, inserted into request extensions by the
/// middleware and extracted by handlers.
#[derive(Debug, Clone)]
pub struct OwnerId(pub String);

/// Axum middleware that requires a valid bearer token on every API route.
/// Health and metrics stay unauthenticated.
pub async fn auth_middleware(mut req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if path.starts_with("/health") {
        return next.run(req).await;
    }

    match bearer_owner(req.headers()) {
        Some(owner) => {
            req.extensions_mut().insert(OwnerId(owner));
            next.run(req).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new(
                "unauthorized",
                "Authorization header with a valid bearer token required",
            )),
        )
            .into_response(),
    }
}

fn bearer_owner(headers: &HeaderMap) -> Option<String> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;
    let token = value.strip_prefix("Bearer ")?;
    let owner = token.strip_prefix(DEV_TOKEN_PREFIX)?;
    if owner.is_empty() {
        return None;
    }
    Some(owner.to_string())
}
