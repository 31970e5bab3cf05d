//! Authentication middleware
//!
//! A single shared token, presented as `Authorization: Bearer <token>` or as
//! the `token` query parameter. The header wins when both are present.
//! With no token configured every protected request fails closed.

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Authentication middleware
///
/// Applied to protected routes only; `/health` and `/rundown` bypass it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        error!("Rejecting {} {}: no API token configured", request.method(), request.uri().path());
        return Err(ApiError::Configuration);
    };

    match presented_token(request.headers(), request.uri()) {
        None => return Err(ApiError::Unauthorized("missing API token".to_string())),
        Some(token) if tokens_match(&token, expected) => {}
        Some(_) => {
            warn!("Invalid API token for {} {}", request.method(), request.uri().path());
            return Err(ApiError::Unauthorized("invalid API token".to_string()));
        }
    }

    Ok(next.run(request).await)
}

/// Token from the bearer header, else from the query string
fn presented_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    bearer_token(headers).or_else(|| {
        Query::<TokenQuery>::try_from_uri(uri)
            .ok()
            .and_then(|Query(query)| query.token)
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim().to_string())
}

/// Constant-time over the token bytes
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
