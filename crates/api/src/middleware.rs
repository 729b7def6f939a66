use axum::{
    extract::{Extension, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use bookshelf_auth::{Principal, require_activated, validate_token_plaintext};
use bookshelf_core::Validator;
use bookshelf_infra::{Authenticator, StoreError};

use crate::app::errors::ApiError;

/// Resolve the caller and attach a [`Principal`] to the request.
///
/// No `Authorization` header means `Principal::Anonymous`. A header that is
/// present but malformed, or carries an unknown or expired token, is
/// rejected with 401 here.
pub async fn authenticate(
    State(authenticator): State<Authenticator>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let principal = match resolve_principal(&authenticator, req.headers()).await {
        Ok(principal) => principal,
        Err(err) => return with_vary(err.into_response()),
    };

    req.extensions_mut().insert(principal);
    with_vary(next.run(req).await)
}

/// Give the router's bare 405 the JSON error envelope, keeping `Allow`.
pub async fn json_method_not_allowed(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }

    let allow = response.headers().get(header::ALLOW).cloned();
    let mut replaced = ApiError::MethodNotAllowed(method).into_response();
    if let Some(allow) = allow {
        replaced.headers_mut().insert(header::ALLOW, allow);
    }
    replaced
}

/// Admit only activated users. Must run inside [`authenticate`].
pub async fn require_activated_user(
    Extension(principal): Extension<Principal>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    require_activated(&principal)?;
    Ok(next.run(req).await)
}

async fn resolve_principal(
    authenticator: &Authenticator,
    headers: &HeaderMap,
) -> Result<Principal, ApiError> {
    let Some(token) = extract_bearer(headers)? else {
        return Ok(Principal::Anonymous);
    };

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &token);
    if !v.is_valid() {
        return Err(ApiError::InvalidAuthenticationToken);
    }

    match authenticator.resolve(&token, Utc::now()).await {
        Ok(user) => Ok(Principal::User(user)),
        Err(StoreError::NotFound) => Err(ApiError::InvalidAuthenticationToken),
        Err(other) => Err(other.into()),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header
        .to_str()
        .map_err(|_| ApiError::InvalidAuthenticationToken)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::InvalidAuthenticationToken)?
        .trim();

    if token.is_empty() {
        return Err(ApiError::InvalidAuthenticationToken);
    }

    Ok(Some(token.to_string()))
}

fn with_vary(mut response: Response) -> Response {
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}
