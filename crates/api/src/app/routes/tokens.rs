use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;

use bookshelf_auth::{
    AuthzError, Principal, TokenScope, normalize_email, validate_email, validate_password_plaintext,
};
use bookshelf_core::Validator;
use bookshelf_infra::StoreError;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route(
        "/v1/tokens/authentication",
        post(create_authentication_token).delete(revoke_authentication_tokens),
    )
}

/// Log in. An unknown e-mail and a wrong password are the same 401.
pub async fn create_authentication_token(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::LoginRequest>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&body.email);
    let mut v = Validator::new();
    validate_email(&mut v, &email);
    validate_password_plaintext(&mut v, &body.password);
    v.finish()?;

    let user = match services.models.users.get_by_email(&email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(other) => return Err(other.into()),
    };

    let stored = user.password_hash.clone();
    let password = body.password;
    let matches = tokio::task::spawn_blocking(move || stored.matches(&password)).await??;
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    let token = services
        .models
        .tokens
        .issue(user.id, services.settings.auth_token_ttl, TokenScope::Authentication)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    )
        .into_response())
}

/// Log out everywhere: every token the caller owns is deleted.
pub async fn revoke_authentication_tokens(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, ApiError> {
    let user = principal.user().ok_or(AuthzError::AuthenticationRequired)?;

    services.models.tokens.revoke_all(user.id).await?;
    tracing::info!(user_id = %user.id, "tokens revoked");

    Ok(Json(json!({ "message": "all tokens revoked" })).into_response())
}
