use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{post, put},
};
use chrono::Utc;
use serde_json::json;

use bookshelf_auth::{
    NewUser, PasswordHash, TokenHash, TokenScope, normalize_email, validate_registration,
    validate_token_plaintext,
};
use bookshelf_core::Validator;
use bookshelf_infra::StoreError;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/v1/users", post(register_user))
        .route("/v1/users/activated", put(activate_user))
}

/// Create an inactive account and hand back its activation token.
pub async fn register_user(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::RegisterUserRequest>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&body.email);
    validate_registration(&body.name, &email, &body.password)?;

    let cost = services.settings.bcrypt_cost;
    let password = body.password;
    let password_hash =
        tokio::task::spawn_blocking(move || PasswordHash::with_cost(&password, cost)).await??;

    let user = services
        .models
        .users
        .insert(NewUser {
            name: body.name,
            email,
            password_hash,
            activated: false,
        })
        .await?;

    let token = services
        .models
        .tokens
        .issue(user.id, services.settings.activation_token_ttl, TokenScope::Activation)
        .await?;
    tracing::info!(user_id = %user.id, "user registered");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "user": user, "activation_token": token })),
    )
        .into_response())
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::ActivateUserRequest>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &body.token);
    v.finish()?;

    let hash = TokenHash::of(&body.token);
    let mut user = match services
        .models
        .users
        .get_for_token(TokenScope::Activation, &hash, Utc::now())
        .await
    {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            return Err(ApiError::field("token", "invalid or expired activation token"));
        }
        Err(other) => return Err(other.into()),
    };

    user.activated = true;
    user.version = services.models.users.update(&user).await?;

    services
        .models
        .tokens
        .delete_all_for_user(TokenScope::Activation, user.id)
        .await?;
    tracing::info!(user_id = %user.id, "user activated");

    Ok(Json(json!({ "user": user })).into_response())
}
