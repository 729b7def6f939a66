use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use bookshelf_auth::{AuthzError, CredentialError, TokenError};
use bookshelf_core::{DomainError, FieldErrors};
use bookshelf_infra::StoreError;

/// Everything a handler can fail with, already mapped to its HTTP meaning.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed body or query string.
    #[error("{0}")]
    BadRequest(String),

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(String),

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("invalid or missing authentication token")]
    InvalidAuthenticationToken,

    #[error(transparent)]
    Authz(#[from] AuthzError),

    /// Server-side fault. The detail is logged, never rendered.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn field(field: &str, message: &str) -> Self {
        ApiError::Validation(FieldErrors::single(field, message))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::EditConflict => ApiError::EditConflict,
            StoreError::DuplicateEmail => {
                ApiError::field("email", "a user with this email address already exists")
            }
            StoreError::InvalidSort(_) => ApiError::field("sort", "invalid sort value"),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(errors) => ApiError::Validation(errors),
            DomainError::InvalidId(_) => ApiError::NotFound,
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Validation(fields) => validation_error(fields),
            ApiError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", self.to_string()),
            ApiError::MethodNotAllowed(_) => {
                json_error(StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", self.to_string())
            }
            ApiError::EditConflict => json_error(StatusCode::CONFLICT, "edit_conflict", self.to_string()),
            ApiError::InvalidCredentials => {
                json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", self.to_string())
            }
            ApiError::InvalidAuthenticationToken => {
                let mut response =
                    json_error(StatusCode::UNAUTHORIZED, "invalid_token", self.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            ApiError::Authz(AuthzError::AuthenticationRequired) => json_error(
                StatusCode::UNAUTHORIZED,
                "authentication_required",
                AuthzError::AuthenticationRequired.to_string(),
            ),
            ApiError::Authz(AuthzError::InactiveAccount) => json_error(
                StatusCode::FORBIDDEN,
                "inactive_account",
                AuthzError::InactiveAccount.to_string(),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                server_error()
            }
        }
    }
}

pub fn server_error() -> Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "the server encountered a problem and could not process your request",
    )
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

fn validation_error(fields: FieldErrors) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        axum::Json(json!({
            "error": "validation_error",
            "message": "one or more fields are invalid",
            "fields": fields,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_core::PaginationError;

    #[test]
    fn store_outcomes_map_to_statuses() {
        let cases = [
            (StoreError::NotFound, StatusCode::NOT_FOUND),
            (StoreError::EditConflict, StatusCode::CONFLICT),
            (StoreError::DuplicateEmail, StatusCode::UNPROCESSABLE_ENTITY),
            (
                StoreError::InvalidSort(PaginationError::InvalidSort("x".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (StoreError::Timeout("get_book"), StatusCode::INTERNAL_SERVER_ERROR),
            (StoreError::storage("get_book", "boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn duplicate_email_is_reported_on_the_email_field() {
        let ApiError::Validation(fields) = ApiError::from(StoreError::DuplicateEmail) else {
            panic!("expected validation error");
        };
        assert_eq!(
            fields.get("email"),
            Some("a user with this email address already exists")
        );
    }

    #[test]
    fn invalid_token_challenges_for_bearer() {
        let response = ApiError::InvalidAuthenticationToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn authz_failures_split_401_and_403() {
        assert_eq!(
            ApiError::from(AuthzError::AuthenticationRequired).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthzError::InactiveAccount).into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
