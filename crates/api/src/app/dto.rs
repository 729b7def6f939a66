use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use bookshelf_catalog::{BookFields, BookPatch, Pages};

use crate::app::errors::ApiError;

// -------------------------
// JSON body extractor
// -------------------------

/// `axum::Json` with every rejection (syntax, type, unknown field, size,
/// content type) rendered as a 400 in the API's error envelope.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(bad_body(rejection)),
        }
    }
}

fn bad_body(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}

// -------------------------
// Request DTOs
// -------------------------

/// Missing fields default to their zero value so validation reports them as
/// "must be provided" instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreateBookRequest {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub genres: Vec<String>,
    pub pages: Pages,
    pub language: String,
    pub publisher: String,
    pub year: i32,
}

impl From<CreateBookRequest> for BookFields {
    fn from(body: CreateBookRequest) -> Self {
        BookFields {
            isbn: body.isbn,
            title: body.title,
            author: body.author,
            genres: body.genres,
            pages: body.pages,
            language: body.language,
            publisher: body.publisher,
            year: body.year,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookRequest {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub genres: Option<Vec<String>>,
    pub pages: Option<Pages>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
}

impl From<UpdateBookRequest> for BookPatch {
    fn from(body: UpdateBookRequest) -> Self {
        BookPatch {
            isbn: body.isbn,
            title: body.title,
            author: body.author,
            genres: body.genres,
            pages: body.pages,
            language: body.language,
            publisher: body.publisher,
            year: body.year,
        }
    }
}

/// Raw list query. Numbers stay strings so a bad value becomes a field error.
#[derive(Debug, Default, Deserialize)]
pub struct ListBooksQuery {
    pub isbn: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    /// Comma-separated.
    pub genres: Option<String>,
    pub cursor: Option<String>,
    pub cursor_size: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivateUserRequest {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_fills_missing_fields_with_zero_values() {
        let body: CreateBookRequest = serde_json::from_str(r#"{"title": "Dune"}"#).unwrap();
        assert_eq!(body.title, "Dune");
        assert!(body.isbn.is_empty());
        assert_eq!(body.pages, Pages(0));
        assert_eq!(body.year, 0);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<CreateBookRequest>(r#"{"rating": 5}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
        assert!(serde_json::from_str::<UpdateBookRequest>(r#"{"rating": 5}"#).is_err());
    }

    #[test]
    fn pages_must_use_the_string_form() {
        let body: UpdateBookRequest = serde_json::from_str(r#"{"pages": "320 pages"}"#).unwrap();
        assert_eq!(body.pages, Some(Pages(320)));
        assert!(serde_json::from_str::<UpdateBookRequest>(r#"{"pages": 320}"#).is_err());
    }

    #[test]
    fn absent_patch_fields_stay_none() {
        let patch = BookPatch::from(
            serde_json::from_str::<UpdateBookRequest>(r#"{"year": 1990}"#).unwrap(),
        );
        assert_eq!(patch.year, Some(1990));
        assert!(patch.title.is_none());
        assert!(patch.genres.is_none());
    }
}
