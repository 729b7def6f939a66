use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use bookshelf_catalog::{BookFields, BookPatch, SORT_SAFELIST};
use bookshelf_core::{BookId, ExpectedVersion, Filters, Validator};
use bookshelf_infra::BookFilter;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

const DEFAULT_CURSOR: i64 = 1;
const DEFAULT_CURSOR_SIZE: i64 = 20;
const DEFAULT_SORT: &str = "id";

pub fn router() -> Router {
    Router::new()
        .route("/v1/books", get(list_books).post(create_book))
        .route(
            "/v1/books/:id",
            get(show_book).patch(update_book).delete(delete_book),
        )
}

pub async fn create_book(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<dto::CreateBookRequest>,
) -> Result<Response, ApiError> {
    let fields = BookFields::from(body);
    fields.validated()?;

    let book = services.models.books.insert(fields).await?;
    tracing::info!(book_id = %book.id, "book created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/v1/books/{}", book.id))],
        Json(json!({ "book": book })),
    )
        .into_response())
}

pub async fn show_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let book = services.models.books.get(parse_id(&id)?).await?;
    Ok(Json(json!({ "book": book })).into_response())
}

/// Partial update guarded by the stored version.
///
/// With `X-Expected-Version`, a mismatch is a conflict before anything is
/// written. Either way the write itself is compare-and-increment, so a
/// concurrent change between the read and the write is also a conflict.
pub async fn update_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<dto::UpdateBookRequest>,
) -> Result<Response, ApiError> {
    let mut book = services.models.books.get(parse_id(&id)?).await?;

    if !expected_version(&headers)?.admits(&book) {
        return Err(ApiError::EditConflict);
    }

    BookPatch::from(body).apply(&mut book.fields);
    book.fields.validated()?;

    book.version = services.models.books.update(&book).await?;
    tracing::info!(book_id = %book.id, version = book.version, "book updated");

    Ok(Json(json!({ "book": book })).into_response())
}

pub async fn delete_book(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    services.models.books.delete(id).await?;
    tracing::info!(book_id = %id, "book deleted");

    Ok(Json(json!({ "message": "book successfully deleted" })).into_response())
}

pub async fn list_books(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::ListBooksQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (filter, filters) = parse_list_query(query)?;

    let (books, metadata) = services.models.books.list(&filter, &filters).await?;
    Ok(Json(json!({ "books": books, "metadata": metadata })).into_response())
}

/// Ids that cannot name a row are "not found", never a bad request.
fn parse_id(raw: &str) -> Result<BookId, ApiError> {
    let id: BookId = raw.parse()?;
    if !id.is_assignable() {
        return Err(ApiError::NotFound);
    }
    Ok(id)
}

fn expected_version(headers: &HeaderMap) -> Result<ExpectedVersion, ApiError> {
    let Some(raw) = headers.get(EXPECTED_VERSION_HEADER) else {
        return Ok(ExpectedVersion::Any);
    };
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i32>().ok())
        .map(ExpectedVersion::Exact)
        .ok_or_else(|| ApiError::BadRequest("X-Expected-Version must be an integer".to_string()))
}

fn parse_list_query(query: dto::ListBooksQuery) -> Result<(BookFilter, Filters), ApiError> {
    let mut v = Validator::new();

    let cursor = read_int(&mut v, query.cursor.as_deref(), "cursor", DEFAULT_CURSOR);
    let cursor_size = read_int(&mut v, query.cursor_size.as_deref(), "cursor_size", DEFAULT_CURSOR_SIZE);
    let sort = query.sort.unwrap_or_else(|| DEFAULT_SORT.to_string());

    let filters = Filters::new(cursor, cursor_size, sort, SORT_SAFELIST);
    filters.validate(&mut v);
    v.finish()?;

    let filter = BookFilter {
        isbn: query.isbn.unwrap_or_default(),
        title: query.title.unwrap_or_default(),
        author: query.author.unwrap_or_default(),
        genres: query
            .genres
            .map(|csv| {
                csv.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    };

    Ok((filter, filters))
}

/// Missing or empty means `default`; anything else must be an integer.
fn read_int(v: &mut Validator, raw: Option<&str>, key: &str, default: i64) -> i64 {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn list_query_defaults() {
        let (filter, filters) = parse_list_query(dto::ListBooksQuery::default()).unwrap();
        assert_eq!(filter, BookFilter::default());
        assert_eq!(filters.cursor, 1);
        assert_eq!(filters.cursor_size, 20);
        assert_eq!(filters.sort, "id");
    }

    #[test]
    fn genres_are_comma_separated() {
        let query = dto::ListBooksQuery {
            genres: Some("fantasy, adventure,,".to_string()),
            ..Default::default()
        };
        let (filter, _) = parse_list_query(query).unwrap();
        assert_eq!(filter.genres, vec!["fantasy", "adventure"]);
    }

    #[test]
    fn bad_pagination_values_are_field_errors() {
        let query = dto::ListBooksQuery {
            cursor: Some("abc".to_string()),
            cursor_size: Some("500".to_string()),
            sort: Some("publisher".to_string()),
            ..Default::default()
        };
        let Err(ApiError::Validation(errors)) = parse_list_query(query) else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("cursor"), Some("must be an integer value"));
        assert_eq!(errors.get("cursor_size"), Some("must be a maximum of 100"));
        assert_eq!(errors.get("sort"), Some("invalid sort value"));
    }

    #[test]
    fn ids_below_one_are_not_found() {
        assert!(matches!(parse_id("0"), Err(ApiError::NotFound)));
        assert!(matches!(parse_id("-5"), Err(ApiError::NotFound)));
        assert!(matches!(parse_id("abc"), Err(ApiError::NotFound)));
        assert_eq!(parse_id("7").unwrap(), BookId::new(7));
    }

    #[test]
    fn expected_version_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(expected_version(&headers).unwrap(), ExpectedVersion::Any);

        headers.insert(EXPECTED_VERSION_HEADER, HeaderValue::from_static("3"));
        assert_eq!(expected_version(&headers).unwrap(), ExpectedVersion::Exact(3));

        headers.insert(EXPECTED_VERSION_HEADER, HeaderValue::from_static("three"));
        assert!(matches!(expected_version(&headers), Err(ApiError::BadRequest(_))));
    }
}
