//! Cursor-based pagination: request validation, limit/offset arithmetic and
//! result metadata.
//!
//! A cursor is a 1-based page number. Sorting is restricted to a safelist
//! because sort targets are interpolated into query text and cannot be bound
//! as parameters.

use serde::Serialize;
use thiserror::Error;

use crate::validation::{Validator, permitted_value};

/// Largest cursor accepted from a caller.
pub const MAX_CURSOR: i64 = 10_000_000;

/// Largest page size accepted from a caller.
pub const MAX_CURSOR_SIZE: i64 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// The sort key is not in the configured safelist.
    #[error("unsafe sort parameter: {0}")]
    InvalidSort(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Pagination and sort request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub cursor: i64,
    pub cursor_size: i64,
    /// Sort key: a column name, optionally prefixed with `-` for descending.
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    pub fn new(
        cursor: i64,
        cursor_size: i64,
        sort: impl Into<String>,
        sort_safelist: &'static [&'static str],
    ) -> Self {
        Self {
            cursor,
            cursor_size,
            sort: sort.into(),
            sort_safelist,
        }
    }

    pub fn validate(&self, v: &mut Validator) {
        v.check(self.cursor > 0, "cursor", "must be greater than zero");
        v.check(self.cursor <= MAX_CURSOR, "cursor", "must be a maximum of 10 million");
        v.check(self.cursor_size > 0, "cursor_size", "must be greater than zero");
        v.check(self.cursor_size <= MAX_CURSOR_SIZE, "cursor_size", "must be a maximum of 100");
        v.check(
            permitted_value(self.sort.as_str(), self.sort_safelist),
            "sort",
            "invalid sort value",
        );
    }

    /// The column to order by, only if the sort key is safelisted.
    pub fn sort_column(&self) -> Result<&str, PaginationError> {
        if permitted_value(self.sort.as_str(), self.sort_safelist) {
            Ok(self.sort.trim_start_matches('-'))
        } else {
            Err(PaginationError::InvalidSort(self.sort.clone()))
        }
    }

    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn limit(&self) -> i64 {
        self.cursor_size.max(0)
    }

    /// Rows to skip before the current page. Saturates instead of
    /// overflowing for cursors that never went through `validate`.
    pub fn offset(&self) -> i64 {
        (self.cursor.max(1) - 1).saturating_mul(self.limit())
    }
}

/// Metadata describing a page of results.
///
/// Empty (all zero) when the query matched nothing; empty metadata serializes
/// as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_cursor: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub cursor_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_cursor: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_cursor: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

impl Metadata {
    pub fn calculate(total_records: i64, cursor: i64, cursor_size: i64) -> Self {
        if total_records <= 0 || cursor_size <= 0 {
            return Self::default();
        }

        Self {
            current_cursor: cursor,
            cursor_size,
            first_cursor: 1,
            last_cursor: (total_records + cursor_size - 1) / cursor_size,
            total_records,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
