//! Field-level input validation.
//!
//! A [`Validator`] collects at most one message per field; the first failed
//! check for a field wins. Callers run every check and then turn the
//! collected map into a [`DomainError::Validation`](crate::DomainError).

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use serde::Serialize;

use crate::error::{DomainError, DomainResult};

/// Field name → message map produced by a failed validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), message.into());
        Self(errors)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl core::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field} {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Accumulates field errors.
#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` for `field` unless the field already has one.
    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .0
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    /// Record `message` for `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Finish validation: `Ok(())` when nothing failed.
    pub fn finish(self) -> DomainResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self.errors))
        }
    }
}

/// True when `value` is one of `permitted`.
pub fn permitted_value<T: PartialEq + ?Sized>(value: &T, permitted: &[&T]) -> bool {
    permitted.iter().any(|p| *p == value)
}

/// True when every element of `values` is distinct.
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut v = Validator::new();
        v.check(false, "title", "must be provided");
        v.check(false, "title", "must not be more than 500 bytes long");
        v.check(true, "author", "must be provided");

        let errors = v.errors().clone();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("title"), Some("must be provided"));
        assert!(errors.get("author").is_none());
    }

    #[test]
    fn finish_reports_collected_errors() {
        let mut v = Validator::new();
        v.check(false, "year", "must not be in the future");

        match v.finish() {
            Err(DomainError::Validation(errors)) => {
                assert_eq!(errors.get("year"), Some("must not be in the future"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_validator_finishes_ok() {
        assert!(Validator::new().finish().is_ok());
    }

    #[test]
    fn errors_serialize_as_flat_object() {
        let errors = FieldErrors::single("email", "must be provided");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({ "email": "must be provided" }));
    }

    #[test]
    fn helpers() {
        assert!(permitted_value("id", &["id", "-id"]));
        assert!(!permitted_value("name", &["id", "-id"]));
        assert!(unique(&["fantasy", "horror"]));
        assert!(!unique(&["fantasy", "fantasy"]));
    }
}
