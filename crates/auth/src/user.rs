//! User accounts.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use bookshelf_core::{DomainResult, UserId, Validator, Versioned};

use crate::password::PasswordHash;

static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is a valid regex")
});

const MAX_NAME_BYTES: usize = 500;
const MIN_PASSWORD_BYTES: usize = 8;
const MAX_PASSWORD_BYTES: usize = 72;

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// A stored user account.
///
/// # Invariants
/// - `email` is unique across accounts (enforced by storage) and stored
///   trimmed and lower-cased.
/// - Only the password hash is kept; it is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: PasswordHash,
    pub activated: bool,
    pub version: i32,
}

impl Versioned for User {
    type Id = UserId;

    fn id(&self) -> UserId {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }
}

/// A user about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub activated: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(EMAIL_RX.is_match(email), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= MIN_PASSWORD_BYTES, "password", "must be at least 8 bytes long");
    v.check(
        password.len() <= MAX_PASSWORD_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.trim().is_empty(), "name", "must be provided");
    v.check(name.len() <= MAX_NAME_BYTES, "name", "must not be more than 500 bytes long");
}

/// Validate registration input before anything is hashed or stored.
pub fn validate_registration(name: &str, email: &str, password: &str) -> DomainResult<()> {
    let mut v = Validator::new();
    validate_name(&mut v, name);
    validate_email(&mut v, email);
    validate_password_plaintext(&mut v, password);
    v.finish()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
