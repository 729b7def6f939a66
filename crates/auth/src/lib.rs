//! `bookshelf-auth` — credentials, bearer tokens and the caller identity.
//!
//! This crate is intentionally decoupled from HTTP and storage.

pub mod authorize;
pub mod password;
pub mod principal;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, require_activated};
pub use password::{CredentialError, DEFAULT_COST, PasswordHash};
pub use principal::Principal;
pub use token::{Token, TokenError, TokenHash, TokenScope, validate_token_plaintext};
pub use user::{
    NewUser, User, normalize_email, validate_email, validate_name, validate_password_plaintext,
    validate_registration,
};
