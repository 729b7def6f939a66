//! Opaque bearer tokens.
//!
//! A token is 16 random bytes rendered as unpadded base-32. Only the SHA-256
//! hash of that text is ever persisted; the plaintext is handed to the caller
//! once, at issue time.

use chrono::{DateTime, Duration, Utc};
use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use bookshelf_core::{UserId, Validator};

/// Bytes of entropy per token.
pub const TOKEN_ENTROPY_BYTES: usize = 16;

/// Length of the plaintext form (16 bytes base-32 without padding).
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The OS entropy source failed. Never retried.
    #[error("random source unavailable: {0}")]
    RandomSource(String),
}

/// What a token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Authentication,
    Activation,
}

impl TokenScope {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenScope::Authentication => "authentication",
            TokenScope::Activation => "activation",
        }
    }
}

impl core::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 of a token plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenHash([u8; 32]);

impl TokenHash {
    pub fn of(plaintext: &str) -> Self {
        Self(Sha256::digest(plaintext.as_bytes()).into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A freshly issued token.
///
/// Serializes to `{"token": .., "expiry": ..}`; hash, owner and scope stay
/// internal.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: TokenHash,
    #[serde(skip)]
    pub user_id: UserId,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    pub fn generate(
        user_id: UserId,
        ttl: Duration,
        scope: TokenScope,
        now: DateTime<Utc>,
    ) -> Result<Self, TokenError> {
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::RandomSource(e.to_string()))?;

        let plaintext = BASE32_NOPAD.encode(&bytes);
        let hash = TokenHash::of(&plaintext);

        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry: now + ttl,
            scope,
        })
    }
}

impl core::fmt::Debug for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("scope", &self.scope)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// Shape check run before any lookup.
pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(plaintext.len() == TOKEN_PLAINTEXT_LEN, "token", "must be 26 bytes long");
}
