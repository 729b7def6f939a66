//! One-way password hashing.
//!
//! Hashes are salted bcrypt at a fixed work factor per deployment. The
//! plaintext never leaves the call that hashes or verifies it.

use thiserror::Error;

/// Work factor used when a deployment does not configure one.
pub const DEFAULT_COST: u32 = 12;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The hashing primitive failed (bad cost, corrupt stored hash, ...).
    #[error("password hash computation failed: {0}")]
    Hash(String),
}

/// A stored bcrypt hash.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn from_plaintext(plaintext: &str) -> Result<Self, CredentialError> {
        Self::with_cost(plaintext, DEFAULT_COST)
    }

    pub fn with_cost(plaintext: &str, cost: u32) -> Result<Self, CredentialError> {
        bcrypt::hash(plaintext, cost)
            .map(Self)
            .map_err(|e| CredentialError::Hash(e.to_string()))
    }

    /// Wrap a hash read back from storage.
    pub fn from_stored(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Ok(false)` on mismatch; `Err` only when the hash cannot be evaluated.
    pub fn matches(&self, plaintext: &str) -> Result<bool, CredentialError> {
        bcrypt::verify(plaintext, &self.0).map_err(|e| CredentialError::Hash(e.to_string()))
    }
}

impl core::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // bcrypt minimum; keeps the suite fast.
    const TEST_COST: u32 = 4;

    #[test]
    fn matches_original_plaintext() {
        let hash = PasswordHash::with_cost("pa55word!", TEST_COST).unwrap();
        assert!(hash.matches("pa55word!").unwrap());
    }

    #[test]
    fn different_plaintext_is_a_mismatch_not_an_error() {
        let hash = PasswordHash::with_cost("pa55word!", TEST_COST).unwrap();
        assert_eq!(hash.matches("pa55word?"), Ok(false));
        assert_eq!(hash.matches(""), Ok(false));
    }

    #[test]
    fn hashes_are_salted() {
        let a = PasswordHash::with_cost("same-secret", TEST_COST).unwrap();
        let b = PasswordHash::with_cost("same-secret", TEST_COST).unwrap();
        assert_ne!(a, b);
        assert_ne!(a.as_str(), "same-secret");
    }

    #[test]
    fn corrupt_stored_hash_is_an_error() {
        let hash = PasswordHash::from_stored("not-a-bcrypt-hash");
        assert!(matches!(hash.matches("anything"), Err(CredentialError::Hash(_))));
    }

    #[test]
    fn debug_output_is_redacted() {
        let hash = PasswordHash::with_cost("secret-value", TEST_COST).unwrap();
        assert_eq!(format!("{hash:?}"), "PasswordHash(..)");
    }
}
