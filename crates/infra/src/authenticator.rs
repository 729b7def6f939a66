use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use bookshelf_auth::{TokenHash, TokenScope, User};

use crate::accounts::UserStore;
use crate::error::StoreError;

/// Resolves a bearer token to the user that owns it.
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Unknown, expired and wrong-scope tokens are all `NotFound`; callers
    /// cannot tell them apart.
    #[instrument(skip_all, err)]
    pub async fn resolve(&self, plaintext: &str, now: DateTime<Utc>) -> Result<User, StoreError> {
        let hash = TokenHash::of(plaintext);
        self.users
            .get_for_token(TokenScope::Authentication, &hash, now)
            .await
    }
}
