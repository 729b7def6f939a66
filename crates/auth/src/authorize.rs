use thiserror::Error;

use crate::{Principal, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,
}

/// Admit only an authenticated, activated user.
///
/// - No IO
/// - No panics
pub fn require_activated(principal: &Principal) -> Result<&User, AuthzError> {
    let user = principal.user().ok_or(AuthzError::AuthenticationRequired)?;
    if !user.activated {
        return Err(AuthzError::InactiveAccount);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use bookshelf_core::UserId;

    use super::*;
    use crate::PasswordHash;

    fn user(activated: bool) -> User {
        User {
            id: UserId::new(1),
            created_at: Utc::now(),
            name: "Carol".to_string(),
            email: "carol@example.com".to_string(),
            password_hash: PasswordHash::from_stored("x"),
            activated,
            version: 1,
        }
    }

    #[test]
    fn anonymous_is_rejected() {
        assert_eq!(
            require_activated(&Principal::Anonymous),
            Err(AuthzError::AuthenticationRequired)
        );
        assert_eq!(Principal::default(), Principal::Anonymous);
    }

    #[test]
    fn inactive_user_is_rejected() {
        let principal = Principal::from(user(false));
        assert_eq!(require_activated(&principal), Err(AuthzError::InactiveAccount));
    }

    #[test]
    fn activated_user_is_admitted() {
        let principal = Principal::from(user(true));
        assert_eq!(require_activated(&principal).unwrap().id, UserId::new(1));
        assert!(principal.user().is_some());
    }
}
