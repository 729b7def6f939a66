use crate::User;

/// The caller behind a request.
///
/// `Anonymous` is a variant, not a distinguished user value: it has no id and
/// can never own a token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Principal {
    #[default]
    Anonymous,
    User(User),
}

impl Principal {
    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(user),
        }
    }
}

impl From<User> for Principal {
    fn from(value: User) -> Self {
        Principal::User(value)
    }
}
