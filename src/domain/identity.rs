//! Local identity port

use crate::domain::shared::value_objects::UserId;
use std::sync::RwLock;

/// Source of the signed-in user's id
pub trait IdentityProvider: Send + Sync {
    /// `None` while nobody is signed in
    fn current_user(&self) -> Option<UserId>;
}

/// Identity fixed at construction, switchable for sign-in/sign-out
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user: RwLock<Option<UserId>>,
}

impl StaticIdentity {
    pub fn signed_in(user: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Some(UserId::new(user))),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: UserId) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_in_and_out() {
        let identity = StaticIdentity::signed_out();
        assert!(identity.current_user().is_none());

        identity.sign_in(UserId::new("u1"));
        assert_eq!(identity.current_user(), Some(UserId::new("u1")));

        identity.sign_out();
        assert!(identity.current_user().is_none());
    }
}
