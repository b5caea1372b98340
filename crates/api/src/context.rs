use tourbook_auth::{Role, User};
use tourbook_core::UserId;

/// Authenticated caller, inserted by `middleware::protect`.
///
/// Must be present for all protected routes.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> UserId {
        self.0.id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn user(&self) -> &User {
        &self.0
    }
}

/// Best-effort identity, inserted by `middleware::identify`.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<User>);
