use thiserror::Error;

use tourbook_core::UserId;

use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Owner-gated action attempted by someone else.
    #[error("{0}")]
    NotOwner(String),
}

/// Require `role` to be one of `allowed`.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn restrict_to(role: Role, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden)
    }
}

/// Allow the document owner, or any admin.
pub fn ensure_owner_or_admin(
    actor: UserId,
    role: Role,
    owner: UserId,
    denial: &str,
) -> Result<(), AuthzError> {
    if role == Role::Admin || actor == owner {
        Ok(())
    } else {
        Err(AuthzError::NotOwner(denial.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_in_allowed_set_passes() {
        assert!(restrict_to(Role::LeadGuide, &[Role::Admin, Role::LeadGuide]).is_ok());
    }

    #[test]
    fn role_outside_allowed_set_is_forbidden() {
        let err = restrict_to(Role::Guide, &[Role::Admin, Role::LeadGuide]).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden);
        assert_eq!(err.to_string(), "You do not have permission to perform this action");
    }

    #[test]
    fn owner_and_admin_pass_owner_gate() {
        let owner = UserId::new();
        assert!(ensure_owner_or_admin(owner, Role::User, owner, "no").is_ok());
        assert!(ensure_owner_or_admin(UserId::new(), Role::Admin, owner, "no").is_ok());
    }

    #[test]
    fn stranger_fails_owner_gate_with_message() {
        let err = ensure_owner_or_admin(UserId::new(), Role::User, UserId::new(), "only yours").unwrap_err();
        assert_eq!(err.to_string(), "only yours");
    }
}
