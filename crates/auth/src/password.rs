//! Password hashing and reset tokens.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use tourbook_core::{DomainError, DomainResult};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Reset tokens stay valid for ten minutes.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

/// Hash a plaintext password with argon2id (PHC string).
pub fn hash_password(plain: &str) -> DomainResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DomainError::invariant(format!("password hashing failed: {e}")))
}

/// Check a plaintext password against a stored PHC string.
///
/// An unparseable stored hash never verifies.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is unparseable");
            false
        }
    }
}

/// Length and confirmation rules for a new password.
pub fn validate_new_password(password: &str, confirm: &str) -> DomainResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    if password != confirm {
        return Err(DomainError::validation("Passwords do not match"));
    }
    Ok(())
}

/// A freshly minted reset token.
///
/// `plain` goes to the user by email; only `hashed` is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub plain: String,
    pub hashed: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plain = hex::encode(bytes);
        Self {
            hashed: hash_reset_token(&plain),
            plain,
            expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }
}

/// sha256 hex digest used to look up a reset token.
pub fn hash_reset_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("pass1234").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("pass1234", &hash));
        assert!(!verify_password("pass12345", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "plaintext"));
    }

    #[test]
    fn short_password_is_rejected() {
        let err = validate_new_password("short", "short").unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("Password must be at least 8 characters long")
        );
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let err = validate_new_password("longenough", "longenougH").unwrap_err();
        assert_eq!(err, DomainError::validation("Passwords do not match"));
    }

    #[test]
    fn reset_token_stores_only_the_digest() {
        let now = Utc::now();
        let token = ResetToken::generate(now);
        assert_eq!(token.plain.len(), 64);
        assert_ne!(token.plain, token.hashed);
        assert_eq!(hash_reset_token(&token.plain), token.hashed);
        assert_eq!(token.expires_at, now + Duration::minutes(10));
    }
}
