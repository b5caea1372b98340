use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tourbook_core::UserId;

/// Session token payload: `{ id, iat, exp }` with unix-second timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user the session belongs to.
    #[serde(rename = "id")]
    pub sub: UserId,

    /// Issued-at (unix seconds).
    pub iat: i64,

    /// Expiration (unix seconds).
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(sub: UserId, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Deterministically validate session claims against `now`.
///
/// Note: this validates the *claims* only. Signature checks live in [`crate::jwt`].
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_claims_are_valid() {
        let now = Utc::now();
        let claims = SessionClaims::new(UserId::new(), now, Duration::days(90));
        assert_eq!(validate_claims(&claims, now), Ok(()));
    }

    #[test]
    fn claims_past_exp_are_expired() {
        let issued = Utc::now() - Duration::days(2);
        let claims = SessionClaims::new(UserId::new(), issued, Duration::days(1));
        assert_eq!(validate_claims(&claims, Utc::now()), Err(TokenValidationError::Expired));
    }

    #[test]
    fn future_iat_is_rejected() {
        let now = Utc::now();
        let claims = SessionClaims::new(UserId::new(), now + Duration::hours(1), Duration::days(1));
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::NotYetValid));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let now = Utc::now();
        let claims = SessionClaims { sub: UserId::new(), iat: now.timestamp(), exp: now.timestamp() };
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::InvalidTimeWindow));
    }

    #[test]
    fn subject_serializes_as_id() {
        let claims = SessionClaims::new(UserId::new(), Utc::now(), Duration::days(1));
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["id"], claims.sub.to_string());
        assert!(json.get("sub").is_none());
    }
}
