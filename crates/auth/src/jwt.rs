//! HS256 session tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use tourbook_core::UserId;

use crate::claims::{SessionClaims, TokenValidationError, validate_claims};

/// Verifies a bearer token and yields its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenValidationError>;
}

/// Symmetric HS256 signer/validator for session tokens.
#[derive(Clone)]
pub struct Hs256Jwt {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256Jwt {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a session token for `user` issued at `now`.
    pub fn issue(&self, user: UserId, now: DateTime<Utc>) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = SessionClaims::new(user, now, self.ttl);
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    fn decode(&self, token: &str) -> Result<SessionClaims, TokenValidationError> {
        // Time checks run in `validate_claims` against the caller's clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

impl JwtValidator for Hs256Jwt {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenValidationError> {
        let claims = self.decode(token)?;
        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Hs256Jwt {
        Hs256Jwt::new(b"test-secret", Duration::days(90))
    }

    #[test]
    fn issued_token_validates() {
        let jwt = signer();
        let user = UserId::new();
        let now = Utc::now();
        let token = jwt.issue(user, now).unwrap();
        let claims = jwt.validate(&token, now).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.exp - claims.iat, Duration::days(90).num_seconds());
    }

    #[test]
    fn token_signed_with_other_secret_is_malformed() {
        let other = Hs256Jwt::new(b"other-secret", Duration::days(1));
        let token = other.issue(UserId::new(), Utc::now()).unwrap();
        let err = signer().validate(&token, Utc::now()).unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }

    #[test]
    fn expired_token_is_rejected_even_with_valid_signature() {
        let jwt = Hs256Jwt::new(b"test-secret", Duration::seconds(10));
        let issued = Utc::now() - Duration::minutes(5);
        let token = jwt.issue(UserId::new(), issued).unwrap();
        assert_eq!(jwt.validate(&token, Utc::now()), Err(TokenValidationError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = signer().validate("not.a.token", Utc::now()).unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }
}
