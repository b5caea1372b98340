//! `tourbook-auth`: authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it signs and
//! checks session tokens, hashes passwords, gates roles, and owns the `User`
//! document. The API crate wires these into middleware.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, ensure_owner_or_admin, restrict_to};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256Jwt, JwtValidator};
pub use password::{ResetToken, hash_password, hash_reset_token, validate_new_password, verify_password};
pub use roles::Role;
pub use user::{Registration, RoleGrant, User, normalize_email, profile_slug_for};
