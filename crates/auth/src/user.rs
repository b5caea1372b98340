//! User document: identity, credentials, and profile.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use tourbook_core::{Document, DomainError, DomainResult, UserId};

use crate::password::{self, ResetToken};
use crate::Role;

pub const DEFAULT_PHOTO: &str = "default.jpg";

const PROFILE_SLUG_LEN: usize = 16;
const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

// ─────────────────────────────────────────────────────────────────────────────
// User Document
// ─────────────────────────────────────────────────────────────────────────────

/// A registered account.
///
/// # Invariants
/// - `email` is unique and stored lower-cased.
/// - `profile_slug` is unique and derived from the id.
/// - Deactivated users (`active == false`) cannot authenticate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(default = "default_photo")]
    pub photo: String,
    #[serde(default)]
    pub role: Role,
    pub password_hash: String,
    #[serde(default)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_reset_token: Option<String>,
    #[serde(default)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub profile_slug: String,
    pub created_at: DateTime<Utc>,
}

fn default_photo() -> String {
    DEFAULT_PHOTO.to_string()
}

fn default_active() -> bool {
    true
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, role: Role, now: DateTime<Utc>) -> Self {
        let id = UserId::new();
        Self {
            id,
            name: name.trim().to_string(),
            email: normalize_email(&email),
            photo: default_photo(),
            role,
            password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            location: None,
            facebook: None,
            instagram: None,
            twitter: None,
            description: None,
            profile_slug: profile_slug_for(&id),
            created_at: now,
        }
    }

    /// True when the password changed after a token issued at `iat` (unix seconds).
    pub fn changed_password_after(&self, iat: i64) -> bool {
        self.password_changed_at
            .is_some_and(|changed| changed.timestamp() > iat)
    }

    /// Replace the password hash and invalidate outstanding sessions.
    ///
    /// The change is back-dated one second so a token issued in the same
    /// instant still verifies.
    pub fn set_password_hash(&mut self, hash: String, now: DateTime<Utc>) {
        self.password_hash = hash;
        self.password_changed_at = Some(now - Duration::seconds(1));
        self.clear_password_reset();
    }

    /// Start a reset; returns the plaintext token for the email.
    pub fn start_password_reset(&mut self, now: DateTime<Utc>) -> String {
        let token = ResetToken::generate(now);
        self.password_reset_token = Some(token.hashed);
        self.password_reset_expires = Some(token.expires_at);
        token.plain
    }

    pub fn clear_password_reset(&mut self) {
        self.password_reset_token = None;
        self.password_reset_expires = None;
    }

    /// Whether `hashed_token` matches an unexpired reset.
    pub fn reset_token_matches(&self, hashed_token: &str, now: DateTime<Utc>) -> bool {
        match (&self.password_reset_token, self.password_reset_expires) {
            (Some(stored), Some(expires)) => stored == hashed_token && expires > now,
            _ => false,
        }
    }
}

impl Document for User {
    type Id = UserId;

    const RESOURCE: &'static str = "user";

    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "photo",
        "role",
        "active",
        "location",
        "facebook",
        "instagram",
        "twitter",
        "description",
        "profile_slug",
        "created_at",
    ];

    const PATCHABLE: &'static [&'static str] = &[
        "name",
        "email",
        "photo",
        "role",
        "active",
        "location",
        "facebook",
        "instagram",
        "twitter",
        "description",
    ];

    fn id(&self) -> UserId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![
            ("email", self.email.clone()),
            ("profile_slug", self.profile_slug.clone()),
        ]
    }

    fn validate(&self) -> DomainResult<()> {
        let name_len = self.name.trim().chars().count();
        if name_len < 2 {
            return Err(DomainError::validation("Name must be at least 2 characters long"));
        }
        if name_len > 50 {
            return Err(DomainError::validation("Name must be at most 50 characters long"));
        }
        if !is_plausible_email(&self.email) {
            return Err(DomainError::validation("Please provide a valid email"));
        }
        if self.location.as_deref().is_some_and(|l| l.chars().count() > 100) {
            return Err(DomainError::validation("Location must be at most 100 characters long"));
        }
        if self.description.as_deref().is_some_and(|d| d.chars().count() > 500) {
            return Err(DomainError::validation("Description must be at most 500 characters long"));
        }
        Ok(())
    }

    fn to_public_json(&self) -> Value {
        let mut json = tourbook_core::document::stored_json(Self::RESOURCE, self);
        if let Some(fields) = json.as_object_mut() {
            for secret in [
                "password_hash",
                "password_changed_at",
                "password_reset_token",
                "password_reset_expires",
            ] {
                fields.remove(secret);
            }
        }
        json
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

/// Who is creating the account; decides whether `admin` may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGrant {
    SelfService,
    ByAdmin,
}

/// Raw signup input as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub role: Option<String>,
}

impl Registration {
    /// Validate the input and build a new active user with a hashed password.
    pub fn into_user(self, now: DateTime<Utc>, grant: RoleGrant) -> DomainResult<User> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        let missing: Vec<&str> = [
            ("name", present(&self.name)),
            ("email", present(&self.email)),
            ("password", present(&self.password)),
            ("passwordConfirm", present(&self.password_confirm)),
        ]
        .into_iter()
        .filter_map(|(field, ok)| (!ok).then_some(field))
        .collect();
        if !missing.is_empty() {
            return Err(DomainError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let name = self.name.unwrap_or_default();
        let email = self.email.unwrap_or_default();
        let password = self.password.unwrap_or_default();
        let confirm = self.password_confirm.unwrap_or_default();

        password::validate_new_password(&password, &confirm)?;
        if name.trim().chars().count() < 2 {
            return Err(DomainError::validation("Name must be at least 2 characters long"));
        }

        let role = match self.role.as_deref() {
            None => Role::User,
            Some(raw) => raw.parse::<Role>()?,
        };
        if role == Role::Admin && grant == RoleGrant::SelfService {
            return Err(DomainError::forbidden("Cannot assign admin role during signup"));
        }

        let hash = password::hash_password(&password)?;
        let user = User::new(name, email, hash, role, now);
        user.validate()?;
        Ok(user)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Stable 16-character base62 handle derived from the user id.
pub fn profile_slug_for(id: &UserId) -> String {
    let digest = Sha256::digest(id.as_uuid().as_bytes());
    let mut head = [0u8; 16];
    head.copy_from_slice(&digest[..16]);
    let mut n = u128::from_be_bytes(head);

    let mut slug = String::with_capacity(PROFILE_SLUG_LEN);
    for _ in 0..PROFILE_SLUG_LEN {
        slug.push(BASE62[(n % 62) as usize] as char);
        n /= 62;
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            name: Some("Laura Wilson".into()),
            email: Some("Laura@Example.com".into()),
            password: Some("pass1234".into()),
            password_confirm: Some("pass1234".into()),
            role: None,
        }
    }

    #[test]
    fn registration_builds_active_user() {
        let user = registration().into_user(Utc::now(), RoleGrant::SelfService).unwrap();
        assert_eq!(user.email, "laura@example.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.photo, DEFAULT_PHOTO);
        assert!(user.active);
        assert!(password::verify_password("pass1234", &user.password_hash));
        assert_eq!(user.profile_slug.len(), 16);
    }

    #[test]
    fn registration_lists_missing_fields() {
        let input = Registration {
            email: None,
            password_confirm: None,
            ..registration()
        };
        let err = input.into_user(Utc::now(), RoleGrant::SelfService).unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("Missing required fields: email, passwordConfirm")
        );
    }

    #[test]
    fn self_service_cannot_claim_admin() {
        let input = Registration {
            role: Some("admin".into()),
            ..registration()
        };
        let err = input.clone().into_user(Utc::now(), RoleGrant::SelfService).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
        assert_eq!(input.into_user(Utc::now(), RoleGrant::ByAdmin).unwrap().role, Role::Admin);
    }

    #[test]
    fn invalid_role_is_validation_error() {
        let input = Registration {
            role: Some("captain".into()),
            ..registration()
        };
        let err = input.into_user(Utc::now(), RoleGrant::SelfService).unwrap_err();
        assert_eq!(err, DomainError::validation("Invalid role: captain"));
    }

    #[test]
    fn public_json_hides_secrets() {
        let mut user = registration().into_user(Utc::now(), RoleGrant::SelfService).unwrap();
        user.start_password_reset(Utc::now());
        let json = user.to_public_json();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password_reset_token").is_none());
        assert_eq!(json["name"], "Laura Wilson");
    }

    #[test]
    fn password_change_invalidates_older_tokens() {
        let mut user = registration().into_user(Utc::now(), RoleGrant::SelfService).unwrap();
        let old_iat = (Utc::now() - Duration::hours(1)).timestamp();
        assert!(!user.changed_password_after(old_iat));

        let now = Utc::now();
        user.set_password_hash("x".into(), now);
        assert!(user.changed_password_after(old_iat));
        assert!(!user.changed_password_after(now.timestamp()));
    }

    #[test]
    fn reset_token_expires_after_ten_minutes() {
        let mut user = registration().into_user(Utc::now(), RoleGrant::SelfService).unwrap();
        let now = Utc::now();
        let plain = user.start_password_reset(now);
        let hashed = password::hash_reset_token(&plain);
        assert!(user.reset_token_matches(&hashed, now + Duration::minutes(9)));
        assert!(!user.reset_token_matches(&hashed, now + Duration::minutes(11)));
        assert!(!user.reset_token_matches("other", now));
    }

    #[test]
    fn profile_slug_is_stable_per_id() {
        let id = UserId::new();
        assert_eq!(profile_slug_for(&id), profile_slug_for(&id));
        assert_ne!(profile_slug_for(&id), profile_slug_for(&UserId::new()));
        assert!(profile_slug_for(&id).chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
