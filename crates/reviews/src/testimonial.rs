use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tourbook_core::{Document, DomainError, DomainResult, TestimonialId, UserId};

const NAME_MAX: usize = 50;

/// Site-wide feedback; one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: TestimonialId,
    pub review: String,
    pub name: String,
    pub date: DateTime<Utc>,
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

impl Testimonial {
    /// Replace the text of an existing testimonial (upsert path).
    pub fn refresh(&mut self, review: String, name: String, now: DateTime<Utc>) -> DomainResult<()> {
        self.review = review;
        self.name = name;
        self.date = now;
        self.validate()
    }
}

impl Document for Testimonial {
    type Id = TestimonialId;

    const RESOURCE: &'static str = "testimonial";
    const FIELDS: &'static [&'static str] = &["id", "review", "name", "date", "user", "created_at"];
    const PATCHABLE: &'static [&'static str] = &["review", "name"];

    fn id(&self) -> TestimonialId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("user", self.user.to_string())]
    }

    fn validate(&self) -> DomainResult<()> {
        if self.review.trim().is_empty() {
            return Err(DomainError::validation("Testimonial can not be empty!"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("Name is required"));
        }
        if self.name.chars().count() > NAME_MAX {
            return Err(DomainError::validation(format!(
                "Name must be at most {NAME_MAX} characters long"
            )));
        }
        Ok(())
    }
}

/// Create input as sent by the author.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestimonialDraft {
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl TestimonialDraft {
    /// Check required fields and that `name` is the author's own name.
    ///
    /// Returns `(review, name)` ready to store.
    pub fn accept(self, author_name: &str) -> DomainResult<(String, String)> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| DomainError::validation("Name is required"))?;
        ensure_author_name(&name, author_name)?;
        let review = self.review.unwrap_or_default();
        Ok((review.trim().to_string(), name))
    }
}

pub fn ensure_author_name(name: &str, author_name: &str) -> DomainResult<()> {
    if name != author_name {
        return Err(DomainError::validation(
            "Name must match the authenticated user's name",
        ));
    }
    Ok(())
}

impl Testimonial {
    pub fn new(review: String, name: String, user: UserId, now: DateTime<Utc>) -> DomainResult<Self> {
        let testimonial = Self {
            id: TestimonialId::new(),
            review,
            name,
            date: now,
            user,
            created_at: now,
        };
        testimonial.validate()?;
        Ok(testimonial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_requires_name() {
        let err = TestimonialDraft { review: Some("Great".into()), name: None }
            .accept("Jonas")
            .unwrap_err();
        assert_eq!(err, DomainError::validation("Name is required"));
    }

    #[test]
    fn draft_name_must_match_author() {
        let err = TestimonialDraft { review: Some("Great".into()), name: Some("Someone".into()) }
            .accept("Jonas")
            .unwrap_err();
        assert_eq!(err, DomainError::validation("Name must match the authenticated user's name"));
    }

    #[test]
    fn refresh_replaces_text_and_date() {
        let user = UserId::new();
        let t0 = Utc::now();
        let mut t = Testimonial::new("first".into(), "Jonas".into(), user, t0).unwrap();
        let later = t0 + chrono::Duration::minutes(5);
        t.refresh("second".into(), "Jonas".into(), later).unwrap();
        assert_eq!(t.review, "second");
        assert_eq!(t.date, later);
        assert_eq!(t.created_at, t0);
    }

    #[test]
    fn empty_review_is_rejected() {
        assert!(Testimonial::new("  ".into(), "Jonas".into(), UserId::new(), Utc::now()).is_err());
    }
}
