use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tourbook_core::{Document, DomainError, DomainResult, ReviewId, TourId, UserId};

/// A user's rating of one tour.
///
/// # Invariants
/// - At most one review per `(tour, user)` pair (unique index `tour_user`).
/// - `rating` is within 1..=5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub review: String,
    pub rating: u8,
    pub tour: TourId,
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

impl Document for Review {
    type Id = ReviewId;

    const RESOURCE: &'static str = "review";
    const FIELDS: &'static [&'static str] = &["id", "review", "rating", "tour", "user", "created_at"];
    const PATCHABLE: &'static [&'static str] = &["review", "rating", "tour"];

    fn id(&self) -> ReviewId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("tour_user", format!("{}:{}", self.tour, self.user))]
    }

    fn validate(&self) -> DomainResult<()> {
        if self.review.trim().is_empty() {
            return Err(DomainError::validation("Review can not be empty!"));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(DomainError::validation("Rating must be between 1 and 5"));
        }
        Ok(())
    }
}

/// Create input; tour and author come from the request context.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewDraft {
    pub review: String,
    pub rating: u8,
}

impl ReviewDraft {
    pub fn into_review(self, tour: TourId, user: UserId, now: DateTime<Utc>) -> DomainResult<Review> {
        let review = Review {
            id: ReviewId::new(),
            review: self.review.trim().to_string(),
            rating: self.rating,
            tour,
            user,
            created_at: now,
        };
        review.validate()?;
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(rating: u8) -> ReviewDraft {
        ReviewDraft { review: "Loved every minute".into(), rating }
    }

    #[test]
    fn valid_draft_becomes_review() {
        let (tour, user) = (TourId::new(), UserId::new());
        let r = draft(4).into_review(tour, user, Utc::now()).unwrap();
        assert_eq!(r.unique_keys(), vec![("tour_user", format!("{tour}:{user}"))]);
    }

    #[test]
    fn rating_outside_scale_is_rejected() {
        assert!(draft(0).into_review(TourId::new(), UserId::new(), Utc::now()).is_err());
        assert!(draft(6).into_review(TourId::new(), UserId::new(), Utc::now()).is_err());
    }

    #[test]
    fn blank_review_is_rejected() {
        let d = ReviewDraft { review: "   ".into(), rating: 3 };
        let err = d.into_review(TourId::new(), UserId::new(), Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("Review can not be empty!"));
    }
}
