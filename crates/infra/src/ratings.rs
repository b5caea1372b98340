//! Rating aggregation written back onto tours.

use tourbook_core::{DomainResult, TourId};
use tourbook_reviews::{RatingSummary, Review};
use tourbook_tours::Tour;

use crate::store::DocumentStore;

/// Recompute a tour's rating count and average from all of its reviews.
///
/// Returns the summary written, or `None` when the tour no longer exists.
pub fn calc_average_ratings(
    reviews: &dyn DocumentStore<Review>,
    tours: &dyn DocumentStore<Tour>,
    tour_id: TourId,
) -> DomainResult<Option<RatingSummary>> {
    let ratings = reviews.find(&|r: &Review| r.tour == tour_id)?;
    let summary = RatingSummary::from_ratings(ratings.iter().map(|r| r.rating));

    let updated = tours.update(tour_id, &mut |tour: &mut Tour| {
        tour.apply_ratings(summary.quantity, summary.average);
        Ok(())
    })?;

    match updated {
        Some(_) => {
            tracing::debug!(tour = %tour_id, quantity = summary.quantity, average = summary.average, "ratings recomputed");
            Ok(Some(summary))
        }
        None => {
            tracing::warn!(tour = %tour_id, "ratings recompute skipped: tour not found");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tourbook_core::UserId;
    use tourbook_reviews::ReviewDraft;
    use tourbook_tours::TourDraft;

    use crate::store::InMemoryDocumentStore;

    fn tour() -> Tour {
        let draft: TourDraft = serde_json::from_value(json!({
            "name": "The Sea Explorer",
            "duration": 7,
            "max_group_size": 15,
            "difficulty": "medium",
            "price": 497,
            "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
            "image_cover": "tour-2-cover.jpg",
        }))
        .unwrap();
        let slug = draft.base_slug();
        draft.into_tour(slug, Utc::now()).unwrap()
    }

    fn review(tour: TourId, rating: u8) -> Review {
        ReviewDraft {
            review: "Great".into(),
            rating,
        }
        .into_review(tour, UserId::new(), Utc::now())
        .unwrap()
    }

    #[test]
    fn average_is_written_back_and_resets_when_empty() {
        let tours = InMemoryDocumentStore::new();
        let reviews = InMemoryDocumentStore::new();
        let t = tours.insert(tour()).unwrap();

        let r1 = reviews.insert(review(t.id, 4)).unwrap();
        reviews.insert(review(t.id, 5)).unwrap();
        reviews.insert(review(t.id, 5)).unwrap();

        let summary = calc_average_ratings(&reviews, &tours, t.id).unwrap().unwrap();
        assert_eq!(summary.quantity, 3);
        let stored = tours.get(t.id).unwrap().unwrap();
        assert_eq!(stored.ratings_quantity, 3);
        assert_eq!(stored.ratings_average, 4.7);

        for r in reviews.list().unwrap() {
            reviews.delete(r.id).unwrap();
        }
        assert!(reviews.get(r1.id).unwrap().is_none());
        calc_average_ratings(&reviews, &tours, t.id).unwrap();
        let stored = tours.get(t.id).unwrap().unwrap();
        assert_eq!(stored.ratings_quantity, 0);
        assert_eq!(stored.ratings_average, 4.5);
    }

    #[test]
    fn missing_tour_is_none() {
        let tours: InMemoryDocumentStore<Tour> = InMemoryDocumentStore::new();
        let reviews: InMemoryDocumentStore<Review> = InMemoryDocumentStore::new();
        assert!(calc_average_ratings(&reviews, &tours, TourId::new()).unwrap().is_none());
    }
}
