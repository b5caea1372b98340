use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tourbook_core::{Document, DomainError, DomainResult, TourId, UserId, slug};

use crate::geo::GeoPoint;

/// Rating shown for tours nobody has reviewed yet.
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

const NAME_MIN: usize = 10;
const NAME_MAX: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tour Document
// ─────────────────────────────────────────────────────────────────────────────

/// A bookable tour.
///
/// # Invariants
/// - `name` and `slug` are unique across tours.
/// - `ratings_average`/`ratings_quantity` are derived from reviews and only
///   written by rating aggregation.
/// - `price_discount`, when set, is below `price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: TourId,
    pub name: String,
    pub slug: String,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: Difficulty,
    #[serde(default = "default_ratings_average")]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: u32,
    pub price: f64,
    #[serde(default)]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    #[serde(default)]
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<GeoPoint>,
    #[serde(default)]
    pub guides: Vec<UserId>,
    #[serde(default)]
    pub stripe_payment_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_ratings_average() -> f64 {
    DEFAULT_RATINGS_AVERAGE
}

impl Tour {
    /// Duration in weeks (derived, never stored).
    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }

    /// Write back aggregated review stats, rounded to one decimal.
    pub fn apply_ratings(&mut self, quantity: u32, average: f64) {
        self.ratings_quantity = quantity;
        self.ratings_average = (average * 10.0).round() / 10.0;
    }

    /// Base slug for the current name; callers resolve collisions.
    pub fn base_slug(&self) -> String {
        slug::slugify(&self.name)
    }
}

impl Document for Tour {
    type Id = TourId;

    const RESOURCE: &'static str = "tour";

    const FIELDS: &'static [&'static str] = &[
        "id",
        "name",
        "slug",
        "duration",
        "max_group_size",
        "difficulty",
        "ratings_average",
        "ratings_quantity",
        "price",
        "price_discount",
        "summary",
        "description",
        "image_cover",
        "images",
        "start_dates",
        "secret_tour",
        "start_location",
        "locations",
        "guides",
        "stripe_payment_link",
        "created_at",
        "duration_weeks",
    ];

    const PATCHABLE: &'static [&'static str] = &[
        "name",
        "duration",
        "max_group_size",
        "difficulty",
        "price",
        "price_discount",
        "summary",
        "description",
        "image_cover",
        "images",
        "start_dates",
        "secret_tour",
        "start_location",
        "locations",
        "guides",
        "stripe_payment_link",
    ];

    fn id(&self) -> TourId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("name", self.name.clone()), ("slug", self.slug.clone())]
    }

    fn validate(&self) -> DomainResult<()> {
        let name_len = self.name.trim().chars().count();
        if name_len < NAME_MIN {
            return Err(DomainError::validation(format!(
                "A tour name must have at least {NAME_MIN} characters"
            )));
        }
        if name_len > NAME_MAX {
            return Err(DomainError::validation(format!(
                "A tour name must have at most {NAME_MAX} characters"
            )));
        }
        if !slug::is_valid_slug(&self.slug) {
            return Err(DomainError::validation("A tour needs a valid slug"));
        }
        if self.duration < 1 {
            return Err(DomainError::validation("A tour must last at least one day"));
        }
        if self.max_group_size < 1 {
            return Err(DomainError::validation("A tour must have a group size of at least 1"));
        }
        if !(1.0..=5.0).contains(&self.ratings_average) {
            return Err(DomainError::validation("Rating must be between 1.0 and 5.0"));
        }
        if !self.price.is_finite() || self.price < 1.0 {
            return Err(DomainError::validation("A tour price must be at least 1"));
        }
        if let Some(discount) = self.price_discount {
            if discount >= self.price {
                return Err(DomainError::validation(format!(
                    "Discount price ({discount}) should be below regular price"
                )));
            }
        }
        if self.summary.trim().is_empty() {
            return Err(DomainError::validation("A tour must have a summary"));
        }
        if self.image_cover.trim().is_empty() {
            return Err(DomainError::validation("A tour must have a cover image"));
        }
        if let Some(start) = &self.start_location {
            start.validate()?;
        }
        for location in &self.locations {
            location.validate()?;
        }
        Ok(())
    }

    fn to_public_json(&self) -> Value {
        let mut json = tourbook_core::document::stored_json(Self::RESOURCE, self);
        if let Some(fields) = json.as_object_mut() {
            fields.insert("duration_weeks".into(), Value::from(self.duration_weeks()));
        }
        json
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Draft (create input)
// ─────────────────────────────────────────────────────────────────────────────

/// Create input in snake_case form. Derived fields are not accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct TourDraft {
    pub name: String,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: Difficulty,
    pub price: f64,
    #[serde(default)]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
    #[serde(default)]
    pub start_location: Option<GeoPoint>,
    #[serde(default)]
    pub locations: Vec<GeoPoint>,
    #[serde(default)]
    pub guides: Vec<UserId>,
    #[serde(default)]
    pub stripe_payment_link: Option<String>,
}

impl TourDraft {
    /// Build a validated tour using an already-deduplicated `slug`.
    pub fn into_tour(self, slug: String, now: DateTime<Utc>) -> DomainResult<Tour> {
        let tour = Tour {
            id: TourId::new(),
            name: self.name.trim().to_string(),
            slug,
            duration: self.duration,
            max_group_size: self.max_group_size,
            difficulty: self.difficulty,
            ratings_average: DEFAULT_RATINGS_AVERAGE,
            ratings_quantity: 0,
            price: self.price,
            price_discount: self.price_discount,
            summary: self.summary.trim().to_string(),
            description: self.description.map(|d| d.trim().to_string()),
            image_cover: self.image_cover,
            images: self.images,
            start_dates: self.start_dates,
            secret_tour: self.secret_tour,
            start_location: self.start_location,
            locations: self.locations,
            guides: self.guides,
            stripe_payment_link: self.stripe_payment_link,
            created_at: now,
        };
        tour.validate()?;
        Ok(tour)
    }

    pub fn base_slug(&self) -> String {
        slug::slugify(&self.name)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn draft(name: &str, price: f64) -> TourDraft {
        serde_json::from_value(json!({
            "name": name,
            "duration": 5,
            "max_group_size": 25,
            "difficulty": "easy",
            "price": price,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "image_cover": "tour-1-cover.jpg",
        }))
        .unwrap()
    }

    pub(crate) fn tour(name: &str, price: f64) -> Tour {
        let d = draft(name, price);
        let slug = d.base_slug();
        d.into_tour(slug, Utc::now()).unwrap()
    }

    #[test]
    fn draft_gets_rating_defaults() {
        let t = tour("The Forest Hiker", 397.0);
        assert_eq!(t.slug, "the-forest-hiker");
        assert_eq!(t.ratings_average, DEFAULT_RATINGS_AVERAGE);
        assert_eq!(t.ratings_quantity, 0);
        assert!(!t.secret_tour);
    }

    #[test]
    fn short_name_is_rejected() {
        let d = draft("Short", 100.0);
        let err = d.into_tour("short".into(), Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("at least 10")));
    }

    #[test]
    fn discount_must_be_below_price() {
        let mut d = draft("The Sea Explorer", 100.0);
        d.price_discount = Some(100.0);
        assert!(d.into_tour("the-sea-explorer".into(), Utc::now()).is_err());
    }

    #[test]
    fn unknown_difficulty_fails_to_parse() {
        let parsed: Result<TourDraft, _> = serde_json::from_value(json!({
            "name": "The Sea Explorer",
            "duration": 5,
            "max_group_size": 25,
            "difficulty": "extreme",
            "price": 100.0,
            "summary": "s",
            "image_cover": "c.jpg",
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn ratings_round_to_one_decimal() {
        let mut t = tour("The Snow Adventurer", 997.0);
        t.apply_ratings(3, 4.666_666);
        assert_eq!(t.ratings_average, 4.7);
        assert_eq!(t.ratings_quantity, 3);
    }

    #[test]
    fn public_json_includes_duration_weeks() {
        let t = tour("The City Wanderer", 1197.0);
        let json = t.to_public_json();
        assert!((json["duration_weeks"].as_f64().unwrap() - 5.0 / 7.0).abs() < 1e-9);
    }
}
