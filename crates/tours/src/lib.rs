//! `tourbook-tours`: the bookable tour catalogue.
//!
//! Pure domain: the `Tour` document and its validation rules, geo lookups over
//! start locations, and the reporting aggregates (difficulty stats, monthly plan).

pub mod geo;
pub mod stats;
pub mod tour;

pub use geo::{DistanceUnit, GeoPoint, TourDistance, distances, parse_latlng, tours_within};
pub use stats::{DifficultyStats, MonthlyPlan, monthly_plan, tour_stats};
pub use tour::{DEFAULT_RATINGS_AVERAGE, Difficulty, Tour, TourDraft};
