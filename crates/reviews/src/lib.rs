//! `tourbook-reviews`: feedback documents and rating math.
//!
//! Reviews rate one tour (one per tour/user pair); testimonials are free-form
//! site feedback (one per user). `RatingSummary` is the pure aggregation that
//! infra writes back onto tours.

pub mod rating;
pub mod review;
pub mod testimonial;

pub use rating::RatingSummary;
pub use review::{Review, ReviewDraft};
pub use testimonial::{Testimonial, TestimonialDraft, ensure_author_name};
