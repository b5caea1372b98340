//! `tourbook-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error model, the stored-document contract, and the key and
//! slug helpers shared by every resource crate.

pub mod casing;
pub mod document;
pub mod error;
pub mod id;
pub mod slug;

pub use document::{Document, merge_patch, stored_json};
pub use error::{DomainError, DomainResult};
pub use id::{BookingId, ReviewId, TestimonialId, TourId, UserId};
