use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tourbook_core::{BookingId, Document, DomainError, DomainResult, TourId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub tour: TourId,
    pub user: UserId,
    pub price: f64,
    pub tour_slug: String,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    /// Provider event that confirmed payment.
    #[serde(default)]
    pub payment_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of applying a payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Marked,
    AlreadyPaid,
}

impl Booking {
    /// An unpaid booking priced and labelled from the tour at checkout time.
    pub fn pending(
        tour: TourId,
        tour_slug: &str,
        price: f64,
        user: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let booking = Self {
            id: BookingId::new(),
            tour,
            user,
            price,
            tour_slug: tour_slug.to_string(),
            paid: false,
            paid_at: None,
            payment_event_id: None,
            created_at: now,
        };
        booking.validate()?;
        Ok(booking)
    }

    /// Mark paid. Idempotent: a second confirmation changes nothing.
    pub fn mark_paid(&mut self, event_id: Option<&str>, now: DateTime<Utc>) -> PaymentOutcome {
        if self.paid {
            return PaymentOutcome::AlreadyPaid;
        }
        self.paid = true;
        self.paid_at = Some(now);
        self.payment_event_id = event_id.map(str::to_string);
        PaymentOutcome::Marked
    }

    /// Staff reversal of a payment; clears the confirmation trail with it.
    pub fn mark_unpaid(&mut self) {
        self.paid = false;
        self.paid_at = None;
        self.payment_event_id = None;
    }
}

impl Document for Booking {
    type Id = BookingId;

    const RESOURCE: &'static str = "booking";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "tour",
        "user",
        "price",
        "tour_slug",
        "paid",
        "paid_at",
        "created_at",
    ];
    // `paid` goes through `mark_paid`/`mark_unpaid` so `paid_at` stays consistent.
    const PATCHABLE: &'static [&'static str] = &["price"];

    fn id(&self) -> BookingId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn validate(&self) -> DomainResult<()> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(DomainError::validation("Booking price must be a non-negative number"));
        }
        if self.tour_slug.trim().is_empty() {
            return Err(DomainError::validation("Booking must reference a tour slug"));
        }
        Ok(())
    }
}

/// Staff-created booking input (snake_case).
#[derive(Debug, Clone, Deserialize)]
pub struct BookingDraft {
    pub tour: TourId,
    pub user: UserId,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub paid: bool,
}
