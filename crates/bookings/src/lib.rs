//! `tourbook-bookings`: bookings and the hosted-checkout handshake.
//!
//! A booking is written unpaid when checkout starts; the payment provider's
//! `checkout.session.completed` event later marks it paid, correlated through
//! the booking id passed as `client_reference_id`.

pub mod booking;
pub mod checkout;

pub use booking::{Booking, BookingDraft, PaymentOutcome};
pub use checkout::{CHECKOUT_COMPLETED, PaymentEvent, payment_redirect};
