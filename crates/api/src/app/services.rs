//! Service wiring: stores, adapters, and token signing shared by handlers.

use std::sync::Arc;

use chrono::Duration;

use tourbook_auth::{Hs256Jwt, User};
use tourbook_bookings::Booking;
use tourbook_core::TourId;
use tourbook_infra::{
    AppConfig, BlobStore, DocumentStore, ImageProcessor, InMemoryBlobStore, InMemoryDocumentStore,
    LogMailer, Mailer, PassthroughImageProcessor, ProcessedEvents, StripeSignatureVerifier,
    WebhookVerifier, calc_average_ratings,
};
use tourbook_reviews::{Review, Testimonial};
use tourbook_tours::Tour;

use crate::app::errors::AppError;

pub struct AppServices {
    pub config: AppConfig,
    pub jwt: Hs256Jwt,

    pub users: Arc<dyn DocumentStore<User>>,
    pub tours: Arc<dyn DocumentStore<Tour>>,
    pub reviews: Arc<dyn DocumentStore<Review>>,
    pub testimonials: Arc<dyn DocumentStore<Testimonial>>,
    pub bookings: Arc<dyn DocumentStore<Booking>>,

    pub blobs: Arc<dyn BlobStore>,
    pub images: Arc<dyn ImageProcessor>,
    pub mailer: Arc<dyn Mailer>,
    pub webhooks: Arc<dyn WebhookVerifier>,
    pub processed_events: ProcessedEvents,
}

impl AppServices {
    /// In-memory wiring for dev and tests.
    pub fn in_memory(config: AppConfig) -> Self {
        let jwt = Hs256Jwt::new(
            config.jwt_secret.as_bytes(),
            Duration::days(config.jwt_expires_in_days),
        );
        let webhooks = Arc::new(StripeSignatureVerifier::new(config.webhook_secret.clone()));

        Self {
            config,
            jwt,
            users: Arc::new(InMemoryDocumentStore::new()),
            tours: Arc::new(InMemoryDocumentStore::new()),
            reviews: Arc::new(InMemoryDocumentStore::new()),
            testimonials: Arc::new(InMemoryDocumentStore::new()),
            bookings: Arc::new(InMemoryDocumentStore::new()),
            blobs: Arc::new(InMemoryBlobStore::new()),
            images: Arc::new(PassthroughImageProcessor),
            mailer: Arc::new(LogMailer::new()),
            webhooks,
            processed_events: ProcessedEvents::new(),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Recompute one tour's rating stats from its reviews.
    pub fn recalc_ratings(&self, tour: TourId) -> Result<(), AppError> {
        calc_average_ratings(self.reviews.as_ref(), self.tours.as_ref(), tour)?;
        Ok(())
    }

    pub fn cookie_max_age_secs(&self) -> i64 {
        Duration::days(self.config.jwt_cookie_expires_in_days).num_seconds()
    }
}
