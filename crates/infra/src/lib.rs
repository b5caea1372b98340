//! Infrastructure layer: storage, querying, config, external services.

pub mod blobs;
pub mod config;
pub mod images;
pub mod mailer;
pub mod payments;
pub mod query;
pub mod ratings;
pub mod store;

pub use blobs::{Blob, BlobStore, InMemoryBlobStore};
pub use config::{AppConfig, ConfigError, Environment};
pub use images::{ImageError, ImageFormat, ImageProcessor, PassthroughImageProcessor, ProcessedImage};
pub use mailer::{LogMailer, Mail, Mailer, MailerError};
pub use payments::{ProcessedEvents, StripeSignatureVerifier, WebhookError, WebhookVerifier};
pub use query::{ApiFeatures, DocumentQuery};
pub use ratings::calc_average_ratings;
pub use store::{DocumentStore, InMemoryDocumentStore};
