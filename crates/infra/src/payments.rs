//! Payment webhook verification and delivery dedup.
//!
//! Signature header format: `t=<unix seconds>,v1=<hex hmac-sha256>` over
//! `"{t}.{raw body}"`. Several `v1` entries may be present (secret rotation);
//! any one matching is enough.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default accepted clock skew between signing and receipt.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// How long a handled event id is remembered; providers stop retrying well before this.
pub const DEFAULT_EVENT_RETENTION_HOURS: i64 = 72;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("no signatures found matching the expected signature for payload")]
    SignatureMismatch,
    #[error("timestamp outside the tolerance zone")]
    TimestampOutOfTolerance,
}

pub trait WebhookVerifier: Send + Sync {
    fn verify(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError>;
}

#[derive(Clone)]
pub struct StripeSignatureVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for StripeSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeSignatureVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl StripeSignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: Duration::seconds(DEFAULT_TOLERANCE_SECS),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::MalformedHeader)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Build a header the way the provider would. Used by tests and local tooling.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        match self.mac(timestamp, payload) {
            Ok(mac) => format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes())),
            Err(_) => format!("t={timestamp}"),
        }
    }
}

fn parse_header(header: &str) -> Result<(i64, Vec<Vec<u8>>), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            "v1" => {
                if let Ok(sig) = hex::decode(value) {
                    signatures.push(sig);
                }
            }
            _ => {}
        }
    }
    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(WebhookError::MalformedHeader),
    }
}

impl WebhookVerifier for StripeSignatureVerifier {
    fn verify(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let header = signature_header
            .filter(|h| !h.trim().is_empty())
            .ok_or(WebhookError::MissingSignature)?;
        let (timestamp, signatures) = parse_header(header)?;

        let matched = signatures.iter().any(|sig| {
            self.mac(timestamp, payload)
                .map(|mac| mac.verify_slice(sig).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        if (now.timestamp() - timestamp).abs() > self.tolerance.num_seconds() {
            return Err(WebhookError::TimestampOutOfTolerance);
        }
        Ok(())
    }
}

/// Event ids handled recently. Repeat deliveries are acknowledged without effect.
///
/// Ids older than the retention window are evicted on the next claim. A
/// replay after that is still harmless: `Booking::mark_paid` is idempotent.
#[derive(Debug)]
pub struct ProcessedEvents {
    seen: Mutex<HashMap<String, DateTime<Utc>>>,
    retention: Duration,
}

impl Default for ProcessedEvents {
    fn default() -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            retention: Duration::hours(DEFAULT_EVENT_RETENTION_HOURS),
        }
    }
}

impl ProcessedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Claim `event_id` at `now`; false when it was already claimed within the window.
    pub fn claim(&self, event_id: &str, now: DateTime<Utc>) -> bool {
        let Ok(mut seen) = self.seen.lock() else {
            return true;
        };
        let cutoff = now - self.retention;
        seen.retain(|_, claimed_at| *claimed_at > cutoff);
        if seen.contains_key(event_id) {
            return false;
        }
        seen.insert(event_id.to_string(), now);
        true
    }

    /// Release a claim so the provider's retry can be processed.
    pub fn release(&self, event_id: &str) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.remove(event_id);
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
