//! Hosted-checkout redirect and payment-event model.

use serde::Deserialize;
use serde_json::Value;

use tourbook_core::{BookingId, DomainError, DomainResult};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Append the booking id to a hosted payment link as `client_reference_id`.
pub fn payment_redirect(payment_link: &str, booking: BookingId) -> String {
    let separator = if payment_link.contains('?') { '&' } else { '?' };
    format!("{payment_link}{separator}client_reference_id={booking}")
}

/// Provider webhook event (already signature-checked).
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEventData {
    pub object: Value,
}

impl PaymentEvent {
    pub fn parse(payload: &[u8]) -> DomainResult<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| DomainError::validation(format!("Invalid payload: {e}")))
    }

    pub fn is_checkout_completed(&self) -> bool {
        self.kind == CHECKOUT_COMPLETED
    }

    /// Correlation token set at checkout.
    pub fn client_reference_id(&self) -> Option<&str> {
        self.data
            .object
            .get("client_reference_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_picks_query_separator() {
        let id = BookingId::new();
        assert_eq!(
            payment_redirect("https://buy.example.com/x", id),
            format!("https://buy.example.com/x?client_reference_id={id}")
        );
        assert_eq!(
            payment_redirect("https://buy.example.com/x?prefilled=1", id),
            format!("https://buy.example.com/x?prefilled=1&client_reference_id={id}")
        );
    }

    #[test]
    fn completed_event_exposes_reference() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{"client_reference_id":"abc"}}}"#;
        let event = PaymentEvent::parse(payload).unwrap();
        assert!(event.is_checkout_completed());
        assert_eq!(event.client_reference_id(), Some("abc"));
        assert_eq!(event.id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn missing_reference_is_none() {
        let payload = br#"{"type":"checkout.session.completed","data":{"object":{}}}"#;
        assert_eq!(PaymentEvent::parse(payload).unwrap().client_reference_id(), None);
    }

    #[test]
    fn garbage_payload_is_validation_error() {
        assert!(PaymentEvent::parse(b"not json").is_err());
    }
}
