use std::fmt;

use tracing::Span;
use uuid::Uuid;

/// Correlation id attached to one inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Accept a caller-supplied id when it is a UUID; otherwise mint one.
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Self)
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub fn request_span(id: RequestId, method: &str, path: &str) -> Span {
    tracing::info_span!("request", request_id = %id, method, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_uuid_is_kept() {
        let id = Uuid::new_v4();
        assert_eq!(RequestId::from_header(Some(&id.to_string())), RequestId(id));
    }

    #[test]
    fn junk_header_gets_fresh_id() {
        let a = RequestId::from_header(Some("not-a-uuid"));
        let b = RequestId::from_header(None);
        assert_ne!(a, b);
    }
}
