//! Request/response shapes and JSON mapping helpers.
//!
//! Clients speak camelCase; documents are stored snake_case. Bodies are
//! rewritten on the way in ([`JsonBody`]) and on the way out ([`single`], [`list`]).

use std::str::FromStr;

use axum::Json;
use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use tourbook_core::casing::{keys_to_camel, keys_to_snake};
use tourbook_core::{Document, DomainError};

use crate::app::errors::AppError;

// -------------------------
// Request bodies
// -------------------------

/// JSON object body with keys normalised to snake_case.
///
/// An empty body is an empty object.
#[derive(Debug, Clone, Default)]
pub struct JsonBody(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::bad_request(format!("Invalid JSON body: {e}")))?;
        match keys_to_snake(value) {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(AppError::bad_request("Request body must be a JSON object")),
        }
    }
}

impl JsonBody {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Deserialize the (snake_case) body into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| AppError::bad_request(format!("Invalid input data. {e}")))
    }

    /// Keep only `allowed` keys.
    pub fn only(&self, allowed: &[&str]) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(k, _)| allowed.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Camel-case view of the raw body; used where a type is declared camelCase.
pub fn camel_object(body: &JsonBody) -> Value {
    keys_to_camel(Value::Object(body.0.clone()))
}

pub fn parse_id<T>(raw: &str) -> Result<T, AppError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(|_| AppError::bad_request("Invalid ID format"))
}

/// One uploaded file from a multipart body.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub bytes: Vec<u8>,
}

/// Drain a multipart body, keeping file parts for `fields`.
pub async fn read_uploads(mut multipart: Multipart, fields: &[&str]) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        if fields.contains(&name.as_str()) && !bytes.is_empty() {
            uploads.push(Upload {
                field: name,
                bytes: bytes.to_vec(),
            });
        } else {
            tracing::debug!(field = %name, "ignoring multipart field");
        }
    }
    Ok(uploads)
}

// -------------------------
// Response envelopes
// -------------------------

pub fn single(status: StatusCode, doc: Value) -> Response {
    (
        status,
        Json(json!({
            "status": "success",
            "data": { "data": keys_to_camel(doc) },
        })),
    )
        .into_response()
}

pub fn list(docs: Vec<Value>) -> Response {
    let results = docs.len();
    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "results": results,
            "data": { "data": keys_to_camel(Value::Array(docs)) },
        })),
    )
        .into_response()
}

pub fn success(body: Value) -> Response {
    let mut object = match keys_to_camel(body) {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".into(), other);
            map
        }
    };
    object.insert("status".into(), Value::from("success"));
    (StatusCode::OK, Json(Value::Object(object))).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Set `key` on a JSON object; non-objects are returned unchanged.
pub fn with_field(mut doc: Value, key: &str, value: Value) -> Value {
    if let Some(fields) = doc.as_object_mut() {
        fields.insert(key.to_string(), value);
    }
    doc
}

pub fn public<D: Document>(docs: &[D]) -> Vec<Value> {
    docs.iter().map(Document::to_public_json).collect()
}
