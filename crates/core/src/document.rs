//! Stored-document contract shared by every resource.
//!
//! A document is a self-contained record that a `DocumentStore` persists and
//! the query builder evaluates as snake_case JSON.

use core::fmt::{Debug, Display};
use core::hash::Hash;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};

pub trait Document: Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Strongly-typed document identifier.
    type Id: Copy
        + Eq
        + Ord
        + Hash
        + Debug
        + Display
        + FromStr<Err = DomainError>
        + Send
        + Sync
        + 'static;

    /// Singular resource name used in messages ("tour", "review").
    const RESOURCE: &'static str;

    /// Top-level fields a client may filter, sort, or project on.
    const FIELDS: &'static [&'static str];

    /// Fields a generic partial update may overwrite.
    const PATCHABLE: &'static [&'static str];

    fn id(&self) -> Self::Id;

    fn created_at(&self) -> DateTime<Utc>;

    /// Unique index entries as `(index, key)` pairs.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Field-level rules checked before every write.
    fn validate(&self) -> DomainResult<()> {
        Ok(())
    }

    /// JSON form exposed to clients and to the query builder.
    ///
    /// Override to strip secrets.
    fn to_public_json(&self) -> Value {
        stored_json(Self::RESOURCE, self)
    }
}

/// Serialize a document, logging and yielding `null` if serde rejects it.
pub fn stored_json<T: Serialize + ?Sized>(resource: &str, value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(resource, error = %e, "document failed to serialize");
            Value::Null
        }
    }
}

/// Apply a snake_case partial update to a copy of `doc`.
///
/// Keys outside `D::PATCHABLE` are ignored. The merged document is re-validated.
pub fn merge_patch<D: Document>(doc: &D, patch: &Map<String, Value>) -> DomainResult<D> {
    let mut current =
        serde_json::to_value(doc).map_err(|e| DomainError::invariant(e.to_string()))?;
    let Some(fields) = current.as_object_mut() else {
        return Err(DomainError::invariant("document does not serialize to an object"));
    };

    for (key, value) in patch {
        if D::PATCHABLE.contains(&key.as_str()) {
            fields.insert(key.clone(), value.clone());
        } else {
            tracing::debug!(resource = D::RESOURCE, field = %key, "ignoring non-patchable field");
        }
    }

    let updated: D =
        serde_json::from_value(current).map_err(|e| DomainError::validation(e.to_string()))?;
    updated.validate()?;
    Ok(updated)
}
