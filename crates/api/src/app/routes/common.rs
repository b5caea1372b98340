//! Helpers shared by the resource handlers.

use std::collections::HashMap;

use serde_json::{Map, Value};

use tourbook_auth::{Role, restrict_to};
use tourbook_core::{Document, merge_patch};
use tourbook_infra::{ApiFeatures, DocumentQuery, DocumentStore};

use crate::app::errors::AppError;
use crate::context::CurrentUser;

pub const STAFF: &[Role] = &[Role::Admin, Role::LeadGuide];

/// Run the full query-feature pipeline over a collection.
pub fn run_features<D: Document>(
    store: &dyn DocumentStore<D>,
    base: DocumentQuery,
    params: &HashMap<String, String>,
) -> Result<Vec<Value>, AppError> {
    let query = ApiFeatures::new(base, params)
        .filter()
        .sort()
        .limit_fields(D::FIELDS)
        .paginate()
        .into_query();
    let docs = store.list()?;
    Ok(query.execute(docs.iter().map(Document::to_public_json)))
}

pub fn require_role(user: &CurrentUser, allowed: &[Role]) -> Result<(), AppError> {
    if let Err(e) = restrict_to(user.role(), allowed) {
        tracing::warn!(user = %user.id(), role = %user.role(), "role not permitted");
        return Err(e.into());
    }
    Ok(())
}

/// Generic PATCH: merge allowed fields into the stored document atomically.
pub fn patch_document<D: Document>(
    store: &dyn DocumentStore<D>,
    id: D::Id,
    patch: &Map<String, Value>,
) -> Result<D, AppError> {
    if patch.is_empty() {
        return Err(AppError::bad_request("No data provided for update"));
    }
    store
        .update(id, &mut |doc: &mut D| {
            *doc = merge_patch(&*doc, patch)?;
            Ok(())
        })?
        .ok_or_else(|| AppError::missing(D::RESOURCE))
}

/// Generic DELETE by id.
pub fn delete_document<D: Document>(store: &dyn DocumentStore<D>, id: D::Id) -> Result<D, AppError> {
    store.delete(id)?.ok_or_else(|| AppError::missing(D::RESOURCE))
}

pub fn get_document<D: Document>(store: &dyn DocumentStore<D>, id: D::Id) -> Result<D, AppError> {
    store.get(id)?.ok_or_else(|| AppError::missing(D::RESOURCE))
}
