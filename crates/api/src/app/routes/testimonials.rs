use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Response,
    routing::get,
};
use chrono::Utc;

use tourbook_auth::{Role, ensure_owner_or_admin};
use tourbook_core::{Document, DomainError, TestimonialId, merge_patch};
use tourbook_infra::{DocumentQuery, DocumentStore};
use tourbook_reviews::{Testimonial, TestimonialDraft, ensure_author_name};

use crate::app::dto::{self, JsonBody};
use crate::app::errors::AppError;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::{AuthState, protect};

const AUTHORS: &[Role] = &[Role::User, Role::Admin];

pub fn router(auth: AuthState) -> Router {
    Router::new()
        .route("/", get(list_testimonials).post(upsert_testimonial))
        .route(
            "/:id",
            get(get_testimonial)
                .patch(update_testimonial)
                .delete(delete_testimonial),
        )
        .route_layer(from_fn_with_state(auth, protect))
}

pub async fn list_testimonials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::Admin])?;
    let docs = common::run_features(services.testimonials.as_ref(), DocumentQuery::new(), &params)?;
    Ok(dto::list(docs))
}

pub async fn get_testimonial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::Admin])?;
    let id: TestimonialId = dto::parse_id(&id)?;
    let testimonial = common::get_document(services.testimonials.as_ref(), id)?;
    Ok(dto::single(StatusCode::OK, testimonial.to_public_json()))
}

fn refresh(
    services: &AppServices,
    id: TestimonialId,
    review: &str,
    name: &str,
) -> Result<Testimonial, AppError> {
    let now = Utc::now();
    services
        .testimonials
        .update(id, &mut |t: &mut Testimonial| {
            t.refresh(review.to_string(), name.to_string(), now)
        })
        .map_err(AppError::verbatim)?
        .ok_or_else(|| AppError::missing("testimonial"))
}

/// One testimonial per user: a second submission replaces the first.
pub async fn upsert_testimonial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::User])?;

    let draft: TestimonialDraft = body.parse()?;
    let (review, name) = draft
        .accept(&current.user().name)
        .map_err(AppError::verbatim)?;

    let owner = current.id().to_string();
    if let Some(existing) = services.testimonials.find_unique("user", &owner)? {
        let testimonial = refresh(&services, existing.id, &review, &name)?;
        tracing::info!(testimonial = %testimonial.id, user = %current.id(), "testimonial updated");
        return Ok(dto::single(StatusCode::OK, testimonial.to_public_json()));
    }

    let testimonial = Testimonial::new(review.clone(), name.clone(), current.id(), Utc::now())
        .map_err(AppError::verbatim)?;
    match services.testimonials.insert(testimonial) {
        Ok(testimonial) => {
            tracing::info!(testimonial = %testimonial.id, user = %current.id(), "testimonial created");
            Ok(dto::single(StatusCode::CREATED, testimonial.to_public_json()))
        }
        // Lost a race with a concurrent submission; fold into the update path.
        Err(DomainError::Conflict(_)) => {
            let existing = services
                .testimonials
                .find_unique("user", &owner)?
                .ok_or_else(|| AppError::missing("testimonial"))?;
            let testimonial = refresh(&services, existing.id, &review, &name)?;
            Ok(dto::single(StatusCode::OK, testimonial.to_public_json()))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_testimonial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&current, AUTHORS)?;
    let id: TestimonialId = dto::parse_id(&id)?;
    let existing = common::get_document(services.testimonials.as_ref(), id)?;
    ensure_owner_or_admin(
        current.id(),
        current.role(),
        existing.user,
        "You can only update your own testimonial unless you are an admin",
    )?;

    let patch = body.only(Testimonial::PATCHABLE);
    if patch.is_empty() {
        return Err(AppError::bad_request("No data provided for update"));
    }
    if let Some(name) = patch.get("name") {
        let author = common::get_document(services.users.as_ref(), existing.user)?;
        ensure_author_name(name.as_str().unwrap_or_default(), &author.name)
            .map_err(AppError::verbatim)?;
    }

    let testimonial = services
        .testimonials
        .update(id, &mut |t: &mut Testimonial| {
            *t = merge_patch(&*t, &patch)?;
            Ok(())
        })?
        .ok_or_else(|| AppError::missing("testimonial"))?;
    Ok(dto::single(StatusCode::OK, testimonial.to_public_json()))
}

pub async fn delete_testimonial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    common::require_role(&current, AUTHORS)?;
    let id: TestimonialId = dto::parse_id(&id)?;
    let existing = common::get_document(services.testimonials.as_ref(), id)?;
    ensure_owner_or_admin(
        current.id(),
        current.role(),
        existing.user,
        "You can only delete your own testimonial unless you are an admin",
    )?;

    common::delete_document(services.testimonials.as_ref(), id)?;
    tracing::info!(testimonial = %id, by = %current.id(), "testimonial deleted");
    Ok(dto::no_content())
}
