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
use tourbook_core::{Document, DomainError, ReviewId, TourId, merge_patch};
use tourbook_infra::{DocumentQuery, DocumentStore};
use tourbook_reviews::{Review, ReviewDraft};

use crate::app::dto::{self, JsonBody};
use crate::app::errors::AppError;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::{AuthState, protect};

const DUPLICATE_REVIEW: &str = "A review for this tour by this user already exists";
const AUTHORS: &[Role] = &[Role::User, Role::Admin];

pub fn router(auth: AuthState) -> Router {
    Router::new()
        .route("/", get(list_reviews).post(create_review))
        .route("/:id", get(get_review).patch(update_review).delete(delete_review))
        .route_layer(from_fn_with_state(auth, protect))
}

fn duplicate_review(err: DomainError) -> AppError {
    match err {
        DomainError::Conflict(_) => AppError::conflict(DUPLICATE_REVIEW),
        other => other.into(),
    }
}

fn existing_tour(services: &AppServices, raw: &str) -> Result<TourId, AppError> {
    let id: TourId = dto::parse_id(raw)?;
    common::get_document(services.tours.as_ref(), id)?;
    Ok(id)
}

fn review_key(tour: TourId, user: impl std::fmt::Display) -> String {
    format!("{tour}:{user}")
}

pub async fn list_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let mut base = DocumentQuery::new();
    if let Some(raw) = params.remove("tourId").or_else(|| params.remove("tour_id")) {
        let tour = existing_tour(&services, &raw)?;
        base = base.where_eq("tour", tour.to_string());
    }
    let docs = common::run_features(services.reviews.as_ref(), base, &params)?;
    Ok(dto::list(docs))
}

pub async fn get_review(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: ReviewId = dto::parse_id(&id)?;
    let review = common::get_document(services.reviews.as_ref(), id)?;
    Ok(dto::single(StatusCode::OK, review.to_public_json()))
}

pub async fn create_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::User])?;

    let raw_tour = params
        .get("tourId")
        .map(String::as_str)
        .or_else(|| body.str("tour"))
        .ok_or_else(|| AppError::bad_request("Please provide a tour id"))?;
    let tour = existing_tour(&services, raw_tour)?;
    common::get_document(services.users.as_ref(), current.id())?;

    if services
        .reviews
        .find_unique("tour_user", &review_key(tour, current.id()))?
        .is_some()
    {
        return Err(AppError::conflict(DUPLICATE_REVIEW));
    }

    let draft: ReviewDraft = body.parse()?;
    let review = draft
        .into_review(tour, current.id(), Utc::now())
        .map_err(AppError::verbatim)?;
    let review = services.reviews.insert(review).map_err(duplicate_review)?;
    services.recalc_ratings(tour)?;

    tracing::info!(review = %review.id, tour = %tour, user = %current.id(), "review created");
    Ok(dto::single(StatusCode::CREATED, review.to_public_json()))
}

pub async fn update_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&current, AUTHORS)?;
    let id: ReviewId = dto::parse_id(&id)?;
    let before = common::get_document(services.reviews.as_ref(), id)?;
    ensure_owner_or_admin(
        current.id(),
        current.role(),
        before.user,
        "You can only update your own reviews unless you are an admin",
    )?;

    let patch = body.only(Review::PATCHABLE);
    if patch.is_empty() {
        return Err(AppError::bad_request("No data provided for update"));
    }

    if let Some(raw) = patch.get("tour") {
        let raw = raw
            .as_str()
            .ok_or_else(|| AppError::bad_request("Invalid ID format"))?;
        let tour = existing_tour(&services, raw)?;
        if tour != before.tour
            && services
                .reviews
                .find_unique("tour_user", &review_key(tour, before.user))?
                .is_some()
        {
            return Err(AppError::conflict(DUPLICATE_REVIEW));
        }
    }

    let review = services
        .reviews
        .update(id, &mut |review: &mut Review| {
            *review = merge_patch(&*review, &patch)?;
            Ok(())
        })
        .map_err(duplicate_review)?
        .ok_or_else(|| AppError::missing("review"))?;

    services.recalc_ratings(review.tour)?;
    if review.tour != before.tour {
        services.recalc_ratings(before.tour)?;
    }
    Ok(dto::single(StatusCode::OK, review.to_public_json()))
}

pub async fn delete_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    common::require_role(&current, AUTHORS)?;
    let id: ReviewId = dto::parse_id(&id)?;
    let review = common::get_document(services.reviews.as_ref(), id)?;
    ensure_owner_or_admin(
        current.id(),
        current.role(),
        review.user,
        "You can only delete your own reviews unless you are an admin",
    )?;

    let tour = review.tour;
    common::delete_document(services.reviews.as_ref(), id)?;
    services.recalc_ratings(tour)?;

    tracing::info!(review = %id, tour = %tour, by = %current.id(), "review deleted");
    Ok(dto::no_content())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_become_409() {
        let err = duplicate_review(DomainError::conflict("tour_user \"a:b\""));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), DUPLICATE_REVIEW);
    }

    #[test]
    fn other_errors_keep_their_mapping() {
        let err = duplicate_review(DomainError::validation("Rating must be between 1 and 5"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn review_keys_match_the_unique_index() {
        let tour = TourId::new();
        let user = tourbook_core::UserId::new();
        let review = ReviewDraft { review: "Great".into(), rating: 5 }
            .into_review(tour, user, Utc::now())
            .unwrap();
        let (_, key) = review.unique_keys().remove(0);
        assert_eq!(key, review_key(tour, user));
    }
}
