use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Multipart, Path, Query},
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use tourbook_auth::{Role, User};
use tourbook_core::{Document, TourId, slug};
use tourbook_infra::{Blob, DocumentQuery, DocumentStore};
use tourbook_reviews::Review;
use tourbook_tours::{DistanceUnit, Tour, TourDraft};

use crate::app::dto::{self, JsonBody};
use crate::app::errors::AppError;
use crate::app::routes::common::{self, STAFF};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::{AuthState, protect};

const COVER_SIZE: (u32, u32) = (2000, 1333);
const MAX_GALLERY_IMAGES: usize = 3;
const DEFAULT_PLAN_YEAR: i32 = 2021;

pub fn router(auth: AuthState) -> Router {
    let public = Router::new()
        .route("/", get(list_tours))
        .route("/top-5-cheap", get(top_five_cheap))
        .route("/tour-stats", get(tour_stats))
        .route("/tours-within", get(tours_within))
        .route("/distances", get(distances))
        .route("/slug/:slug", get(get_tour_by_slug))
        .route("/images/:filename", get(get_image))
        .route("/:id", get(get_tour));

    let protected = Router::new()
        .route("/", post(create_tour))
        .route("/monthly-plan", get(monthly_plan))
        .route("/:id", patch(update_tour).delete(delete_tour))
        .route("/:id/images", post(upload_tour_images))
        .route_layer(from_fn_with_state(auth, protect));

    public.merge(protected)
}

fn visible() -> DocumentQuery {
    DocumentQuery::new().where_eq("secret_tour", false)
}

fn visible_tours(services: &AppServices) -> Result<Vec<Tour>, AppError> {
    Ok(services.tours.find(&|t: &Tour| !t.secret_tour)?)
}

pub async fn list_tours(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let docs = common::run_features(services.tours.as_ref(), visible(), &params)?;
    Ok(dto::list(docs))
}

pub async fn top_five_cheap(
    Extension(services): Extension<Arc<AppServices>>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    params.insert("limit".into(), "5".into());
    params.insert("sort".into(), "-ratings_average,price".into());
    params.insert(
        "fields".into(),
        "name,price,ratings_average,summary,difficulty".into(),
    );
    let docs = common::run_features(services.tours.as_ref(), visible(), &params)?;
    Ok(dto::list(docs))
}

pub async fn tour_stats(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, AppError> {
    let stats = tourbook_tours::tour_stats(&visible_tours(&services)?);
    Ok(dto::success(json!({ "data": { "stats": stats } })))
}

pub async fn monthly_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    common::require_role(&user, &[Role::Admin, Role::LeadGuide, Role::Guide])?;

    let year = match params.get("year") {
        None => DEFAULT_PLAN_YEAR,
        Some(raw) => raw
            .trim()
            .parse::<i32>()
            .map_err(|_| AppError::bad_request("Invalid year: Year must be between 2000 and 2100"))?,
    };
    let plan = tourbook_tours::monthly_plan(&visible_tours(&services)?, year).map_err(AppError::verbatim)?;
    Ok(dto::success(json!({ "data": { "plan": plan } })))
}

fn geo_params(
    params: &HashMap<String, String>,
) -> Result<(tourbook_tours::GeoPoint, DistanceUnit), AppError> {
    let latlng = params
        .get("latlng")
        .ok_or_else(|| AppError::bad_request("Please provide latitude and longitude in the format lat,lng."))?;
    let center = tourbook_tours::parse_latlng(latlng).map_err(AppError::verbatim)?;
    let unit = match params.get("unit") {
        None => DistanceUnit::default(),
        Some(raw) => raw.parse::<DistanceUnit>().map_err(AppError::verbatim)?,
    };
    Ok((center, unit))
}

pub async fn tours_within(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let (center, unit) = geo_params(&params)?;
    let distance = params
        .get("distance")
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| AppError::bad_request("Please provide distance greater than 0"))?;

    let tours = visible_tours(&services)?;
    let within = tourbook_tours::tours_within(&tours, &center, distance, unit).map_err(AppError::verbatim)?;
    let docs: Vec<Value> = within.into_iter().map(Document::to_public_json).collect();
    Ok(dto::list(docs))
}

pub async fn distances(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let (center, unit) = geo_params(&params)?;
    let tours = visible_tours(&services)?;
    let rows = tourbook_tours::distances(&tours, &center, unit);
    Ok(dto::success(json!({ "data": { "data": rows } })))
}

/// Tour JSON with `reviews` (author name and photo) and `guides` filled in.
fn populated(services: &AppServices, tour: &Tour) -> Result<Value, AppError> {
    let tour_id = tour.id;
    let mut reviews = services.reviews.find(&|r: &Review| r.tour == tour_id)?;
    reviews.sort_by_key(|r| r.created_at);

    let reviews: Vec<Value> = reviews
        .iter()
        .map(|r| {
            let author = match services.users.get(r.user).ok().flatten() {
                Some(u) => json!({ "id": u.id, "name": u.name, "photo": u.photo }),
                None => Value::Null,
            };
            dto::with_field(r.to_public_json(), "user", author)
        })
        .collect();

    let mut guides = Vec::new();
    for id in &tour.guides {
        if let Some(guide) = services.users.get(*id)? {
            guides.push(guide_summary(&guide));
        }
    }

    let json = dto::with_field(tour.to_public_json(), "reviews", Value::Array(reviews));
    Ok(dto::with_field(json, "guides", Value::Array(guides)))
}

fn guide_summary(user: &User) -> Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "photo": user.photo,
        "role": user.role,
    })
}

pub async fn get_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id: TourId = dto::parse_id(&id)?;
    let tour = common::get_document(services.tours.as_ref(), id)?;
    Ok(dto::single(StatusCode::OK, populated(&services, &tour)?))
}

pub async fn get_tour_by_slug(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let tour = services
        .tours
        .find_unique("slug", &slug)?
        .filter(|t| !t.secret_tour)
        .ok_or_else(|| AppError::not_found("No tour found with that slug"))?;
    Ok(dto::single(StatusCode::OK, populated(&services, &tour)?))
}

pub async fn create_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&user, STAFF)?;

    let draft: TourDraft = body.parse()?;
    for guide in &draft.guides {
        if services.users.get(*guide)?.is_none() {
            return Err(AppError::not_found(format!("No user found with ID {guide}")));
        }
    }

    let base = draft.base_slug();
    let slug = slug::unique_slug(&base, |candidate| {
        services.tours.find_unique("slug", candidate).ok().flatten().is_some()
    });

    let tour = services.tours.insert(draft.into_tour(slug, Utc::now())?)?;
    tracing::info!(tour = %tour.id, slug = %tour.slug, by = %user.id(), "tour created");
    Ok(dto::single(StatusCode::CREATED, tour.to_public_json()))
}

pub async fn update_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&user, STAFF)?;
    let id: TourId = dto::parse_id(&id)?;
    let tour = common::patch_document(services.tours.as_ref(), id, &body.0)?;
    Ok(dto::single(StatusCode::OK, tour.to_public_json()))
}

pub async fn delete_tour(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    common::require_role(&user, STAFF)?;
    let id: TourId = dto::parse_id(&id)?;
    let tour = common::delete_document(services.tours.as_ref(), id)?;
    tracing::info!(tour = %tour.id, by = %user.id(), "tour deleted");
    Ok(dto::no_content())
}

pub async fn upload_tour_images(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    common::require_role(&user, STAFF)?;
    let id: TourId = dto::parse_id(&id)?;
    common::get_document(services.tours.as_ref(), id)?;

    let uploads = dto::read_uploads(multipart, &["imageCover", "images"]).await?;
    if uploads.is_empty() {
        return Err(AppError::bad_request("Please upload imageCover and/or images"));
    }

    let (width, height) = COVER_SIZE;
    let mut cover = None;
    let mut gallery = Vec::new();
    for upload in uploads {
        let image = services.images.process(&upload.bytes, width, height)?;
        let name = if upload.field == "imageCover" {
            format!("tour-{id}-{}-cover.jpeg", Uuid::new_v4())
        } else {
            if gallery.len() == MAX_GALLERY_IMAGES {
                return Err(AppError::bad_request(format!(
                    "Too many images; at most {MAX_GALLERY_IMAGES} allowed"
                )));
            }
            format!("tour-{id}-{}-{}.jpeg", Uuid::new_v4(), gallery.len() + 1)
        };
        services.blobs.put(
            &name,
            Blob {
                content_type: image.content_type().to_string(),
                bytes: image.bytes,
            },
        )?;
        if upload.field == "imageCover" {
            cover = Some(name);
        } else {
            gallery.push(name);
        }
    }

    let tour = services
        .tours
        .update(id, &mut |tour: &mut Tour| {
            if let Some(cover) = &cover {
                tour.image_cover = cover.clone();
            }
            if !gallery.is_empty() {
                tour.images = gallery.clone();
            }
            Ok(())
        })?
        .ok_or_else(|| AppError::missing("tour"))?;

    tracing::info!(tour = %tour.id, images = tour.images.len(), "tour images stored");
    Ok(dto::single(StatusCode::OK, tour.to_public_json()))
}

pub async fn get_image(
    Extension(services): Extension<Arc<AppServices>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let blob = services
        .blobs
        .get(&filename)
        .map_err(AppError::verbatim)?
        .ok_or_else(|| AppError::not_found("Image not found"))?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes).into_response())
}
