use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde_json::{Value, json};

use tourbook_bookings::{Booking, BookingDraft, PaymentEvent, PaymentOutcome, payment_redirect};
use tourbook_core::{BookingId, Document, TourId, merge_patch};
use tourbook_infra::{DocumentQuery, DocumentStore};
use tourbook_tours::Tour;

use crate::app::dto::{self, JsonBody};
use crate::app::errors::AppError;
use crate::app::routes::common::{self, STAFF};
use crate::app::services::AppServices;
use crate::context::CurrentUser;
use crate::middleware::{AuthState, protect};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn router(auth: AuthState) -> Router {
    let public = Router::new().route("/webhook-checkout", post(webhook_checkout));

    let protected = Router::new()
        .route("/checkout-session/:tour_id", get(checkout_session))
        .route("/my-bookings", get(my_bookings))
        .route("/", get(list_bookings).post(create_booking))
        .route("/:id", get(get_booking).patch(update_booking).delete(delete_booking))
        .route_layer(from_fn_with_state(auth, protect));

    public.merge(protected)
}

// -------------------------
// Checkout
// -------------------------

pub async fn checkout_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(tour_id): Path<String>,
) -> Result<Response, AppError> {
    let tour_id: TourId = dto::parse_id(&tour_id)?;
    let tour = common::get_document(services.tours.as_ref(), tour_id)?;
    let link = tour
        .stripe_payment_link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| AppError::bad_request("No payment link configured for this tour"))?;

    let booking = Booking::pending(tour.id, &tour.slug, tour.price, current.id(), Utc::now())
        .map_err(AppError::verbatim)?;
    let booking = services.bookings.insert(booking)?;
    tracing::info!(booking = %booking.id, tour = %tour.id, user = %current.id(), "booking created");

    Ok(dto::success(json!({ "redirectUrl": payment_redirect(link, booking.id) })))
}

fn webhook_rejection(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Payment provider callback. Signed; unauthenticated otherwise.
pub async fn webhook_checkout(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());
    if let Err(e) = services.webhooks.verify(&body, signature, Utc::now()) {
        tracing::warn!(reason = %e, "rejected webhook delivery");
        return Ok(webhook_rejection(format!("Webhook Error: {e}")));
    }

    let event = match PaymentEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => return Ok(webhook_rejection(format!("Webhook Error: {e}"))),
    };
    if !event.is_checkout_completed() {
        tracing::info!(kind = %event.kind, "webhook event acknowledged");
        return Ok(received());
    }

    if let Some(event_id) = event.id.as_deref() {
        if !services.processed_events.claim(event_id, Utc::now()) {
            tracing::info!(event = %event_id, "duplicate webhook delivery ignored");
            return Ok(received());
        }
    }

    match confirm_payment(&services, &event) {
        Ok(()) => Ok(received()),
        Err(e) => {
            if let Some(event_id) = event.id.as_deref() {
                services.processed_events.release(event_id);
            }
            Err(e)
        }
    }
}

fn received() -> Response {
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

fn confirm_payment(services: &AppServices, event: &PaymentEvent) -> Result<(), AppError> {
    let reference = event
        .client_reference_id()
        .ok_or_else(|| AppError::bad_request("Missing client_reference_id on checkout session"))?;
    let booking_id: BookingId = dto::parse_id(reference)?;

    let now = Utc::now();
    let mut outcome = PaymentOutcome::AlreadyPaid;
    let booking = services
        .bookings
        .update(booking_id, &mut |booking: &mut Booking| {
            outcome = booking.mark_paid(event.id.as_deref(), now);
            Ok(())
        })?
        .ok_or_else(|| AppError::missing("booking"))?;

    match outcome {
        PaymentOutcome::Marked => {
            tracing::info!(booking = %booking.id, event = ?event.id, "booking paid");
        }
        PaymentOutcome::AlreadyPaid => {
            tracing::info!(booking = %booking.id, event = ?event.id, "booking already paid");
        }
    }
    Ok(())
}

// -------------------------
// Bookings of the caller
// -------------------------

fn tour_summary(tour: &Tour) -> Value {
    json!({
        "id": tour.id,
        "name": tour.name,
        "slug": tour.slug,
        "image_cover": tour.image_cover,
        "price": tour.price,
        "duration": tour.duration,
        "start_dates": tour.start_dates,
    })
}

pub async fn my_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    let user = current.id();
    let mut bookings = services.bookings.find(&|b: &Booking| b.user == user)?;
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut docs = Vec::with_capacity(bookings.len());
    for booking in &bookings {
        let tour = services
            .tours
            .get(booking.tour)?
            .map(|t| tour_summary(&t))
            .unwrap_or(Value::Null);
        docs.push(dto::with_field(booking.to_public_json(), "tour", tour));
    }
    Ok(dto::list(docs))
}

// -------------------------
// Staff management
// -------------------------

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    common::require_role(&current, STAFF)?;
    let docs = common::run_features(services.bookings.as_ref(), DocumentQuery::new(), &params)?;
    Ok(dto::list(docs))
}

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&current, STAFF)?;
    let draft: BookingDraft = body.parse()?;
    let tour = common::get_document(services.tours.as_ref(), draft.tour)?;
    common::get_document(services.users.as_ref(), draft.user)?;

    let now = Utc::now();
    let price = draft.price.unwrap_or(tour.price);
    let mut booking =
        Booking::pending(tour.id, &tour.slug, price, draft.user, now).map_err(AppError::verbatim)?;
    if draft.paid {
        booking.mark_paid(None, now);
    }

    let booking = services.bookings.insert(booking)?;
    tracing::info!(booking = %booking.id, tour = %tour.id, by = %current.id(), "booking created");
    Ok(dto::single(StatusCode::CREATED, booking.to_public_json()))
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    common::require_role(&current, STAFF)?;
    let id: BookingId = dto::parse_id(&id)?;
    let booking = common::get_document(services.bookings.as_ref(), id)?;
    Ok(dto::single(StatusCode::OK, booking.to_public_json()))
}

pub async fn update_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&current, STAFF)?;
    let id: BookingId = dto::parse_id(&id)?;

    let paid = match body.0.get("paid") {
        None => None,
        Some(Value::Bool(paid)) => Some(*paid),
        Some(_) => return Err(AppError::bad_request("Invalid input data. paid must be a boolean")),
    };
    let patch = body.only(Booking::PATCHABLE);
    if patch.is_empty() && paid.is_none() {
        return Err(AppError::bad_request("No data provided for update"));
    }

    let now = Utc::now();
    let booking = services
        .bookings
        .update(id, &mut |booking: &mut Booking| {
            if !patch.is_empty() {
                *booking = merge_patch(&*booking, &patch)?;
            }
            match paid {
                Some(true) => {
                    booking.mark_paid(None, now);
                }
                Some(false) => booking.mark_unpaid(),
                None => {}
            }
            Ok(())
        })?
        .ok_or_else(|| AppError::missing("booking"))?;

    tracing::info!(booking = %booking.id, paid = booking.paid, by = %current.id(), "booking updated");
    Ok(dto::single(StatusCode::OK, booking.to_public_json()))
}

pub async fn delete_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    common::require_role(&current, STAFF)?;
    let id: BookingId = dto::parse_id(&id)?;
    common::delete_document(services.bookings.as_ref(), id)?;
    tracing::info!(booking = %id, by = %current.id(), "booking deleted");
    Ok(dto::no_content())
}
