use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Multipart, Path, Query},
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use tourbook_auth::{
    Registration, Role, RoleGrant, User, hash_password, hash_reset_token, normalize_email,
    validate_new_password, verify_password,
};
use tourbook_core::casing::keys_to_camel;
use tourbook_core::{Document, DomainError, UserId};
use tourbook_infra::{AppConfig, Blob, DocumentQuery, DocumentStore, Mail};

use crate::app::dto::{self, JsonBody};
use crate::app::errors::AppError;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::{CurrentUser, MaybeUser};
use crate::middleware::{AuthState, JWT_COOKIE, identify, protect};

const PHOTO_SIZE: (u32, u32) = (500, 500);
const SELF_EDITABLE: &[&str] = &[
    "name",
    "email",
    "location",
    "description",
    "facebook",
    "instagram",
    "twitter",
];

pub fn router(auth: AuthState) -> Router {
    let public = Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", patch(reset_password))
        .route("/check-email", post(check_email))
        .route("/image/:profile_slug", get(profile_image));

    let best_effort = Router::new()
        .route("/session", get(session))
        .route_layer(from_fn_with_state(auth.clone(), identify));

    let protected = Router::new()
        .route("/update-my-password", patch(update_my_password))
        .route("/me", get(get_me))
        .route("/update-me", patch(update_me))
        .route("/update-me/photo", patch(update_my_photo))
        .route("/delete-me", axum::routing::delete(delete_me))
        .route("/upload-image-to-imgs", post(upload_image))
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).patch(update_user).delete(delete_user))
        .route_layer(from_fn_with_state(auth, protect));

    public.merge(best_effort).merge(protected)
}

// -------------------------
// Session helpers
// -------------------------

fn session_cookie(config: &AppConfig, value: &str, max_age_secs: i64) -> String {
    let mut cookie = format!("{JWT_COOKIE}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly");
    if config.is_production() {
        cookie.push_str("; Secure; SameSite=None");
    } else {
        cookie.push_str("; SameSite=Lax");
    }
    cookie
}

/// Sign a session for `user` and answer with the token envelope plus cookie.
fn send_token(services: &AppServices, user: &User, status: StatusCode) -> Result<Response, AppError> {
    let token = services
        .jwt
        .issue(user.id, Utc::now())
        .map_err(|e| AppError::Internal(anyhow::Error::from(e).context("failed to sign session token")))?;

    let cookie = session_cookie(&services.config, &token, services.cookie_max_age_secs());
    let body = json!({
        "status": "success",
        "token": token,
        "redirectUrl": format!("{}/dashboard/{}", services.config.public_url, user.profile_slug),
        "data": { "user": keys_to_camel(user.to_public_json()) },
    });
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

fn email_taken(err: DomainError) -> AppError {
    match err {
        DomainError::Conflict(msg) if msg.starts_with("email") => AppError::bad_request("Email already exists"),
        other => other.into(),
    }
}

fn registration(body: &JsonBody) -> Result<Registration, AppError> {
    serde_json::from_value(dto::camel_object(body))
        .map_err(|e| AppError::bad_request(format!("Invalid input data. {e}")))
}

/// Validate a registration and store the new user.
fn register(services: &AppServices, body: &JsonBody, grant: RoleGrant) -> Result<User, AppError> {
    let user = registration(body)?
        .into_user(Utc::now(), grant)
        .map_err(AppError::verbatim)?;
    if services.users.find_unique("email", &user.email)?.is_some() {
        return Err(AppError::bad_request("Email already exists"));
    }
    services.users.insert(user).map_err(email_taken)
}

fn normalize_email_field(patch: &mut serde_json::Map<String, Value>) {
    if let Some(Value::String(email)) = patch.get_mut("email") {
        *email = normalize_email(email);
    }
}

// -------------------------
// Authentication
// -------------------------

pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let user = register(&services, &body, RoleGrant::SelfService)?;
    tracing::info!(user = %user.id, role = %user.role, "user signed up");

    let url = format!("{}/dashboard/{}", services.config.public_url, user.profile_slug);
    if let Err(e) = services.mailer.send(Mail::welcome(&user.email, &user.name, &url)).await {
        tracing::warn!(user = %user.id, error = %e, "welcome email failed");
    }

    send_token(&services, &user, StatusCode::CREATED)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let (Some(email), Some(password)) = (body.str("email"), body.str("password")) else {
        return Err(AppError::bad_request("Please provide email and password!"));
    };

    let user = services
        .users
        .find_unique("email", &normalize_email(email))?
        .filter(|u| u.active && verify_password(password, &u.password_hash));
    let Some(user) = user else {
        tracing::warn!("failed login attempt");
        return Err(AppError::unauthorized("Incorrect email or password"));
    };

    send_token(&services, &user, StatusCode::OK)
}

pub async fn logout(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let cookie = session_cookie(&services.config, "loggedout", 10);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "status": "success" })),
    )
        .into_response()
}

pub async fn forgot_password(
    Extension(services): Extension<Arc<AppServices>>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let email = body
        .str("email")
        .ok_or_else(|| AppError::bad_request("Please provide an email address"))?;
    let user = services
        .users
        .find_unique("email", &normalize_email(email))?
        .filter(|u| u.active)
        .ok_or_else(|| AppError::not_found("There is no user with that email address."))?;

    let now = Utc::now();
    let mut plain = String::new();
    services.users.update(user.id, &mut |u: &mut User| {
        plain = u.start_password_reset(now);
        Ok(())
    })?;

    let url = format!("{}/api/v1/users/reset-password/{plain}", services.config.public_url);
    match services.mailer.send(Mail::password_reset(&user.email, &user.name, &url)).await {
        Ok(()) => Ok(dto::success(json!({ "message": "Token sent to email!" }))),
        Err(e) => {
            tracing::error!(user = %user.id, error = %e, "password reset email failed");
            services.users.update(user.id, &mut |u: &mut User| {
                u.clear_password_reset();
                Ok(())
            })?;
            Err(AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "There was an error sending the email. Try again later!",
            ))
        }
    }
}

fn new_password(body: &JsonBody) -> Result<String, AppError> {
    let (Some(password), Some(confirm)) = (body.str("password"), body.str("password_confirm")) else {
        return Err(AppError::bad_request("Please provide password and passwordConfirm"));
    };
    validate_new_password(password, confirm).map_err(AppError::verbatim)?;
    Ok(hash_password(password)?)
}

pub async fn reset_password(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token): Path<String>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let hashed = hash_reset_token(&token);
    let now = Utc::now();
    let user = services
        .users
        .find_one(&|u: &User| u.reset_token_matches(&hashed, now))?
        .ok_or_else(|| AppError::bad_request("Token is invalid or has expired"))?;

    let hash = new_password(&body)?;
    let user = services
        .users
        .update(user.id, &mut |u: &mut User| {
            u.set_password_hash(hash.clone(), now);
            Ok(())
        })?
        .ok_or_else(|| AppError::missing("user"))?;

    tracing::info!(user = %user.id, "password reset");
    send_token(&services, &user, StatusCode::OK)
}

pub async fn update_my_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let current_password = body.str("password_current").ok_or_else(|| {
        AppError::bad_request("Please provide passwordCurrent, password and passwordConfirm")
    })?;
    if !verify_password(current_password, &current.user().password_hash) {
        return Err(AppError::unauthorized("Your current password is wrong."));
    }

    let hash = new_password(&body)?;
    let now = Utc::now();
    let user = services
        .users
        .update(current.id(), &mut |u: &mut User| {
            u.set_password_hash(hash.clone(), now);
            Ok(())
        })?
        .ok_or_else(|| AppError::missing("user"))?;

    tracing::info!(user = %user.id, "password updated");
    send_token(&services, &user, StatusCode::OK)
}

pub async fn check_email(
    Extension(services): Extension<Arc<AppServices>>,
    body: JsonBody,
) -> Result<Response, AppError> {
    let email = body
        .str("email")
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("Please provide an email address"))?;
    let exists = services.users.find_unique("email", &normalize_email(email))?.is_some();
    Ok(dto::success(json!({ "exists": exists })))
}

pub async fn session(Extension(MaybeUser(user)): Extension<MaybeUser>) -> Response {
    let user = user.map(|u| u.to_public_json()).unwrap_or(Value::Null);
    dto::success(json!({ "data": { "user": user } }))
}

pub async fn profile_image(
    Extension(services): Extension<Arc<AppServices>>,
    Path(profile_slug): Path<String>,
) -> Result<Response, AppError> {
    let user = services
        .users
        .find_unique("profile_slug", &profile_slug)?
        .filter(|u| u.active)
        .ok_or_else(|| AppError::not_found("No user found with that profile"))?;
    let blob = services
        .blobs
        .get(&user.photo)
        .map_err(AppError::verbatim)?
        .ok_or_else(|| AppError::not_found("Image not found"))?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes).into_response())
}

// -------------------------
// Current user
// -------------------------

pub async fn get_me(Extension(current): Extension<CurrentUser>) -> Response {
    dto::single(StatusCode::OK, current.user().to_public_json())
}

pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    body: JsonBody,
) -> Result<Response, AppError> {
    if body.0.contains_key("password") || body.0.contains_key("password_confirm") {
        return Err(AppError::bad_request(
            "This route is not for password updates. Please use /update-my-password.",
        ));
    }

    let mut patch = body.only(SELF_EDITABLE);
    normalize_email_field(&mut patch);
    let user = common::patch_document(services.users.as_ref(), current.id(), &patch)
        .map_err(|e| match e {
            AppError::Operational { message, .. } if message.contains("Duplicate field value: email") => {
                AppError::bad_request("Email already exists")
            }
            other => other,
        })?;

    send_token(&services, &user, StatusCode::OK)
}

pub async fn update_my_photo(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = dto::read_uploads(multipart, &["photo"])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::bad_request("Please upload a photo"))?;

    let (width, height) = PHOTO_SIZE;
    let image = services.images.process(&upload.bytes, width, height)?;
    let name = format!("user-{}-{}.jpeg", current.id(), Utc::now().timestamp_millis());
    services.blobs.put(
        &name,
        Blob {
            content_type: image.content_type().to_string(),
            bytes: image.bytes,
        },
    )?;

    let user = services
        .users
        .update(current.id(), &mut |u: &mut User| {
            u.photo = name.clone();
            Ok(())
        })?
        .ok_or_else(|| AppError::missing("user"))?;

    tracing::info!(user = %user.id, photo = %user.photo, "profile photo updated");
    Ok(dto::single(StatusCode::OK, user.to_public_json()))
}

pub async fn delete_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response, AppError> {
    services.users.update(current.id(), &mut |u: &mut User| {
        u.active = false;
        Ok(())
    })?;
    tracing::info!(user = %current.id(), "user deactivated");
    Ok(dto::no_content())
}

// -------------------------
// Administration
// -------------------------

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::Admin])?;
    let base = DocumentQuery::new().where_eq("active", true);
    let docs = common::run_features(services.users.as_ref(), base, &params)?;
    Ok(dto::list(docs))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::Admin])?;
    let user = register(&services, &body, RoleGrant::ByAdmin)?;
    tracing::info!(user = %user.id, role = %user.role, by = %current.id(), "user created");
    Ok(dto::single(StatusCode::CREATED, user.to_public_json()))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::Admin])?;
    let id: UserId = dto::parse_id(&id)?;
    let user = common::get_document(services.users.as_ref(), id)?;
    Ok(dto::single(StatusCode::OK, user.to_public_json()))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    body: JsonBody,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::Admin])?;
    let id: UserId = dto::parse_id(&id)?;
    let mut patch = body.0;
    normalize_email_field(&mut patch);
    let user = common::patch_document(services.users.as_ref(), id, &patch)?;
    Ok(dto::single(StatusCode::OK, user.to_public_json()))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::Admin])?;
    let id: UserId = dto::parse_id(&id)?;
    let user = common::delete_document(services.users.as_ref(), id)?;
    tracing::info!(user = %user.id, by = %current.id(), "user deleted");
    Ok(dto::no_content())
}

pub async fn upload_image(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    common::require_role(&current, &[Role::Admin])?;
    let upload = dto::read_uploads(multipart, &["photo"])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::bad_request("Please upload a photo"))?;

    let (width, height) = PHOTO_SIZE;
    let image = services.images.process(&upload.bytes, width, height)?;
    let filename = format!("img-{}.jpeg", Uuid::new_v4());
    services.blobs.put(
        &filename,
        Blob {
            content_type: image.content_type().to_string(),
            bytes: image.bytes,
        },
    )?;

    let url = format!("{}/api/v1/tours/images/{filename}", services.config.public_url);
    let body = json!({ "status": "success", "data": { "filename": filename, "url": url } });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourbook_infra::Environment;

    #[test]
    fn cookie_flags_follow_environment() {
        let mut config = AppConfig::default();
        let dev = session_cookie(&config, "t", 60);
        assert!(dev.contains("HttpOnly"));
        assert!(dev.contains("SameSite=Lax"));
        assert!(!dev.contains("Secure"));

        config.env = Environment::Production;
        let prod = session_cookie(&config, "t", 60);
        assert!(prod.contains("Secure; SameSite=None"));
        assert!(prod.starts_with("jwt=t; Path=/; Max-Age=60"));
    }
}
