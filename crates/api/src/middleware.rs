use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::Instrument;

use tourbook_auth::{JwtValidator, User};
use tourbook_infra::{DocumentStore, Environment};
use tourbook_observability::{RequestId, request_span};

use crate::app::errors::{AppError, ErrorReport};
use crate::context::{CurrentUser, MaybeUser};

pub const JWT_COOKIE: &str = "jwt";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub users: Arc<dyn DocumentStore<User>>,
}

/// Require a valid session; inserts [`CurrentUser`].
pub async fn protect(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(req.headers()).ok_or_else(|| {
        AppError::unauthorized("You are not logged in! Please log in to get access.")
    })?;

    let user = match resolve_user(&state, &token) {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(path = %req.uri().path(), reason = %e, "rejected session");
            return Err(e);
        }
    };

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Resolve a session if one is presented; never rejects. Inserts [`MaybeUser`].
pub async fn identify(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let user = extract_token(req.headers()).and_then(|token| resolve_user(&state, &token).ok());
    req.extensions_mut().insert(MaybeUser(user));
    next.run(req).await
}

fn resolve_user(state: &AuthState, token: &str) -> Result<User, AppError> {
    let claims = state.jwt.validate(token, Utc::now())?;

    let gone = || AppError::unauthorized("The user belonging to this token does no longer exist.");
    let user = state.users.get(claims.sub)?.ok_or_else(gone)?;
    if !user.active {
        return Err(gone());
    }

    if user.changed_password_after(claims.iat) {
        return Err(AppError::unauthorized(
            "User recently changed password! Please log in again.",
        ));
    }
    Ok(user)
}

/// Bearer header first, then the `jwt` cookie.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == JWT_COOKIE && !value.is_empty() && *value != "loggedout")
        .map(|(_, value)| value.to_string())
}

/// Re-render error responses for the active environment.
pub async fn render_errors(State(env): State<Environment>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) if env == Environment::Development => report.render(env),
        _ => response,
    }
}

/// Wrap each request in a span carrying a correlation id and log its outcome.
pub async fn trace_requests(req: Request, next: Next) -> Response {
    let id = RequestId::from_header(
        req.headers()
            .get("x-request-id")
            .and_then(|h| h.to_str().ok()),
    );
    let span = request_span(id, req.method().as_str(), req.uri().path());
    let started = Instant::now();

    async move {
        let response = next.run(req).await;
        let status = response.status().as_u16();
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if response.status().is_server_error() {
            tracing::error!(status, elapsed_ms, "request failed");
        } else {
            tracing::info!(status, elapsed_ms, "request completed");
        }
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=def"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_is_used_when_no_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; jwt=def"));
        assert_eq!(extract_token(&headers).as_deref(), Some("def"));
    }

    #[test]
    fn logged_out_cookie_is_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=loggedout"));
        assert_eq!(extract_token(&headers), None);
    }
}
