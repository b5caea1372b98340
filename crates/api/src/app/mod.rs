//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: stores, adapters and token signing shared by handlers
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response envelopes and camelCase mapping
//! - `errors.rs`: operational errors and their rendering

use std::sync::Arc;

use axum::{Extension, Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};
use tower::ServiceBuilder;

use tourbook_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router with in-memory services (entrypoint used by `main.rs`).
pub fn build_app(config: AppConfig) -> Router {
    build_app_with(Arc::new(services::AppServices::in_memory(config)))
}

/// Build the router over already-wired services; tests use this to seed stores.
pub fn build_app_with(services: Arc<services::AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        jwt: Arc::new(services.jwt.clone()),
        users: services.users.clone(),
    };
    let env = services.config.env;

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", routes::router(auth_state))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(middleware::trace_requests))
                .layer(from_fn_with_state(env, middleware::render_errors))
                .layer(Extension(services)),
        )
}
