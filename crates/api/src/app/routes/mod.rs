use axum::Router;

use crate::middleware::AuthState;

pub mod bookings;
pub mod common;
pub mod reviews;
pub mod system;
pub mod testimonials;
pub mod tours;
pub mod users;

/// Router for every `/api/v1` resource. Each resource guards its own
/// protected routes with `middleware::protect`.
pub fn router(auth: AuthState) -> Router {
    Router::new()
        .nest("/tours", tours::router(auth.clone()))
        .nest("/users", users::router(auth.clone()))
        .nest("/reviews", reviews::router(auth.clone()))
        .nest("/testimonials", testimonials::router(auth.clone()))
        .nest("/bookings", bookings::router(auth))
}
