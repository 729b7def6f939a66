use axum::{Router, routing::get};

use crate::middleware;

pub mod books;
pub mod system;
pub mod tokens;
pub mod users;

/// Router for every `/v1` endpoint. Book routes require an activated user.
pub fn router() -> Router {
    let books = books::router().route_layer(axum::middleware::from_fn(
        middleware::require_activated_user,
    ));

    Router::new()
        .route("/v1/healthcheck", get(system::healthcheck))
        .merge(users::router())
        .merge(tokens::router())
        .merge(books)
}
