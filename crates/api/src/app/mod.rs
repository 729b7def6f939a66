//! HTTP API application wiring (Axum router + service wiring).
//!
//! If you're new to Rust, this folder is structured like:
//! - `services.rs`: store wiring and deployment settings
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request DTOs and the JSON body extractor
//! - `errors.rs`: consistent error responses

use std::any::Any;
use std::sync::Arc;

use axum::{Extension, Router, extract::DefaultBodyLimit, response::Response};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, Settings, build_services};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: AppServices) -> Router {
    let authenticator = services.authenticator.clone();

    routes::router()
        .fallback(routes::system::not_found)
        .layer(axum::middleware::from_fn(middleware::json_method_not_allowed))
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            authenticator,
            middleware::authenticate,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handle_panic)),
        )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %detail, "handler panicked");
    errors::server_error()
}
