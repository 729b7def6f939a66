use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use serde_json::json;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub async fn healthcheck(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    Json(json!({
        "status": "available",
        "system_info": {
            "environment": services.settings.environment,
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
