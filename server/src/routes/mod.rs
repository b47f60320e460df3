//! Read-only facade routes
//!
//! Everything the UI needs lives under `/api/v1`. The only mutation is the
//! printer authorization update; all other endpoints are snapshots of
//! monitor state.

pub mod printers;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use crate::state::AppState;

/// Error body shape the UI expects.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn printer_not_found() -> (StatusCode, Json<Self>) {
        (
            StatusCode::NOT_FOUND,
            Json(Self {
                error: "printer not found".to_string(),
            }),
        )
    }

    pub fn not_found(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::NOT_FOUND,
            Json(Self {
                error: message.into(),
            }),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self {
                error: message.into(),
            }),
        )
    }
}

/// Create the v1 API router
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(ping))
        .route("/printers", get(printers::list_printers))
        .route(
            "/printers/{key}",
            get(printers::get_printer).put(printers::update_printer),
        )
        .route(
            "/printers/{key}/latest_thumb",
            get(printers::latest_thumbnail),
        )
}

async fn ping() -> impl IntoResponse {
    Json(json!({ "message": "pong" }))
}
