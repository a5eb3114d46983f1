//! HTTP handlers. Each one extracts, calls a service and wraps the result in
//! the response envelope.

pub mod auth;
pub mod category;
pub mod event;
pub mod file;
pub mod ticket;
pub mod user;

use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::utils::response::success;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "event-booker-api",
    };

    success(payload, "Health check successful").into_response()
}
