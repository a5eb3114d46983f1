//! JSON envelopes: `{success, data, message}` on success and
//! `{success: false, error: {code, message, details}}` on failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: Option<T>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        self.into_response_with(StatusCode::OK)
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: ApiErrorBody,
}

pub fn success<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    ApiResponse::new(Some(data), message).into_response()
}

pub fn created<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    ApiResponse::new(Some(data), message).into_response_with(StatusCode::CREATED)
}

pub fn empty_success(message: impl Into<String>) -> Response {
    ApiResponse::<()>::new(None, message).into_response()
}

pub fn error(code: &str, message: impl Into<String>, details: Option<Value>, status: StatusCode) -> Response {
    let body = ApiErrorResponse {
        success: false,
        error: ApiErrorBody {
            code: code.to_string(),
            message: message.into(),
            details,
        },
    };
    (status, Json(body)).into_response()
}
