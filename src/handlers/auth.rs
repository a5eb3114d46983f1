use axum::extract::State;
use axum::response::Response;

use crate::auth::CurrentUser;
use crate::dto::{LoginRequest, RegisterRequest};
use crate::services;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::response::{created, success};

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<Response, AppError> {
    let user = services::auth::register(&state, request).await?;
    Ok(created(user, "User registered"))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    let response = services::auth::login(&state, request).await?;
    Ok(success(response, "Login successful"))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    let user = services::user::me(&state, &user).await?;
    Ok(success(user, "Current user"))
}
