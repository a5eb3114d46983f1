use axum::extract::{Path, State};
use axum::response::Response;

use crate::auth::CurrentUser;
use crate::dto::{ProfileUpdateRequest, VerifyCodeRequest};
use crate::pagination::PaginationQuery;
use crate::services;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{ApiJson, ApiQuery};
use crate::utils::parse_id;
use crate::utils::response::{empty_success, success};

pub async fn list_users(
    State(state): State<AppState>,
    _: CurrentUser,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> Result<Response, AppError> {
    let page = services::user::list(&state, &query).await?;
    Ok(success(page, "Users fetched"))
}

pub async fn get_user(
    State(state): State<AppState>,
    _: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id("user", &id)?;
    let user = services::user::find_by_id(&state, id)
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;
    Ok(success(user, "User fetched"))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<ProfileUpdateRequest>,
) -> Result<Response, AppError> {
    let user = services::user::update_profile(&state, user.id, request).await?;
    Ok(success(user, "Profile updated"))
}

pub async fn send_email_verification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Response, AppError> {
    services::user::send_email_verification(&state, &user).await?;
    Ok(empty_success("Verification code sent"))
}

pub async fn verify_email(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<VerifyCodeRequest>,
) -> Result<Response, AppError> {
    let user = services::user::verify_email(&state, &user, request.code).await?;
    Ok(success(user, "Email verified"))
}
