use axum::extract::State;
use axum::response::Response;

use crate::auth::AdminUser;
use crate::dto::CategoryCreateRequest;
use crate::services;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::response::{created, success};

pub async fn list_categories(State(state): State<AppState>) -> Result<Response, AppError> {
    let categories = services::category::find_all(&state).await?;
    Ok(success(categories, "Categories fetched"))
}

pub async fn create_category(
    State(state): State<AppState>,
    _: AdminUser,
    ApiJson(request): ApiJson<CategoryCreateRequest>,
) -> Result<Response, AppError> {
    let category = services::category::create(&state, request).await?;
    Ok(created(category, "Category created"))
}
