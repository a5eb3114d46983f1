use axum::extract::{Path, State};
use axum::response::Response;

use crate::auth::AdminUser;
use crate::dto::{EventCreateRequest, EventListQuery, EventUpdateRequest};
use crate::services;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{ApiJson, ApiQuery};
use crate::utils::parse_id;
use crate::utils::response::{created, empty_success, success};

pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventListQuery>,
) -> Result<Response, AppError> {
    let page = services::event::list(&state, &query).await?;
    Ok(success(page, "Events fetched"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id("event", &id)?;
    let event = services::event::find_by_id(&state, id)
        .await?
        .ok_or_else(|| AppError::not_found("event", id))?;
    Ok(success(event, "Event fetched"))
}

pub async fn create_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(request): ApiJson<EventCreateRequest>,
) -> Result<Response, AppError> {
    let event = services::event::create_event(&state, admin.id, request).await?;
    Ok(created(event, "Event created"))
}

pub async fn update_event(
    State(state): State<AppState>,
    _: AdminUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<EventUpdateRequest>,
) -> Result<Response, AppError> {
    let id = parse_id("event", &id)?;
    let event = services::event::update_event(&state, id, request).await?;
    Ok(success(event, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    _: AdminUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id("event", &id)?;
    services::event::delete_event(&state, id).await?;
    Ok(empty_success("Event deleted"))
}
