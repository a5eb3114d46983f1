use axum::extract::{Path, State};
use axum::response::Response;

use crate::auth::AdminUser;
use crate::dto::TicketCreateRequest;
use crate::services;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::parse_id;
use crate::utils::response::{created, success};

pub async fn create_ticket(
    State(state): State<AppState>,
    _: AdminUser,
    ApiJson(request): ApiJson<TicketCreateRequest>,
) -> Result<Response, AppError> {
    let ticket = services::ticket::create(&state, request).await?;
    Ok(created(ticket, "Ticket created"))
}

pub async fn tickets_of_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id("event", &event_id)?;
    let tickets = services::ticket::find_by_event(&state, event_id).await?;
    Ok(success(tickets, "Tickets fetched"))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_id("ticket", &id)?;
    let ticket = services::ticket::find_by_id(&state, id)
        .await?
        .ok_or_else(|| AppError::not_found("ticket", id))?;
    Ok(success(ticket, "Ticket fetched"))
}
