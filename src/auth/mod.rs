//! Bearer authentication for handlers.
//!
//! [`CurrentUser`] requires a valid access token for an existing user;
//! [`AdminUser`] additionally requires the `admin` role.

pub mod jwt;
pub mod password;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::models::{User, UserRole};
use crate::state::AppState;
use crate::utils::error::AppError;

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::AuthError("Missing authorization header".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| {
            AppError::AuthError("Expected 'Bearer <token>' authorization".to_string())
        })?;

    if token.is_empty() {
        return Err(AppError::AuthError("Empty bearer token".to_string()));
    }
    Ok(token)
}

#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = state.tokens.verify(bearer_token(parts)?)?;

        let mut session = state.store.snapshot().await?;
        let user = session
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::AuthError("Could not validate credentials".to_string()))?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        Ok(CurrentUser(user))
    }
}

#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.has_role(UserRole::Admin) {
            return Err(AppError::Forbidden("Does not have enough access".to_string()));
        }
        Ok(AdminUser(user))
    }
}
