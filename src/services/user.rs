use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{file, token};
use crate::dto::{ProfileUpdateRequest, UserRead};
use crate::models::{File, User, UserChanges};
use crate::pagination::{PageRequest, Paginated, PaginationQuery, USER_LISTING};
use crate::state::AppState;
use crate::store::{Session, StoreError, USER_PHONE_CONSTRAINT};
use crate::utils::error::AppError;

pub(crate) async fn render(state: &AppState, user: User, profile: Option<File>) -> UserRead {
    let profile = match profile {
        Some(f) => Some(file::to_read(state.blobs.as_ref(), state.file_link_ttl(), f).await),
        None => None,
    };
    UserRead::new(user, profile)
}

pub(crate) async fn load_profile(
    session: &mut dyn Session,
    user: &User,
) -> Result<Option<File>, AppError> {
    match user.profile_id {
        Some(id) => Ok(session.find_file(id).await?),
        None => Ok(None),
    }
}

pub(crate) fn phone_conflict(err: StoreError) -> AppError {
    if err.is_unique_violation_of(USER_PHONE_CONSTRAINT) {
        AppError::Conflict("Phone number already used".to_string())
    } else {
        err.into()
    }
}

pub async fn find_by_id(state: &AppState, id: Uuid) -> Result<Option<UserRead>, AppError> {
    let (user, profile) = {
        let mut session = state.store.snapshot().await?;
        let Some(user) = session.find_user(id).await? else {
            return Ok(None);
        };
        let profile = load_profile(session.as_mut(), &user).await?;
        (user, profile)
    };
    Ok(Some(render(state, user, profile).await))
}

/// Re-reads `user` so the response reflects committed state.
pub async fn me(state: &AppState, user: &User) -> Result<UserRead, AppError> {
    find_by_id(state, user.id)
        .await?
        .ok_or_else(|| AppError::AuthError("User no longer exists".to_string()))
}

pub async fn list(state: &AppState, query: &PaginationQuery) -> Result<Paginated<UserRead>, AppError> {
    let page = PageRequest::new(&USER_LISTING, query);
    let (rows, total, profiles) = {
        let mut session = state.store.snapshot().await?;
        let (rows, total) = session.list_users(&page).await?;
        let ids: Vec<Uuid> = rows.iter().filter_map(|u| u.profile_id).collect();
        let profiles: HashMap<Uuid, File> = session
            .find_files(&ids)
            .await?
            .into_iter()
            .map(|f| (f.id, f))
            .collect();
        (rows, total, profiles)
    };

    let mut list = Vec::with_capacity(rows.len());
    for user in rows {
        let profile = user.profile_id.and_then(|id| profiles.get(&id).cloned());
        list.push(render(state, user, profile).await);
    }
    Ok(Paginated::new(list, total, page.limit))
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    request: ProfileUpdateRequest,
) -> Result<UserRead, AppError> {
    request.validate()?;

    let mut session = state.store.begin().await?;
    let user = session
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user", user_id))?;

    let profile_id = match &request.profile_id {
        Some(raw) => Some(file::resolve(session.as_mut(), raw.as_deref()).await?),
        None => None,
    };

    let phone_number = request
        .phone_number
        .map(|phone| phone.map(|p| p.trim().to_string()))
        .filter(|phone| *phone != user.phone_number);

    let changes = UserChanges {
        full_name: request.full_name.map(|n| n.map(|n| n.trim().to_string())),
        dob: request.dob,
        gender: request.gender,
        phone_verified_at: phone_number.as_ref().map(|_| None),
        phone_number,
        email_verified_at: None,
        profile_id,
    };

    let user = if changes.is_empty() {
        user
    } else {
        session
            .update_user(user_id, &changes)
            .await
            .map_err(phone_conflict)?
            .ok_or_else(|| AppError::not_found("user", user_id))?
    };
    let profile = load_profile(session.as_mut(), &user).await?;
    session.commit().await?;

    info!(user_id = %user_id, "profile updated");
    Ok(render(state, user, profile).await)
}

fn verification_mail(code: i32) -> String {
    format!(
        "<p>Your email verification code is <strong>{code:06}</strong>.</p>\
         <p>It expires in 5 minutes.</p>"
    )
}

/// Stores a fresh code and mails it without holding up the response.
pub async fn send_email_verification(state: &AppState, user: &User) -> Result<(), AppError> {
    if user.email_verified_at.is_some() {
        return Err(AppError::ValidationError("email already verified".to_string()));
    }

    let mut session = state.store.begin().await?;
    let code = token::create_token(
        session.as_mut(),
        token::EMAIL_VERIFICATION,
        &user.id.to_string(),
    )
    .await?;
    session.commit().await?;

    let mailer = state.mailer.clone();
    let to = vec![user.email.clone()];
    let user_id = user.id;
    tokio::spawn(async move {
        if let Err(e) = mailer
            .send(&to, "Verify your email", &verification_mail(code))
            .await
        {
            warn!(user_id = %user_id, error = %e, "failed to send verification email");
        }
    });

    info!(user_id = %user.id, "email verification code sent");
    Ok(())
}

pub async fn verify_email(state: &AppState, user: &User, code: i32) -> Result<UserRead, AppError> {
    if user.email_verified_at.is_some() {
        return Err(AppError::ValidationError("email already verified".to_string()));
    }

    let mut session = state.store.begin().await?;
    let valid = token::verify_token(
        session.as_mut(),
        code,
        token::EMAIL_VERIFICATION,
        &user.id.to_string(),
        true,
    )
    .await?;
    if !valid {
        return Err(AppError::ValidationError("Invalid token".to_string()));
    }

    let changes = UserChanges {
        email_verified_at: Some(Some(Utc::now())),
        ..UserChanges::default()
    };
    let updated = session
        .update_user(user.id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("user", user.id))?;
    let profile = load_profile(session.as_mut(), &updated).await?;
    session.commit().await?;

    info!(user_id = %user.id, "email verified");
    Ok(render(state, updated, profile).await)
}
