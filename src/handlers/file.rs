use axum::extract::{Multipart, State};
use axum::response::Response;

use crate::auth::CurrentUser;
use crate::pagination::PaginationQuery;
use crate::services;
use crate::services::file::Upload;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiQuery;
use crate::utils::response::{created, success};

pub async fn list_files(
    State(state): State<AppState>,
    _: CurrentUser,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> Result<Response, AppError> {
    let page = services::file::list(&state, &query).await?;
    Ok(success(page, "Files fetched"))
}

/// Multipart form with a `file` part and a `folder` text field.
pub async fn upload_file(
    State(state): State<AppState>,
    _: CurrentUser,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut folder = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(e.body_text()))?
    {
        match field.name() {
            Some("folder") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::ValidationError(e.body_text()))?;
                folder = Some(text);
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::ValidationError(e.body_text()))?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| AppError::ValidationError("missing 'file' part".to_string()))?;
    let folder =
        folder.ok_or_else(|| AppError::ValidationError("missing 'folder' field".to_string()))?;

    let read = services::file::upload(
        &state,
        Upload {
            folder,
            filename,
            content_type,
            bytes,
        },
    )
    .await?;
    Ok(created(read, "File uploaded"))
}
