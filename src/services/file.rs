use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::dto::FileRead;
use crate::models::{File, NewFile};
use crate::pagination::{PageRequest, Paginated, PaginationQuery, FILE_LISTING};
use crate::state::AppState;
use crate::store::Session;
use crate::utils::error::AppError;
use crate::utils::parse_id;

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub folder: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn validate_folder(folder: &str) -> Result<&str, AppError> {
    let folder = folder.trim().trim_matches('/');
    let valid = !folder.is_empty()
        && folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
        && folder.split('/').all(|segment| !segment.is_empty());
    if valid {
        Ok(folder)
    } else {
        Err(AppError::ValidationError(format!(
            "invalid folder '{}': use letters, digits, '_', '-' and '/'",
            folder
        )))
    }
}

fn extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string())
}

pub fn object_key(folder: &str, filename: &str) -> Result<String, AppError> {
    let folder = validate_folder(folder)?;
    Ok(format!("{}/{}.{}", folder, Uuid::new_v4(), extension(filename)))
}

/// Attaches a presigned link. Signing failures only cost the link.
pub async fn to_read(blobs: &dyn BlobStore, ttl: Duration, file: File) -> FileRead {
    let link = match blobs.presign(&file.file_path, ttl).await {
        Ok(link) => Some(link),
        Err(e) => {
            warn!(file_id = %file.id, key = %file.file_path, error = %e, "could not presign file link");
            None
        }
    };
    FileRead::new(file, link)
}

/// Resolves an optional client supplied file id, failing when it does not
/// point at a stored file.
pub async fn resolve(session: &mut dyn Session, raw: Option<&str>) -> Result<Option<Uuid>, AppError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let id = parse_id("file", raw)?;
    match session.find_file(id).await? {
        Some(_) => Ok(Some(id)),
        None => Err(AppError::not_found("file", id)),
    }
}

pub async fn upload(state: &AppState, upload: Upload) -> Result<FileRead, AppError> {
    let key = object_key(&upload.folder, &upload.filename)?;
    let size = upload.bytes.len() as i64;

    state
        .blobs
        .put(&key, upload.bytes, upload.content_type.as_deref())
        .await
        .map_err(|e| {
            AppError::ExternalServiceError(format!("failed to store uploaded file: {}", e))
        })?;

    let mut session = state.store.begin().await?;
    let file = session
        .insert_file(&NewFile {
            file_path: key,
            file_type: upload.content_type,
            size: Some(size),
        })
        .await?;
    session.commit().await?;

    info!(file_id = %file.id, key = %file.file_path, size, "file uploaded");
    Ok(to_read(state.blobs.as_ref(), state.file_link_ttl(), file).await)
}

pub async fn list(state: &AppState, query: &PaginationQuery) -> Result<Paginated<FileRead>, AppError> {
    let page = PageRequest::new(&FILE_LISTING, query);
    let (rows, total) = {
        let mut session = state.store.snapshot().await?;
        session.list_files(&page).await?
    };

    let mut list = Vec::with_capacity(rows.len());
    for file in rows {
        list.push(to_read(state.blobs.as_ref(), state.file_link_ttl(), file).await);
    }
    Ok(Paginated::new(list, total, page.limit))
}

pub async fn find_by_id(state: &AppState, id: Uuid) -> Result<Option<FileRead>, AppError> {
    let file = state.store.snapshot().await?.find_file(id).await?;
    match file {
        Some(file) => Ok(Some(
            to_read(state.blobs.as_ref(), state.file_link_ttl(), file).await,
        )),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;
    use rstest::rstest;

    fn png(folder: &str) -> Upload {
        Upload {
            folder: folder.to_string(),
            filename: "Banner.PNG".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: vec![1, 2, 3, 4],
        }
    }

    #[rstest]
    #[case("events", true)]
    #[case("/events/banners/", true)]
    #[case("user_profile-2", true)]
    #[case("", false)]
    #[case("a//b", false)]
    #[case("../etc", false)]
    #[case("with space", false)]
    fn test_folder_rules(#[case] folder: &str, #[case] ok: bool) {
        assert_eq!(validate_folder(folder).is_ok(), ok);
    }

    #[test]
    fn test_object_key_shape() {
        let key = object_key("events", "photo.JPG").unwrap();
        assert!(key.starts_with("events/"));
        assert!(key.ends_with(".jpg"));
        assert_eq!(object_key("x", "README").unwrap().rsplit('.').next(), Some("bin"));
    }

    #[tokio::test]
    async fn test_upload_stores_blob_and_row() {
        let (state, _) = test_state();
        let file = upload(&state, png("events")).await.unwrap();

        assert!(file.file_path.starts_with("events/"));
        assert_eq!(file.file_type.as_deref(), Some("image/png"));
        assert_eq!(file.size, Some(4));
        let link = file.link.clone().unwrap();
        assert!(link.contains(&file.file_path));

        let found = find_by_id(&state, file.id).await.unwrap().unwrap();
        assert_eq!(found, file);
    }

    #[tokio::test]
    async fn test_link_is_null_when_blob_is_missing() {
        let (state, _) = test_state();
        let file = {
            let mut session = state.store.begin().await.unwrap();
            let file = session
                .insert_file(&NewFile {
                    file_path: "events/gone.png".into(),
                    file_type: None,
                    size: None,
                })
                .await
                .unwrap();
            session.commit().await.unwrap();
            file
        };

        let read = find_by_id(&state, file.id).await.unwrap().unwrap();
        assert!(read.link.is_none());
    }

    #[tokio::test]
    async fn test_list_is_paginated_and_searchable() {
        let (state, _) = test_state();
        for _ in 0..3 {
            upload(&state, png("events")).await.unwrap();
        }
        upload(&state, png("avatars")).await.unwrap();

        let query = PaginationQuery {
            search: Some("EVENTS/".into()),
            limit: Some(2),
            ..PaginationQuery::default()
        };
        let page = list(&state, &query).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_page, 2);
        assert_eq!(page.list.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_reports_missing_and_malformed_ids() {
        let (state, _) = test_state();
        let mut session = state.store.begin().await.unwrap();

        assert_eq!(resolve(session.as_mut(), None).await.unwrap(), None);
        assert!(matches!(
            resolve(session.as_mut(), Some("nope")).await,
            Err(AppError::InvalidId(_))
        ));
        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            resolve(session.as_mut(), Some(&missing)).await,
            Err(AppError::NotFound(_))
        ));
    }
}
