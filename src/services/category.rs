use tracing::info;
use uuid::Uuid;

use crate::dto::CategoryCreateRequest;
use crate::models::{Category, NewCategory};
use crate::state::AppState;
use crate::store::{StoreError, CATEGORY_NAME_CONSTRAINT};
use crate::utils::error::AppError;

pub async fn create(state: &AppState, request: CategoryCreateRequest) -> Result<Category, AppError> {
    request.validate()?;

    let mut session = state.store.begin().await?;
    let category = session
        .insert_category(&NewCategory {
            name: request.name.trim().to_string(),
            description: request.description,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(c) if c == CATEGORY_NAME_CONSTRAINT => {
                AppError::Conflict(format!("category '{}' already exists", request.name.trim()))
            }
            other => other.into(),
        })?;
    session.commit().await?;

    info!(category_id = %category.id, name = %category.name, "category created");
    Ok(category)
}

/// Every category, newest first.
pub async fn find_all(state: &AppState) -> Result<Vec<Category>, AppError> {
    let mut session = state.store.snapshot().await?;
    Ok(session.list_categories().await?)
}

pub async fn find_by_id(state: &AppState, id: Uuid) -> Result<Option<Category>, AppError> {
    let mut session = state.store.snapshot().await?;
    Ok(session.find_category(id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::test_state;

    fn request(name: &str) -> CategoryCreateRequest {
        CategoryCreateRequest {
            name: name.to_string(),
            description: Some("desc".to_string()),
        }
    }

    #[tokio::test]
    async fn test_find_all_returns_newest_first() {
        let (state, _) = test_state();
        create(&state, request("Theatre")).await.unwrap();
        let music = create(&state, request("Music")).await.unwrap();

        let all = find_all(&state).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], music);
        assert_eq!(all[0].description.as_deref(), Some("desc"));
        assert_eq!(find_by_id(&state, music.id).await.unwrap(), Some(music));
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let (state, _) = test_state();
        create(&state, request("Music")).await.unwrap();
        let err = create(&state, request(" Music ")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(find_all(&state).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_name_is_invalid() {
        let (state, _) = test_state();
        let err = create(&state, request("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_unknown_id_is_none() {
        let (state, _) = test_state();
        assert_eq!(find_by_id(&state, Uuid::new_v4()).await.unwrap(), None);
    }
}
