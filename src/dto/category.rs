use serde::Deserialize;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl CategoryCreateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() || self.name.chars().count() > 255 {
            return Err(AppError::ValidationError(
                "category name must be between 1 and 255 characters".to_string(),
            ));
        }
        Ok(())
    }
}
