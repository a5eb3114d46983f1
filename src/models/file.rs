use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::pagination::{Record, SortKey};

/// Metadata of an uploaded blob. Events and users only reference files, they
/// never own them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct File {
    pub id: Uuid,
    pub file_path: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub size: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for File {
    fn id(&self) -> Uuid {
        self.id
    }

    fn text(&self, column: &str) -> Option<&str> {
        match column {
            "file_path" => Some(&self.file_path),
            "type" => self.file_type.as_deref(),
            _ => None,
        }
    }

    fn sort_key(&self, column: &str) -> SortKey {
        match column {
            "file_path" => SortKey::Text(self.file_path.clone()),
            "size" => self.size.map(SortKey::Int).unwrap_or(SortKey::Null),
            _ => SortKey::Time(self.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub file_path: String,
    pub file_type: Option<String>,
    pub size: Option<i64>,
}
