use serde::Serialize;
use uuid::Uuid;

use crate::models::File;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRead {
    pub id: Uuid,
    pub file_path: String,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub size: Option<i64>,
    /// Presigned download link; `None` when signing failed.
    pub link: Option<String>,
}

impl FileRead {
    pub fn new(file: File, link: Option<String>) -> Self {
        Self {
            id: file.id,
            file_path: file.file_path,
            file_type: file.file_type,
            size: file.size,
            link,
        }
    }
}

/// Short form of a file embedded in another resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRef {
    pub id: Uuid,
    pub file_path: String,
    pub link: Option<String>,
}

impl From<FileRead> for FileRef {
    fn from(file: FileRead) -> Self {
        Self {
            id: file.id,
            file_path: file.file_path,
            link: file.link,
        }
    }
}
