use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One-time numeric code bound to a resource, e.g. an email verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Token {
    pub id: Uuid,
    pub code: i32,
    pub resource_type: String,
    pub resource_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewToken {
    pub code: i32,
    pub resource_type: String,
    pub resource_id: String,
    pub expires_at: DateTime<Utc>,
}
