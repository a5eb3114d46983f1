pub mod error;
pub mod extract;
pub mod response;

use uuid::Uuid;

use crate::utils::error::AppError;

/// Parses a client supplied identifier, naming the entity in the error.
pub fn parse_id(entity: &str, raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidId(format!("invalid {} id: {}", entity, raw)))
}

/// Keeps the first occurrence of every id, preserving order.
pub fn dedup_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
