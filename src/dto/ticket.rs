use rust_decimal::Decimal;
use serde::Deserialize;

use crate::utils::error::AppError;

/// Prices are stored as `NUMERIC(12, 2)`.
const PRICE_SCALE: u32 = 2;
const PRICE_LIMIT: i64 = 10_000_000_000;

pub(crate) fn validate_ticket_fields(name: &str, price: Decimal, total_qty: i32) -> Result<(), AppError> {
    let len = name.trim().chars().count();
    if len == 0 || name.chars().count() > 255 {
        return Err(AppError::ValidationError(
            "ticket name must be between 1 and 255 characters".to_string(),
        ));
    }
    if price < Decimal::ZERO {
        return Err(AppError::ValidationError("ticket price must not be negative".to_string()));
    }
    if price.normalize().scale() > PRICE_SCALE || price >= Decimal::from(PRICE_LIMIT) {
        return Err(AppError::ValidationError(
            "ticket price must be below 10000000000 with at most 2 decimal places".to_string(),
        ));
    }
    if total_qty < 0 {
        return Err(AppError::ValidationError(
            "ticket total_qty must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// A ticket nested in an event payload. With an `id` it updates that ticket
/// (only the fields sent), without one it creates a new ticket for the event
/// with `price` and `total_qty` defaulting to zero.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub total_qty: Option<i32>,
}

impl TicketInput {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_ticket_fields(
            &self.name,
            self.price.unwrap_or_default(),
            self.total_qty.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketCreateRequest {
    pub event_id: String,
    pub name: String,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub total_qty: i32,
}

impl TicketCreateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_ticket_fields(&self.name, self.price, self.total_qty)
    }
}
