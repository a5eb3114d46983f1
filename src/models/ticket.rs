use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A ticket tier of an event. `total_booked` belongs to the booking flow and
/// is never written here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub total_qty: i32,
    pub total_booked: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub event_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub total_qty: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketChanges {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub total_qty: Option<i32>,
}

impl TicketChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, ticket: &mut Ticket) {
        if let Some(name) = &self.name {
            ticket.name = name.clone();
        }
        if let Some(price) = self.price {
            ticket.price = price;
        }
        if let Some(total_qty) = self.total_qty {
            ticket.total_qty = total_qty;
        }
    }
}
