use tracing::{debug, info};
use uuid::Uuid;

use crate::dto::{TicketCreateRequest, TicketInput};
use crate::models::{NewTicket, Ticket, TicketChanges};
use crate::state::AppState;
use crate::store::Session;
use crate::utils::error::AppError;
use crate::utils::parse_id;

/// Only the fields that differ from the stored ticket.
fn changes_for(ticket: &Ticket, item: &TicketInput) -> TicketChanges {
    TicketChanges {
        name: Some(item.name.trim().to_string()).filter(|name| *name != ticket.name),
        price: item.price.filter(|price| *price != ticket.price),
        total_qty: item.total_qty.filter(|qty| *qty != ticket.total_qty),
    }
}

/// Creates or updates the tickets of `event_id`, returning them in input
/// order. An item with an id must name a ticket of this event; tickets that
/// are not mentioned stay as they are. `total_booked` is never written.
pub async fn upsert(
    session: &mut dyn Session,
    event_id: Uuid,
    items: &[TicketInput],
) -> Result<Vec<Ticket>, AppError> {
    let mut result = Vec::with_capacity(items.len());

    for item in items {
        item.validate()?;

        let id = item
            .id
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty());

        let ticket = match id {
            Some(raw) => {
                let id = parse_id("ticket", raw)?;
                let existing = session
                    .find_ticket(id)
                    .await?
                    .filter(|t| t.event_id == event_id)
                    .ok_or_else(|| AppError::not_found("ticket", id))?;

                let changes = changes_for(&existing, item);
                if changes.is_empty() {
                    existing
                } else {
                    debug!(ticket_id = %id, "updating ticket");
                    session
                        .update_ticket(id, &changes)
                        .await?
                        .ok_or_else(|| AppError::not_found("ticket", id))?
                }
            }
            None => {
                session
                    .insert_ticket(&NewTicket {
                        event_id,
                        name: item.name.trim().to_string(),
                        price: item.price.unwrap_or_default(),
                        total_qty: item.total_qty.unwrap_or_default(),
                    })
                    .await?
            }
        };
        result.push(ticket);
    }

    Ok(result)
}

pub async fn create(state: &AppState, request: TicketCreateRequest) -> Result<Ticket, AppError> {
    request.validate()?;
    let event_id = parse_id("event", &request.event_id)?;

    let mut session = state.store.begin().await?;
    if session.find_event(event_id).await?.is_none() {
        return Err(AppError::not_found("event", event_id));
    }
    let ticket = session
        .insert_ticket(&NewTicket {
            event_id,
            name: request.name.trim().to_string(),
            price: request.price,
            total_qty: request.total_qty,
        })
        .await?;
    session.commit().await?;

    info!(ticket_id = %ticket.id, event_id = %event_id, "ticket created");
    Ok(ticket)
}

/// Tickets of an event, oldest first. Unknown events have none.
pub async fn find_by_event(state: &AppState, event_id: Uuid) -> Result<Vec<Ticket>, AppError> {
    let mut session = state.store.snapshot().await?;
    Ok(session.tickets_of_events(&[event_id]).await?)
}

pub async fn find_by_id(state: &AppState, id: Uuid) -> Result<Option<Ticket>, AppError> {
    let mut session = state.store.snapshot().await?;
    Ok(session.find_ticket(id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, NewEvent};
    use crate::state::testing::test_state;
    use chrono::Utc;
    use rust_decimal::Decimal;

    async fn seed_event(state: &AppState, slug: &str) -> Uuid {
        let mut session = state.store.begin().await.unwrap();
        let event = session
            .insert_event(&NewEvent {
                admin_id: None,
                name: slug.to_string(),
                slug: slug.to_string(),
                date: Utc::now(),
                venue: None,
                lng: None,
                lat: None,
                description: None,
                terms_and_condition: None,
                event_layout_photo_id: None,
                event_banner_photo_id: None,
                event_photo_id: None,
                status: EventStatus::Draft,
            })
            .await
            .unwrap();
        session.commit().await.unwrap();
        event.id
    }

    fn item(id: Option<Uuid>, name: &str, price: Option<i64>, qty: Option<i32>) -> TicketInput {
        TicketInput {
            id: id.map(|id| id.to_string()),
            name: name.to_string(),
            price: price.map(Decimal::from),
            total_qty: qty,
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_in_place() {
        let (state, _) = test_state();
        let event_id = seed_event(&state, "gig").await;

        let mut session = state.store.begin().await.unwrap();
        let created = upsert(
            session.as_mut(),
            event_id,
            &[item(None, "VIP", Some(100), Some(10)), item(None, "GA", None, None)],
        )
        .await
        .unwrap();
        assert_eq!(created[0].name, "VIP");
        assert_eq!(created[1].price, Decimal::ZERO);
        assert_eq!(created[1].total_qty, 0);

        let vip = created[0].id;
        let updated = upsert(
            session.as_mut(),
            event_id,
            &[item(Some(vip), "VIP", None, Some(20))],
        )
        .await
        .unwrap();
        assert_eq!(updated[0].id, vip);
        assert_eq!(updated[0].price, Decimal::from(100));
        assert_eq!(updated[0].total_qty, 20);
        assert_eq!(updated[0].total_booked, 0);

        let all = session.tickets_of_events(&[event_id]).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_rejects_ticket_of_another_event() {
        let (state, _) = test_state();
        let first = seed_event(&state, "first").await;
        let second = seed_event(&state, "second").await;

        let mut session = state.store.begin().await.unwrap();
        let foreign = upsert(session.as_mut(), first, &[item(None, "VIP", None, None)])
            .await
            .unwrap()[0]
            .id;

        let err = upsert(session.as_mut(), second, &[item(Some(foreign), "VIP", None, None)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("ticket")));
    }

    #[tokio::test]
    async fn test_unchanged_item_is_not_rewritten() {
        let (state, _) = test_state();
        let event_id = seed_event(&state, "same").await;
        let mut session = state.store.begin().await.unwrap();
        let ticket = upsert(session.as_mut(), event_id, &[item(None, "VIP", Some(5), Some(1))])
            .await
            .unwrap()
            .remove(0);

        let again = upsert(
            session.as_mut(),
            event_id,
            &[item(Some(ticket.id), "VIP", Some(5), Some(1))],
        )
        .await
        .unwrap()
        .remove(0);
        assert_eq!(again.updated_at, ticket.updated_at);
    }

    #[tokio::test]
    async fn test_standalone_create_and_lookups() {
        let (state, _) = test_state();
        let event_id = seed_event(&state, "solo").await;

        let ticket = create(
            &state,
            TicketCreateRequest {
                event_id: event_id.to_string(),
                name: "Early bird".into(),
                price: Decimal::from(15),
                total_qty: 50,
            },
        )
        .await
        .unwrap();

        assert_eq!(find_by_event(&state, event_id).await.unwrap(), vec![ticket.clone()]);
        assert_eq!(find_by_id(&state, ticket.id).await.unwrap(), Some(ticket));
        assert!(find_by_event(&state, Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_standalone_create_needs_event() {
        let (state, _) = test_state();
        let err = create(
            &state,
            TicketCreateRequest {
                event_id: Uuid::new_v4().to_string(),
                name: "VIP".into(),
                price: Decimal::ZERO,
                total_qty: 1,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("event")));
    }
}
