//! In-process store for local runs and tests.
//!
//! A session locks the tables for its whole lifetime and works on a private
//! copy; `commit` swaps the copy in, dropping the session throws it away.
//! Unique and foreign-key constraints mirror the SQL schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    Session, Store, StoreError, StoreResult, CATEGORY_NAME_CONSTRAINT,
    EVENT_CATEGORY_PAIR_CONSTRAINT, EVENT_SLUG_CONSTRAINT, USER_EMAIL_CONSTRAINT,
    USER_PHONE_CONSTRAINT,
};
use crate::models::{
    Category, Event, EventCategory, EventChanges, File, NewCategory, NewEvent, NewFile, NewTicket,
    NewToken, NewUser, Ticket, TicketChanges, Token, User, UserChanges,
};
use crate::pagination::{LinkTable, PageRequest, EVENT_CATEGORY_LINK};

#[derive(Debug, Clone, Default)]
struct Tables {
    files: BTreeMap<Uuid, File>,
    categories: BTreeMap<Uuid, Category>,
    events: BTreeMap<Uuid, Event>,
    event_categories: Vec<EventCategory>,
    tickets: BTreeMap<Uuid, Ticket>,
    users: BTreeMap<Uuid, User>,
    tokens: Vec<Token>,
    clock: Option<DateTime<Utc>>,
}

impl Tables {
    /// Wall clock, nudged forward so no two rows share a timestamp.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.clock {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.clock = Some(now);
        now
    }

    fn is_linked(&self, link: &LinkTable, owner: Uuid, targets: &[Uuid]) -> bool {
        if *link != EVENT_CATEGORY_LINK {
            return false;
        }
        self.event_categories
            .iter()
            .any(|ec| ec.event_id == owner && targets.contains(&ec.category_id))
    }

    fn fk_file(&self, id: Option<Uuid>, constraint: &str) -> StoreResult<()> {
        match id {
            Some(id) if !self.files.contains_key(&id) => {
                Err(StoreError::ForeignKeyViolation(constraint.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn check_event_files(&self, event: &Event) -> StoreResult<()> {
        self.fk_file(event.event_layout_photo_id, "event_event_layout_photo_id_fkey")?;
        self.fk_file(event.event_banner_photo_id, "event_event_banner_photo_id_fkey")?;
        self.fk_file(event.event_photo_id, "event_event_photo_id_fkey")
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn open(&self) -> Box<dyn Session> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Box::new(MemorySession { guard, working })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn Session>> {
        Ok(self.open().await)
    }

    async fn snapshot(&self) -> StoreResult<Box<dyn Session>> {
        Ok(self.open().await)
    }
}

pub struct MemorySession {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl Session for MemorySession {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemorySession { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn insert_file(&mut self, file: &NewFile) -> StoreResult<File> {
        let now = self.working.now();
        let row = File {
            id: Uuid::new_v4(),
            file_path: file.file_path.clone(),
            file_type: file.file_type.clone(),
            size: file.size,
            created_at: now,
            updated_at: now,
        };
        self.working.files.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_file(&mut self, id: Uuid) -> StoreResult<Option<File>> {
        Ok(self.working.files.get(&id).cloned())
    }

    async fn find_files(&mut self, ids: &[Uuid]) -> StoreResult<Vec<File>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.working.files.get(id).cloned())
            .collect())
    }

    async fn list_files(&mut self, page: &PageRequest) -> StoreResult<(Vec<File>, i64)> {
        Ok(page.apply(self.working.files.values(), |_, _, _| false))
    }

    async fn insert_category(&mut self, category: &NewCategory) -> StoreResult<Category> {
        if self
            .working
            .categories
            .values()
            .any(|c| c.name == category.name)
        {
            return Err(StoreError::UniqueViolation(CATEGORY_NAME_CONSTRAINT.into()));
        }
        let now = self.working.now();
        let row = Category {
            id: Uuid::new_v4(),
            name: category.name.clone(),
            description: category.description.clone(),
            created_at: now,
            updated_at: now,
        };
        self.working.categories.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_category(&mut self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn list_categories(&mut self) -> StoreResult<Vec<Category>> {
        let mut rows: Vec<Category> = self.working.categories.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn event_slug_exists(&mut self, slug: &str) -> StoreResult<bool> {
        Ok(self.working.events.values().any(|e| e.slug == slug))
    }

    async fn insert_event(&mut self, event: &NewEvent) -> StoreResult<Event> {
        if self.working.events.values().any(|e| e.slug == event.slug) {
            return Err(StoreError::UniqueViolation(EVENT_SLUG_CONSTRAINT.into()));
        }
        let now = self.working.now();
        let row = Event {
            id: Uuid::new_v4(),
            admin_id: event.admin_id,
            name: event.name.clone(),
            slug: event.slug.clone(),
            date: event.date,
            venue: event.venue.clone(),
            lng: event.lng,
            lat: event.lat,
            description: event.description.clone(),
            terms_and_condition: event.terms_and_condition.clone(),
            event_layout_photo_id: event.event_layout_photo_id,
            event_banner_photo_id: event.event_banner_photo_id,
            event_photo_id: event.event_photo_id,
            status: event.status,
            created_at: now,
            updated_at: now,
        };
        self.working.check_event_files(&row)?;
        self.working.events.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_event(&mut self, id: Uuid, changes: &EventChanges) -> StoreResult<Option<Event>> {
        let Some(mut row) = self.working.events.get(&id).cloned() else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(row));
        }
        changes.apply(&mut row);
        self.working.check_event_files(&row)?;
        row.updated_at = self.working.now();
        self.working.events.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn find_event(&mut self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.working.events.get(&id).cloned())
    }

    async fn list_events(&mut self, page: &PageRequest) -> StoreResult<(Vec<Event>, i64)> {
        let tables = &self.working;
        Ok(page.apply(tables.events.values(), |link, owner, targets| {
            tables.is_linked(link, owner, targets)
        }))
    }

    async fn link_event_category(&mut self, event_id: Uuid, category_id: Uuid) -> StoreResult<()> {
        if !self.working.events.contains_key(&event_id) {
            return Err(StoreError::ForeignKeyViolation(
                "event_category_event_id_fkey".into(),
            ));
        }
        if !self.working.categories.contains_key(&category_id) {
            return Err(StoreError::ForeignKeyViolation(
                "event_category_category_id_fkey".into(),
            ));
        }
        if self
            .working
            .event_categories
            .iter()
            .any(|ec| ec.event_id == event_id && ec.category_id == category_id)
        {
            return Err(StoreError::UniqueViolation(
                EVENT_CATEGORY_PAIR_CONSTRAINT.into(),
            ));
        }
        let created_at = self.working.now();
        self.working.event_categories.push(EventCategory {
            id: Uuid::new_v4(),
            event_id,
            category_id,
            created_at,
        });
        Ok(())
    }

    async fn unlink_event_categories(&mut self, event_id: Uuid) -> StoreResult<u64> {
        let before = self.working.event_categories.len();
        self.working
            .event_categories
            .retain(|ec| ec.event_id != event_id);
        Ok((before - self.working.event_categories.len()) as u64)
    }

    async fn categories_of_events(&mut self, event_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, Category)>> {
        let tables = &self.working;
        Ok(tables
            .event_categories
            .iter()
            .filter(|ec| event_ids.contains(&ec.event_id))
            .filter_map(|ec| {
                tables
                    .categories
                    .get(&ec.category_id)
                    .map(|c| (ec.event_id, c.clone()))
            })
            .collect())
    }

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket> {
        if !self.working.events.contains_key(&ticket.event_id) {
            return Err(StoreError::ForeignKeyViolation(
                "event_ticket_event_id_fkey".into(),
            ));
        }
        let now = self.working.now();
        let row = Ticket {
            id: Uuid::new_v4(),
            event_id: ticket.event_id,
            name: ticket.name.clone(),
            price: ticket.price,
            total_qty: ticket.total_qty,
            total_booked: 0,
            created_at: now,
            updated_at: now,
        };
        self.working.tickets.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_ticket(&mut self, id: Uuid, changes: &TicketChanges) -> StoreResult<Option<Ticket>> {
        let Some(mut row) = self.working.tickets.get(&id).cloned() else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(row));
        }
        changes.apply(&mut row);
        row.updated_at = self.working.now();
        self.working.tickets.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn find_ticket(&mut self, id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.working.tickets.get(&id).cloned())
    }

    async fn tickets_of_events(&mut self, event_ids: &[Uuid]) -> StoreResult<Vec<Ticket>> {
        let mut rows: Vec<Ticket> = self
            .working
            .tickets
            .values()
            .filter(|t| event_ids.contains(&t.event_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User> {
        if self.working.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation(USER_EMAIL_CONSTRAINT.into()));
        }
        if let Some(phone) = &user.phone_number {
            if self
                .working
                .users
                .values()
                .any(|u| u.phone_number.as_ref() == Some(phone))
            {
                return Err(StoreError::UniqueViolation(USER_PHONE_CONSTRAINT.into()));
            }
        }
        let now = self.working.now();
        let row = User {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            password: user.password.clone(),
            full_name: user.full_name.clone(),
            dob: user.dob,
            roles: user.roles.clone(),
            gender: None,
            phone_number: user.phone_number.clone(),
            phone_verified_at: None,
            email_verified_at: None,
            profile_id: None,
            created_at: now,
            updated_at: now,
        };
        self.working.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_phone(&mut self, phone_number: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn update_user(&mut self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>> {
        let Some(mut row) = self.working.users.get(&id).cloned() else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(row));
        }
        changes.apply(&mut row);
        if let Some(phone) = &row.phone_number {
            if self
                .working
                .users
                .values()
                .any(|u| u.id != id && u.phone_number.as_ref() == Some(phone))
            {
                return Err(StoreError::UniqueViolation(USER_PHONE_CONSTRAINT.into()));
            }
        }
        self.working.fk_file(row.profile_id, "app_user_profile_id_fkey")?;
        row.updated_at = self.working.now();
        self.working.users.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn list_users(&mut self, page: &PageRequest) -> StoreResult<(Vec<User>, i64)> {
        Ok(page.apply(self.working.users.values(), |_, _, _| false))
    }

    async fn replace_token(&mut self, token: &NewToken) -> StoreResult<()> {
        self.working.tokens.retain(|t| {
            !(t.resource_type == token.resource_type && t.resource_id == token.resource_id)
        });
        let created_at = self.working.now();
        self.working.tokens.push(Token {
            id: Uuid::new_v4(),
            code: token.code,
            resource_type: token.resource_type.clone(),
            resource_id: token.resource_id.clone(),
            created_at,
            expires_at: token.expires_at,
        });
        Ok(())
    }

    async fn take_token(
        &mut self,
        code: i32,
        resource_type: &str,
        resource_id: &str,
        now: DateTime<Utc>,
        consume: bool,
    ) -> StoreResult<bool> {
        let position = self.working.tokens.iter().position(|t| {
            t.code == code
                && t.resource_type == resource_type
                && t.resource_id == resource_id
                && t.expires_at > now
        });
        match position {
            Some(index) => {
                if consume {
                    self.working.tokens.remove(index);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{PaginationQuery, Predicate, EVENT_LISTING};
    use crate::models::EventStatus;

    fn new_event(slug: &str) -> NewEvent {
        NewEvent {
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
        }
    }

    #[tokio::test]
    async fn test_uncommitted_session_is_discarded() {
        let store = MemoryStore::new();

        let mut session = store.begin().await.unwrap();
        session.insert_event(&new_event("gone")).await.unwrap();
        drop(session);

        let mut session = store.begin().await.unwrap();
        assert!(!session.event_slug_exists("gone").await.unwrap());
    }

    #[tokio::test]
    async fn test_committed_session_is_visible() {
        let store = MemoryStore::new();

        let mut session = store.begin().await.unwrap();
        session.insert_event(&new_event("kept")).await.unwrap();
        session.commit().await.unwrap();

        let mut session = store.snapshot().await.unwrap();
        assert!(session.event_slug_exists("kept").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_a_unique_violation() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();
        session.insert_event(&new_event("same")).await.unwrap();

        let err = session.insert_event(&new_event("same")).await.unwrap_err();
        assert!(err.is_unique_violation_of(EVENT_SLUG_CONSTRAINT));
    }

    #[tokio::test]
    async fn test_ticket_requires_existing_event() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();
        let err = session
            .insert_ticket(&NewTicket {
                event_id: Uuid::new_v4(),
                name: "VIP".into(),
                price: Default::default(),
                total_qty: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn test_list_events_filters_by_linked_category() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();
        let tagged = session.insert_event(&new_event("tagged")).await.unwrap();
        session.insert_event(&new_event("untagged")).await.unwrap();
        let music = session
            .insert_category(&NewCategory {
                name: "Music".into(),
                description: None,
            })
            .await
            .unwrap();
        session.link_event_category(tagged.id, music.id).await.unwrap();

        let page = PageRequest::new(&EVENT_LISTING, &PaginationQuery::default()).with(
            Predicate::LinkedTo {
                link: EVENT_CATEGORY_LINK,
                ids: vec![music.id],
            },
        );
        let (rows, total) = session.list_events(&page).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, tagged.id);
    }

    #[tokio::test]
    async fn test_timestamps_are_strictly_increasing() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();
        let mut last = None;
        for i in 0..50 {
            let c = session
                .insert_category(&NewCategory {
                    name: format!("c{i}"),
                    description: None,
                })
                .await
                .unwrap();
            if let Some(prev) = last {
                assert!(c.created_at > prev);
            }
            last = Some(c.created_at);
        }
    }
}
