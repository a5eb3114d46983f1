//! Relational store seam.
//!
//! Services never talk to a pool directly: they open a [`Session`] (one unit
//! of work) from a [`Store`], run every statement through it and commit.
//! Dropping a session without committing discards all of its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Category, Event, EventChanges, File, NewCategory, NewEvent, NewFile, NewTicket, NewToken,
    NewUser, Ticket, TicketChanges, User, UserChanges,
};
use crate::pagination::PageRequest;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const EVENT_SLUG_CONSTRAINT: &str = "event_slug_key";
pub const CATEGORY_NAME_CONSTRAINT: &str = "category_name_key";
pub const USER_EMAIL_CONSTRAINT: &str = "app_user_email_key";
pub const USER_PHONE_CONSTRAINT: &str = "app_user_phone_number_key";
pub const EVENT_CATEGORY_PAIR_CONSTRAINT: &str = "event_category_event_id_category_id_key";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_unique_violation_of(&self, constraint: &str) -> bool {
        matches!(self, StoreError::UniqueViolation(c) if c == constraint)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation(constraint);
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a read-write unit of work.
    async fn begin(&self) -> StoreResult<Box<dyn Session>>;

    /// Opens a read-only unit of work where every read sees one snapshot.
    async fn snapshot(&self) -> StoreResult<Box<dyn Session>>;
}

#[async_trait]
pub trait Session: Send {
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    // files
    async fn insert_file(&mut self, file: &NewFile) -> StoreResult<File>;
    async fn find_file(&mut self, id: Uuid) -> StoreResult<Option<File>>;
    async fn find_files(&mut self, ids: &[Uuid]) -> StoreResult<Vec<File>>;
    async fn list_files(&mut self, page: &PageRequest) -> StoreResult<(Vec<File>, i64)>;

    // categories
    async fn insert_category(&mut self, category: &NewCategory) -> StoreResult<Category>;
    async fn find_category(&mut self, id: Uuid) -> StoreResult<Option<Category>>;
    /// Newest first, ties broken by id.
    async fn list_categories(&mut self) -> StoreResult<Vec<Category>>;

    // events
    async fn event_slug_exists(&mut self, slug: &str) -> StoreResult<bool>;
    /// A slug collision surfaces as `UniqueViolation(EVENT_SLUG_CONSTRAINT)`
    /// and leaves the session usable.
    async fn insert_event(&mut self, event: &NewEvent) -> StoreResult<Event>;
    async fn update_event(&mut self, id: Uuid, changes: &EventChanges) -> StoreResult<Option<Event>>;
    async fn find_event(&mut self, id: Uuid) -> StoreResult<Option<Event>>;
    async fn list_events(&mut self, page: &PageRequest) -> StoreResult<(Vec<Event>, i64)>;

    // event <-> category links
    async fn link_event_category(&mut self, event_id: Uuid, category_id: Uuid) -> StoreResult<()>;
    async fn unlink_event_categories(&mut self, event_id: Uuid) -> StoreResult<u64>;
    /// `(event_id, category)` pairs in link insertion order.
    async fn categories_of_events(&mut self, event_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, Category)>>;

    // tickets
    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket>;
    async fn update_ticket(&mut self, id: Uuid, changes: &TicketChanges) -> StoreResult<Option<Ticket>>;
    async fn find_ticket(&mut self, id: Uuid) -> StoreResult<Option<Ticket>>;
    /// Oldest first per event.
    async fn tickets_of_events(&mut self, event_ids: &[Uuid]) -> StoreResult<Vec<Ticket>>;

    // users
    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User>;
    async fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_phone(&mut self, phone_number: &str) -> StoreResult<Option<User>>;
    async fn update_user(&mut self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>>;
    async fn list_users(&mut self, page: &PageRequest) -> StoreResult<(Vec<User>, i64)>;

    // one-time tokens
    /// Drops every token of the resource, then stores `token`.
    async fn replace_token(&mut self, token: &NewToken) -> StoreResult<()>;
    /// True when a matching unexpired token exists; deletes it when `consume`.
    async fn take_token(
        &mut self,
        code: i32,
        resource_type: &str,
        resource_id: &str,
        now: DateTime<Utc>,
        consume: bool,
    ) -> StoreResult<bool>;
}
