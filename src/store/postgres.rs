//! PostgreSQL implementation of the store, backed by a `PgPool`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, FromRow, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{Session, Store, StoreResult};
use crate::models::{
    Category, Event, EventChanges, File, NewCategory, NewEvent, NewFile, NewTicket, NewToken,
    NewUser, Ticket, TicketChanges, User, UserChanges,
};
use crate::pagination::PageRequest;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn Session>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }

    async fn snapshot(&self) -> StoreResult<Box<dyn Session>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgSession { tx }))
    }
}

pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

#[derive(FromRow)]
struct LinkedCategory {
    event_id: Uuid,
    #[sqlx(flatten)]
    category: Category,
}

impl PgSession {
    async fn paginate<T>(&mut self, page: &PageRequest) -> StoreResult<(Vec<T>, i64)>
    where
        T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
    {
        let mut select = page.build_select();
        let rows = select
            .build_query_as::<T>()
            .fetch_all(&mut *self.tx)
            .await?;

        let mut count = page.build_count();
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&mut *self.tx)
            .await?;

        Ok((rows, total))
    }
}

#[async_trait]
impl Session for PgSession {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn insert_file(&mut self, file: &NewFile) -> StoreResult<File> {
        let row = sqlx::query_as::<_, File>(
            "INSERT INTO file (file_path, type, size) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&file.file_path)
        .bind(&file.file_type)
        .bind(file.size)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn find_file(&mut self, id: Uuid) -> StoreResult<Option<File>> {
        let row = sqlx::query_as::<_, File>("SELECT * FROM file WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_files(&mut self, ids: &[Uuid]) -> StoreResult<Vec<File>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, File>("SELECT * FROM file WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn list_files(&mut self, page: &PageRequest) -> StoreResult<(Vec<File>, i64)> {
        self.paginate(page).await
    }

    async fn insert_category(&mut self, category: &NewCategory) -> StoreResult<Category> {
        let row = sqlx::query_as::<_, Category>(
            "INSERT INTO category (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn find_category(&mut self, id: Uuid) -> StoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, Category>("SELECT * FROM category WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_categories(&mut self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            "SELECT * FROM category ORDER BY created_at DESC, id ASC",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn event_slug_exists(&mut self, slug: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM event WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn insert_event(&mut self, event: &NewEvent) -> StoreResult<Event> {
        // A failed statement poisons the whole transaction, so the insert runs
        // under a savepoint and a slug collision only rolls back to it.
        let mut savepoint = Connection::begin(&mut *self.tx).await?;
        let row = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO event
                (admin_id, name, slug, date, venue, lng, lat, description,
                 terms_and_condition, event_layout_photo_id, event_banner_photo_id,
                 event_photo_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(event.admin_id)
        .bind(&event.name)
        .bind(&event.slug)
        .bind(event.date)
        .bind(&event.venue)
        .bind(event.lng)
        .bind(event.lat)
        .bind(&event.description)
        .bind(&event.terms_and_condition)
        .bind(event.event_layout_photo_id)
        .bind(event.event_banner_photo_id)
        .bind(event.event_photo_id)
        .bind(event.status)
        .fetch_one(&mut *savepoint)
        .await?;
        savepoint.commit().await?;
        Ok(row)
    }

    async fn update_event(&mut self, id: Uuid, changes: &EventChanges) -> StoreResult<Option<Event>> {
        if changes.is_empty() {
            return self.find_event(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE event SET updated_at = clock_timestamp()");
        if let Some(name) = &changes.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(date) = changes.date {
            qb.push(", date = ").push_bind(date);
        }
        if let Some(venue) = &changes.venue {
            qb.push(", venue = ").push_bind(venue.clone());
        }
        if let Some(lng) = changes.lng {
            qb.push(", lng = ").push_bind(lng);
        }
        if let Some(lat) = changes.lat {
            qb.push(", lat = ").push_bind(lat);
        }
        if let Some(description) = &changes.description {
            qb.push(", description = ").push_bind(description.clone());
        }
        if let Some(terms) = &changes.terms_and_condition {
            qb.push(", terms_and_condition = ").push_bind(terms.clone());
        }
        if let Some(file_id) = changes.event_layout_photo_id {
            qb.push(", event_layout_photo_id = ").push_bind(file_id);
        }
        if let Some(file_id) = changes.event_banner_photo_id {
            qb.push(", event_banner_photo_id = ").push_bind(file_id);
        }
        if let Some(file_id) = changes.event_photo_id {
            qb.push(", event_photo_id = ").push_bind(file_id);
        }
        if let Some(status) = changes.status {
            qb.push(", status = ").push_bind(status);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        let row = qb
            .build_query_as::<Event>()
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_event(&mut self, id: Uuid) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, Event>("SELECT * FROM event WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_events(&mut self, page: &PageRequest) -> StoreResult<(Vec<Event>, i64)> {
        self.paginate(page).await
    }

    async fn link_event_category(&mut self, event_id: Uuid, category_id: Uuid) -> StoreResult<()> {
        sqlx::query("INSERT INTO event_category (event_id, category_id) VALUES ($1, $2)")
            .bind(event_id)
            .bind(category_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn unlink_event_categories(&mut self, event_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM event_category WHERE event_id = $1")
            .bind(event_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn categories_of_events(&mut self, event_ids: &[Uuid]) -> StoreResult<Vec<(Uuid, Category)>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, LinkedCategory>(
            r#"
            SELECT ec.event_id, c.*
            FROM event_category ec
            JOIN category c ON c.id = ec.category_id
            WHERE ec.event_id = ANY($1)
            ORDER BY ec.created_at ASC, ec.id ASC
            "#,
        )
        .bind(event_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(|r| (r.event_id, r.category)).collect())
    }

    async fn insert_ticket(&mut self, ticket: &NewTicket) -> StoreResult<Ticket> {
        let row = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO event_ticket (event_id, name, price, total_qty)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(ticket.event_id)
        .bind(&ticket.name)
        .bind(ticket.price)
        .bind(ticket.total_qty)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn update_ticket(&mut self, id: Uuid, changes: &TicketChanges) -> StoreResult<Option<Ticket>> {
        if changes.is_empty() {
            return self.find_ticket(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE event_ticket SET updated_at = clock_timestamp()");
        if let Some(name) = &changes.name {
            qb.push(", name = ").push_bind(name.clone());
        }
        if let Some(price) = changes.price {
            qb.push(", price = ").push_bind(price);
        }
        if let Some(total_qty) = changes.total_qty {
            qb.push(", total_qty = ").push_bind(total_qty);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        let row = qb
            .build_query_as::<Ticket>()
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_ticket(&mut self, id: Uuid) -> StoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, Ticket>("SELECT * FROM event_ticket WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn tickets_of_events(&mut self, event_ids: &[Uuid]) -> StoreResult<Vec<Ticket>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM event_ticket WHERE event_id = ANY($1) ORDER BY created_at ASC, id ASC",
        )
        .bind(event_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO app_user (email, password, full_name, dob, roles, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.full_name)
        .bind(user.dob)
        .bind(&user.roles)
        .bind(&user.phone_number)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn find_user(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM app_user WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM app_user WHERE email = $1")
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_user_by_phone(&mut self, phone_number: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM app_user WHERE phone_number = $1")
            .bind(phone_number)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn update_user(&mut self, id: Uuid, changes: &UserChanges) -> StoreResult<Option<User>> {
        if changes.is_empty() {
            return self.find_user(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE app_user SET updated_at = clock_timestamp()");
        if let Some(v) = &changes.full_name {
            qb.push(", full_name = ").push_bind(v.clone());
        }
        if let Some(v) = changes.dob {
            qb.push(", dob = ").push_bind(v);
        }
        if let Some(v) = &changes.gender {
            qb.push(", gender = ").push_bind(v.clone());
        }
        if let Some(v) = &changes.phone_number {
            qb.push(", phone_number = ").push_bind(v.clone());
        }
        if let Some(v) = changes.phone_verified_at {
            qb.push(", phone_verified_at = ").push_bind(v);
        }
        if let Some(v) = changes.email_verified_at {
            qb.push(", email_verified_at = ").push_bind(v);
        }
        if let Some(v) = changes.profile_id {
            qb.push(", profile_id = ").push_bind(v);
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        let row = qb
            .build_query_as::<User>()
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_users(&mut self, page: &PageRequest) -> StoreResult<(Vec<User>, i64)> {
        self.paginate(page).await
    }

    async fn replace_token(&mut self, token: &NewToken) -> StoreResult<()> {
        sqlx::query("DELETE FROM token WHERE resource_type = $1 AND resource_id = $2")
            .bind(&token.resource_type)
            .bind(&token.resource_id)
            .execute(&mut *self.tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO token (code, resource_type, resource_id, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token.code)
        .bind(&token.resource_type)
        .bind(&token.resource_id)
        .bind(token.expires_at)
        .execute(&mut *self.tx)
        .await?;
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
        let sql = if consume {
            r#"
            DELETE FROM token
            WHERE code = $1 AND resource_type = $2 AND resource_id = $3 AND expires_at > $4
            RETURNING id
            "#
        } else {
            r#"
            SELECT id FROM token
            WHERE code = $1 AND resource_type = $2 AND resource_id = $3 AND expires_at > $4
            "#
        };

        let found: Option<Uuid> = sqlx::query_scalar(sql)
            .bind(code)
            .bind(resource_type)
            .bind(resource_id)
            .bind(now)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(found.is_some())
    }
}
