//! Event aggregate: an event with its category links and tickets.
//!
//! Every write runs in one store session, so a failure at any step (a bad
//! file or category id, a foreign ticket id, a storage error) leaves no trace
//! of the attempt. Reads load files, categories and tickets explicitly in
//! batches, never row by row.

use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use super::{file, ticket};
use crate::dto::{CategoryRef, EventCreateRequest, EventListQuery, EventRead, EventUpdateRequest};
use crate::models::{Category, Event, EventChanges, EventStatus, File, NewEvent, Ticket};
use crate::pagination::{PageRequest, Paginated, Predicate, EVENT_CATEGORY_LINK, EVENT_LISTING};
use crate::state::AppState;
use crate::store::{Session, EVENT_SLUG_CONSTRAINT};
use crate::utils::error::AppError;
use crate::utils::{dedup_ids, parse_id};

const SLUG_ATTEMPTS: usize = 8;

/// Lowercased name with whitespace runs collapsed to `-`.
pub fn slugify(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

fn random_suffix() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// Inserts `event` under the first free slug derived from its name. A slug
/// taken between the check and the insert counts as a collision.
async fn insert_with_unique_slug(
    session: &mut dyn Session,
    mut event: NewEvent,
    mut suffix: impl FnMut() -> String + Send,
) -> Result<Event, AppError> {
    let base = slugify(&event.name);
    let mut candidate = base.clone();

    for _ in 0..SLUG_ATTEMPTS {
        if !session.event_slug_exists(&candidate).await? {
            event.slug = candidate.clone();
            match session.insert_event(&event).await {
                Ok(created) => return Ok(created),
                Err(e) if e.is_unique_violation_of(EVENT_SLUG_CONSTRAINT) => {
                    debug!(slug = %candidate, "slug taken concurrently, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        candidate = format!("{}-{}", base, suffix());
    }

    Err(AppError::Conflict(format!(
        "could not derive a unique slug for '{}'",
        event.name
    )))
}

/// Parses and checks category ids, dropping repeats. Nothing is written.
async fn resolve_categories(session: &mut dyn Session, raw: &[String]) -> Result<Vec<Uuid>, AppError> {
    let ids = raw
        .iter()
        .map(|raw| parse_id("category", raw))
        .collect::<Result<Vec<_>, _>>()?;
    let ids = dedup_ids(ids);

    for id in &ids {
        if session.find_category(*id).await?.is_none() {
            return Err(AppError::not_found("category", id));
        }
    }
    Ok(ids)
}

async fn link_categories(session: &mut dyn Session, event_id: Uuid, ids: &[Uuid]) -> Result<(), AppError> {
    for category_id in ids {
        session.link_event_category(event_id, *category_id).await?;
    }
    Ok(())
}

/// A photo field of an update: absent stays absent, `null` clears, an id
/// must resolve.
async fn resolve_photo_change(
    session: &mut dyn Session,
    change: &Option<Option<String>>,
) -> Result<Option<Option<Uuid>>, AppError> {
    match change {
        None => Ok(None),
        Some(raw) => Ok(Some(file::resolve(session, raw.as_deref()).await?)),
    }
}

/// Rows of one event read, before file links are signed.
struct Loaded {
    event: Event,
    files: [Option<File>; 3],
    categories: Vec<Category>,
    tickets: Vec<Ticket>,
}

async fn load(session: &mut dyn Session, events: Vec<Event>) -> Result<Vec<Loaded>, AppError> {
    if events.is_empty() {
        return Ok(Vec::new());
    }
    let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
    let file_ids = dedup_ids(events.iter().flat_map(|e| e.photo_ids()).flatten().collect());

    let files: HashMap<Uuid, File> = session
        .find_files(&file_ids)
        .await?
        .into_iter()
        .map(|f| (f.id, f))
        .collect();

    let mut categories: HashMap<Uuid, Vec<Category>> = HashMap::new();
    for (event_id, category) in session.categories_of_events(&event_ids).await? {
        categories.entry(event_id).or_default().push(category);
    }

    let mut tickets: HashMap<Uuid, Vec<Ticket>> = HashMap::new();
    for t in session.tickets_of_events(&event_ids).await? {
        tickets.entry(t.event_id).or_default().push(t);
    }

    Ok(events
        .into_iter()
        .map(|event| Loaded {
            files: event
                .photo_ids()
                .map(|id| id.and_then(|id| files.get(&id).cloned())),
            categories: categories.remove(&event.id).unwrap_or_default(),
            tickets: tickets.remove(&event.id).unwrap_or_default(),
            event,
        })
        .collect())
}

async fn render(state: &AppState, loaded: Loaded) -> EventRead {
    let ttl = state.file_link_ttl();
    let mut photos: [Option<crate::dto::FileRef>; 3] = [None, None, None];
    for (slot, f) in photos.iter_mut().zip(loaded.files) {
        if let Some(f) = f {
            *slot = Some(file::to_read(state.blobs.as_ref(), ttl, f).await.into());
        }
    }
    EventRead::new(
        loaded.event,
        loaded.categories.into_iter().map(CategoryRef::from).collect(),
        photos,
        loaded.tickets,
    )
}

async fn render_one(state: &AppState, mut loaded: Vec<Loaded>) -> Result<EventRead, AppError> {
    let loaded = loaded
        .pop()
        .ok_or_else(|| AppError::InternalServerError("event vanished while loading".to_string()))?;
    Ok(render(state, loaded).await)
}

pub async fn create_event(
    state: &AppState,
    admin_id: Uuid,
    request: EventCreateRequest,
) -> Result<EventRead, AppError> {
    request.validate()?;

    let mut session = state.store.begin().await?;

    let event_layout_photo_id =
        file::resolve(session.as_mut(), request.event_layout_photo_id.as_deref()).await?;
    let event_banner_photo_id =
        file::resolve(session.as_mut(), request.event_banner_photo_id.as_deref()).await?;
    let event_photo_id = file::resolve(session.as_mut(), request.event_photo_id.as_deref()).await?;
    let category_ids =
        resolve_categories(session.as_mut(), request.category_ids.as_deref().unwrap_or_default())
            .await?;

    let new_event = NewEvent {
        admin_id: Some(admin_id),
        name: request.name.trim().to_string(),
        slug: String::new(),
        date: request.date,
        venue: request.venue,
        lng: request.lng,
        lat: request.lat,
        description: request.description,
        terms_and_condition: request.terms_and_condition,
        event_layout_photo_id,
        event_banner_photo_id,
        event_photo_id,
        status: request.status.unwrap_or_default(),
    };
    let event = insert_with_unique_slug(session.as_mut(), new_event, random_suffix).await?;

    link_categories(session.as_mut(), event.id, &category_ids).await?;
    if let Some(items) = &request.tickets {
        ticket::upsert(session.as_mut(), event.id, items).await?;
    }

    let loaded = load(session.as_mut(), vec![event]).await?;
    session.commit().await?;

    let read = render_one(state, loaded).await?;
    info!(
        event_id = %read.id,
        slug = %read.slug,
        categories = read.categories.len(),
        tickets = read.tickets.len(),
        "event created"
    );
    Ok(read)
}

pub async fn update_event(
    state: &AppState,
    event_id: Uuid,
    request: EventUpdateRequest,
) -> Result<EventRead, AppError> {
    request.validate()?;

    let mut session = state.store.begin().await?;
    let event = session
        .find_event(event_id)
        .await?
        .ok_or_else(|| AppError::not_found("event", event_id))?;

    let changes = EventChanges {
        name: request.name.as_deref().map(|n| n.trim().to_string()),
        date: request.date,
        venue: request.venue.clone(),
        lng: request.lng,
        lat: request.lat,
        description: request.description.clone(),
        terms_and_condition: request.terms_and_condition.clone(),
        event_layout_photo_id: resolve_photo_change(session.as_mut(), &request.event_layout_photo_id)
            .await?,
        event_banner_photo_id: resolve_photo_change(session.as_mut(), &request.event_banner_photo_id)
            .await?,
        event_photo_id: resolve_photo_change(session.as_mut(), &request.event_photo_id).await?,
        status: request.status,
    };

    let category_ids = match &request.category_ids {
        Some(raw) => Some(
            resolve_categories(session.as_mut(), raw.as_deref().unwrap_or_default()).await?,
        ),
        None => None,
    };

    let event = if changes.is_empty() {
        event
    } else {
        session
            .update_event(event_id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found("event", event_id))?
    };

    if let Some(ids) = &category_ids {
        let removed = session.unlink_event_categories(event_id).await?;
        debug!(event_id = %event_id, removed, added = ids.len(), "replacing event categories");
        link_categories(session.as_mut(), event_id, ids).await?;
    }
    if let Some(items) = &request.tickets {
        ticket::upsert(session.as_mut(), event_id, items).await?;
    }

    let loaded = load(session.as_mut(), vec![event]).await?;
    session.commit().await?;

    info!(event_id = %event_id, "event updated");
    render_one(state, loaded).await
}

/// Soft delete: the event becomes inactive.
pub async fn delete_event(state: &AppState, event_id: Uuid) -> Result<(), AppError> {
    let mut session = state.store.begin().await?;
    session
        .update_event(event_id, &EventChanges::status(EventStatus::Inactive))
        .await?
        .ok_or_else(|| AppError::not_found("event", event_id))?;
    session.commit().await?;

    info!(event_id = %event_id, "event deactivated");
    Ok(())
}

pub async fn find_by_id(state: &AppState, event_id: Uuid) -> Result<Option<EventRead>, AppError> {
    let loaded = {
        let mut session = state.store.snapshot().await?;
        match session.find_event(event_id).await? {
            Some(event) => load(session.as_mut(), vec![event]).await?,
            None => return Ok(None),
        }
    };
    render_one(state, loaded).await.map(Some)
}

pub async fn list(state: &AppState, query: &EventListQuery) -> Result<Paginated<EventRead>, AppError> {
    let category_ids = dedup_ids(query.category_ids()?);
    let statuses = query.statuses()?;

    let mut page = PageRequest::new(&EVENT_LISTING, &query.pagination());
    if !statuses.is_empty() {
        page = page.with(Predicate::AnyOf {
            column: "status",
            values: statuses.iter().map(|s| s.as_str().to_string()).collect(),
        });
    }
    if !category_ids.is_empty() {
        page = page.with(Predicate::LinkedTo {
            link: EVENT_CATEGORY_LINK,
            ids: category_ids,
        });
    }

    let (loaded, total) = {
        let mut session = state.store.snapshot().await?;
        let (rows, total) = session.list_events(&page).await?;
        (load(session.as_mut(), rows).await?, total)
    };

    let mut list = Vec::with_capacity(loaded.len());
    for item in loaded {
        list.push(render(state, item).await);
    }
    Ok(Paginated::new(list, total, page.limit))
}
