use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::pagination::{Record, SortKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Inactive,
    Draft,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Inactive => "inactive",
            EventStatus::Draft => "draft",
        }
    }
}

impl Default for EventStatus {
    fn default() -> Self {
        EventStatus::Draft
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(EventStatus::Active),
            "inactive" => Ok(EventStatus::Inactive),
            "draft" => Ok(EventStatus::Draft),
            other => Err(format!("unknown event status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub admin_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub date: DateTime<Utc>,
    pub venue: Option<String>,
    pub lng: Option<Decimal>,
    pub lat: Option<Decimal>,
    pub description: Option<String>,
    pub terms_and_condition: Option<String>,
    pub event_layout_photo_id: Option<Uuid>,
    pub event_banner_photo_id: Option<Uuid>,
    pub event_photo_id: Option<Uuid>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// The file ids this event points at, in layout, banner, photo order.
    pub fn photo_ids(&self) -> [Option<Uuid>; 3] {
        [
            self.event_layout_photo_id,
            self.event_banner_photo_id,
            self.event_photo_id,
        ]
    }
}

impl Record for Event {
    fn id(&self) -> Uuid {
        self.id
    }

    fn text(&self, column: &str) -> Option<&str> {
        match column {
            "name" => Some(&self.name),
            "slug" => Some(&self.slug),
            "description" => self.description.as_deref(),
            "venue" => self.venue.as_deref(),
            "status" => Some(self.status.as_str()),
            _ => None,
        }
    }

    fn sort_key(&self, column: &str) -> SortKey {
        match column {
            "name" => SortKey::Text(self.name.clone()),
            "date" => SortKey::Time(self.date),
            _ => SortKey::Time(self.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub admin_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub date: DateTime<Utc>,
    pub venue: Option<String>,
    pub lng: Option<Decimal>,
    pub lat: Option<Decimal>,
    pub description: Option<String>,
    pub terms_and_condition: Option<String>,
    pub event_layout_photo_id: Option<Uuid>,
    pub event_banner_photo_id: Option<Uuid>,
    pub event_photo_id: Option<Uuid>,
    pub status: EventStatus,
}

/// Column level changes for an event. The outer `Option` is "was the field
/// sent", the inner one (for nullable columns) is the new value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventChanges {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub venue: Option<Option<String>>,
    pub lng: Option<Option<Decimal>>,
    pub lat: Option<Option<Decimal>>,
    pub description: Option<Option<String>>,
    pub terms_and_condition: Option<Option<String>>,
    pub event_layout_photo_id: Option<Option<Uuid>>,
    pub event_banner_photo_id: Option<Option<Uuid>>,
    pub event_photo_id: Option<Option<Uuid>>,
    pub status: Option<EventStatus>,
}

impl EventChanges {
    pub fn status(status: EventStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, event: &mut Event) {
        if let Some(name) = &self.name {
            event.name = name.clone();
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(venue) = &self.venue {
            event.venue = venue.clone();
        }
        if let Some(lng) = self.lng {
            event.lng = lng;
        }
        if let Some(lat) = self.lat {
            event.lat = lat;
        }
        if let Some(description) = &self.description {
            event.description = description.clone();
        }
        if let Some(terms) = &self.terms_and_condition {
            event.terms_and_condition = terms.clone();
        }
        if let Some(id) = self.event_layout_photo_id {
            event.event_layout_photo_id = id;
        }
        if let Some(id) = self.event_banner_photo_id {
            event.event_banner_photo_id = id;
        }
        if let Some(id) = self.event_photo_id {
            event.event_photo_id = id;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
    }
}
