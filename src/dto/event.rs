use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::file::FileRef;
use super::ticket::TicketInput;
use crate::models::{Category, Event, EventStatus, Ticket};
use crate::pagination::{PaginationQuery, SortDirection};
use crate::utils::error::AppError;
use crate::utils::parse_id;

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() || name.chars().count() > 255 {
        return Err(AppError::ValidationError(
            "event name must be between 1 and 255 characters".to_string(),
        ));
    }
    Ok(())
}

/// Coordinates are stored as `NUMERIC(9, 6)`.
const COORDINATE_SCALE: u32 = 6;

fn validate_coordinate(field: &str, value: Option<Decimal>, bound: i64) -> Result<(), AppError> {
    let Some(value) = value else {
        return Ok(());
    };
    if value.abs() > Decimal::from(bound) || value.normalize().scale() > COORDINATE_SCALE {
        return Err(AppError::ValidationError(format!(
            "{field} must be between -{bound} and {bound} with at most 6 decimal places"
        )));
    }
    Ok(())
}

fn validate_location(lng: Option<Decimal>, lat: Option<Decimal>) -> Result<(), AppError> {
    validate_coordinate("lng", lng, 180)?;
    validate_coordinate("lat", lat, 90)
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventCreateRequest {
    pub name: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub lng: Option<Decimal>,
    #[serde(default)]
    pub lat: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub terms_and_condition: Option<String>,
    #[serde(default)]
    pub category_ids: Option<Vec<String>>,
    #[serde(default)]
    pub event_layout_photo_id: Option<String>,
    #[serde(default)]
    pub event_banner_photo_id: Option<String>,
    #[serde(default)]
    pub event_photo_id: Option<String>,
    #[serde(default)]
    pub tickets: Option<Vec<TicketInput>>,
    #[serde(default)]
    pub status: Option<EventStatus>,
}

impl EventCreateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_name(&self.name)?;
        validate_location(self.lng, self.lat)?;
        for ticket in self.tickets.iter().flatten() {
            ticket.validate()?;
        }
        Ok(())
    }
}

/// Partial update. For nullable columns a missing key leaves the value alone
/// while an explicit `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventUpdateRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub venue: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub lng: Option<Option<Decimal>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub lat: Option<Option<Decimal>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub terms_and_condition: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub event_layout_photo_id: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub event_banner_photo_id: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub event_photo_id: Option<Option<String>>,
    /// Present (even `null` or empty) replaces every category link.
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub category_ids: Option<Option<Vec<String>>>,
    #[serde(default)]
    pub tickets: Option<Vec<TicketInput>>,
    #[serde(default)]
    pub status: Option<EventStatus>,
}

impl EventUpdateRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_location(self.lng.flatten(), self.lat.flatten())?;
        for ticket in self.tickets.iter().flatten() {
            ticket.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
}

impl From<Category> for CategoryRef {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

/// An event with its files, categories and tickets loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRead {
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
    pub status: EventStatus,
    pub categories: Vec<CategoryRef>,
    pub event_layout_photo: Option<FileRef>,
    pub event_banner_photo: Option<FileRef>,
    pub event_photo: Option<FileRef>,
    pub tickets: Vec<Ticket>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventRead {
    pub fn new(
        event: Event,
        categories: Vec<CategoryRef>,
        photos: [Option<FileRef>; 3],
        tickets: Vec<Ticket>,
    ) -> Self {
        let [event_layout_photo, event_banner_photo, event_photo] = photos;
        Self {
            id: event.id,
            admin_id: event.admin_id,
            name: event.name,
            slug: event.slug,
            date: event.date,
            venue: event.venue,
            lng: event.lng,
            lat: event.lat,
            description: event.description,
            terms_and_condition: event.terms_and_condition,
            status: event.status,
            categories,
            event_layout_photo,
            event_banner_photo,
            event_photo,
            tickets,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

/// `GET /event` query string: the common list parameters plus comma
/// separated `category_ids` and `statuses` filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventListQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub order_by: Option<String>,
    pub order_direction: Option<SortDirection>,
    #[serde(alias = "categoryIds")]
    pub category_ids: Option<String>,
    pub statuses: Option<String>,
}

fn comma_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl EventListQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            search: self.search.clone(),
            page: self.page,
            limit: self.limit,
            order_by: self.order_by.clone(),
            order_direction: self.order_direction,
        }
    }

    pub fn category_ids(&self) -> Result<Vec<Uuid>, AppError> {
        comma_list(self.category_ids.as_deref())
            .map(|raw| parse_id("category", raw))
            .collect()
    }

    pub fn statuses(&self) -> Result<Vec<EventStatus>, AppError> {
        comma_list(self.statuses.as_deref())
            .map(|raw| raw.parse().map_err(AppError::ValidationError))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_update_distinguishes_absent_from_null() {
        let body: EventUpdateRequest =
            serde_json::from_str(r#"{"venue": null, "category_ids": []}"#).unwrap();
        assert_eq!(body.venue, Some(None));
        assert_eq!(body.description, None);
        assert_eq!(body.category_ids, Some(Some(vec![])));

        let body: EventUpdateRequest = serde_json::from_str(r#"{"category_ids": null}"#).unwrap();
        assert_eq!(body.category_ids, Some(None));

        let body: EventUpdateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(body.category_ids, None);
        assert!(body.tickets.is_none());
    }

    #[test]
    fn test_list_filters_are_parsed() {
        let id = Uuid::new_v4();
        let query = EventListQuery {
            category_ids: Some(format!("{id}, ")),
            statuses: Some("active,DRAFT".into()),
            ..EventListQuery::default()
        };
        assert_eq!(query.category_ids().unwrap(), vec![id]);
        assert_eq!(
            query.statuses().unwrap(),
            vec![EventStatus::Active, EventStatus::Draft]
        );
    }

    #[test]
    fn test_bad_list_filters_are_rejected() {
        let query = EventListQuery {
            category_ids: Some("nope".into()),
            statuses: Some("archived".into()),
            ..EventListQuery::default()
        };
        assert!(matches!(query.category_ids(), Err(AppError::InvalidId(_))));
        assert!(matches!(query.statuses(), Err(AppError::ValidationError(_))));
    }

    #[rstest]
    #[case(r#""lng":"85.324","lat":"27.717""#, true)]
    #[case(r#""lng":-180,"lat":90"#, true)]
    #[case(r#""lng":"12345.5""#, false)]
    #[case(r#""lat":"-999.1234567""#, false)]
    #[case(r#""lat":"45.1234567""#, false)]
    #[case(r#""lng":"180.000001""#, false)]
    fn test_location_must_fit_column(#[case] fields: &str, #[case] ok: bool) {
        let create: EventCreateRequest = serde_json::from_str(&format!(
            r#"{{"name":"Live Show","date":"2030-01-01T20:00:00Z",{fields}}}"#
        ))
        .unwrap();
        assert_eq!(create.validate().is_ok(), ok);

        let update: EventUpdateRequest = serde_json::from_str(&format!("{{{fields}}}")).unwrap();
        assert_eq!(update.validate().is_ok(), ok);
    }

    #[test]
    fn test_cleared_location_is_valid() {
        let update: EventUpdateRequest =
            serde_json::from_str(r#"{"lng":null,"lat":null}"#).unwrap();
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let body: EventCreateRequest =
            serde_json::from_str(r#"{"name":"  ","date":"2030-01-01T20:00:00Z"}"#).unwrap();
        assert!(body.validate().is_err());
    }
}
